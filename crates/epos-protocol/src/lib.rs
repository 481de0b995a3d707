//! # EPOS Protocol
//!
//! CiA 402 驱动器协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `od`: 对象字典索引常量
//! - `controlword` / `statusword`: 16 位控制字/状态字位域
//! - `state`: 驱动状态与编号状态转换
//! - `state_machine`: (目标, 当前) → 转换序列查找表
//! - `mode`: 运行模式（Modes of Operation）
//! - `pdo`: 各 PDO 布局的线格式结构体
//!
//! ## 字节序
//!
//! EtherCAT 过程数据与 SDO 数据均为小端字节序（LSB first）。

pub mod controlword;
pub mod mode;
pub mod od;
pub mod pdo;
pub mod state;
pub mod state_machine;
pub mod statusword;

// 重新导出常用类型
pub use controlword::Controlword;
pub use mode::ModeOfOperation;
pub use pdo::*;
pub use state::{DriveState, StateTransition};
pub use state_machine::{next_transition, transition_path};
pub use statusword::Statusword;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid PDO length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Statusword 0x{statusword:04X} does not map to a drive state")]
    UnknownDriveState { statusword: u16 },

    #[error("No state transition from {current} to {target}")]
    UnreachableDriveState {
        target: DriveState,
        current: DriveState,
    },
}
