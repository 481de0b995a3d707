//! 驱动层模块
//!
//! 本模块提供 Maxon EPOS 驱动器（CiA 402）的设备驱动功能，包括：
//! - 启动配置（PDO 映射、插补周期、运行参数）
//! - 驱动状态切换：SDO 同步切换与 PDO 周期切换
//! - 周期过程数据交换（RxPDO 组装 / TxPDO 解析）
//! - 命令暂存：物理单位 → 线上整数
//! - 反馈聚合（ArcSwap 快照读取）与错误统计
//!
//! # 使用场景
//!
//! 控制线程调用 [`Epos::stage_command`] 与状态切换接口；周期线程（主站回调或
//! [`CyclicWorker`]）每个周期调用 [`Epos::update_write`] 与 [`Epos::update_read`]。

mod builder;
pub mod command;
pub mod config;
mod cyclic;
mod diagnostics;
mod engine;
mod epos;
mod error;
mod exchange;
pub mod reading;
mod sdo;

pub use builder::EposBuilder;
pub use command::{Command, ScaleFactors, StagedCommand};
pub use config::{Configuration, ResolvedConfiguration};
pub use cyclic::CyclicWorker;
pub use epos::Epos;
pub use error::{ConfigError, DriverError};
pub use reading::{ErrorKind, ErrorRecord, Reading, ReadingFactors};

pub use epos_protocol::{DriveState, ModeOfOperation, RxPdoType, TxPdoType};
