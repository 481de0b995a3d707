//! EPOS SDK - Maxon EPOS 驱动器 EtherCAT Rust SDK
//!
//! 通过 EtherCAT 驱动 CiA 402 驱动器（Maxon EPOS 系列）：启动配置、驱动状态机、
//! 周期过程数据交换、物理单位命令换算。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 控制字/状态字、状态转换表、PDO 布局
//! - **总线层** (`bus`): EtherCAT 传输抽象（SDO、过程数据、从站状态）
//! - **驱动层** (`driver`): `Epos` 实例、状态切换、命令暂存、反馈聚合
//!
//! # 快速开始
//!
//! ```rust
//! use epos_sdk::prelude::*;
//! ```
//!
//! 主站实现 [`EthercatBus`] 后交给 [`EposBuilder`]，周期线程每个总线周期调用
//! `update_write` / `update_read`（或使用 [`CyclicWorker`]）。

pub use epos_bus as bus;
pub use epos_driver as driver;
pub use epos_protocol as protocol;

pub mod prelude;

// 协议层
pub use epos_protocol::{
    Controlword, DriveState, ModeOfOperation, ProtocolError, RxPdoType, StateTransition,
    Statusword, TxPdoType,
};

// 总线层
pub use epos_bus::{BusError, EthercatBus, PdoSizes, SdoExt, SlaveState};

#[cfg(feature = "mock")]
pub use epos_bus::MockBus;

// 驱动层
pub use epos_driver::{
    Command, ConfigError, Configuration, CyclicWorker, DriverError, Epos, EposBuilder, ErrorKind,
    Reading, ResolvedConfiguration,
};

use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 级别由 `RUST_LOG` 控制（默认 `info`）；`log` crate 的日志也会转发到 tracing。
/// 重复调用返回错误。
pub fn init_logger() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
