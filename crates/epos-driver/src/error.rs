//! 驱动层错误类型定义

use epos_bus::{BusError, SlaveState};
use epos_protocol::{DriveState, ProtocolError};
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML 解析失败
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// 字段取值非法
    #[error("Invalid configuration field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 启动配置中有步骤失败
    #[error("Hardware configuration of '{name}' failed at: {}", failed_steps.join(", "))]
    Startup {
        name: String,
        failed_steps: Vec<&'static str>,
    },

    /// 从站未进入期望的 EtherCAT 状态
    #[error("Slave '{name}' did not reach {state}")]
    SlaveState { name: String, state: SlaveState },

    /// 校验写读回值不一致
    #[error("Verified SDO write 0x{index:04X}:{subindex:02X} read back {read}, expected {written}")]
    VerifyMismatch {
        index: u16,
        subindex: u8,
        written: String,
        read: String,
    },

    /// 目标状态不能由主站请求
    #[error("Drive state {target} cannot be requested")]
    UnreachableTarget { target: DriveState },

    /// 等待驱动状态切换超时
    #[error("Drive state change to {target} timed out after {timeout_ms} ms")]
    StateChangeTimeout { target: DriveState, timeout_ms: u64 },

    /// 等待中的状态切换被取消或被新的请求替代
    #[error("Drive state change to {target} was cancelled")]
    StateChangeCancelled { target: DriveState },

    /// 后台线程创建失败
    #[error("Failed to spawn thread: {0}")]
    Thread(String),

    /// 尚未得到解析后的配置（需要先 `startup()`）
    #[error("Device '{0}' is not started")]
    NotStarted(String),
}
