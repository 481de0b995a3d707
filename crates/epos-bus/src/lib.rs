//! # EPOS Bus
//!
//! EtherCAT 传输层抽象。驱动层只依赖 [`EthercatBus`] trait：
//! SDO 读写、每周期的过程数据交换、从站 EtherCAT 状态管理。
//! 主站本身（网卡、帧调度、分布式时钟）不在本 crate 范围内。

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod sdo;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use sdo::{SdoExt, SdoValue};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockBus;

/// 传输层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("SDO read 0x{index:04X}:{subindex:02X} on slave {address} failed: {reason}")]
    SdoRead {
        address: u16,
        index: u16,
        subindex: u8,
        reason: String,
    },
    #[error("SDO write 0x{index:04X}:{subindex:02X} on slave {address} failed: {reason}")]
    SdoWrite {
        address: u16,
        index: u16,
        subindex: u8,
        reason: String,
    },
    #[error("SDO 0x{index:04X}:{subindex:02X} size mismatch: expected {expected} bytes, got {actual}")]
    SdoSize {
        index: u16,
        subindex: u8,
        expected: usize,
        actual: usize,
    },
    #[error("RxPDO write on slave {address} failed: {reason}")]
    PdoWrite { address: u16, reason: String },
    #[error("TxPDO read on slave {address} failed: {reason}")]
    PdoRead { address: u16, reason: String },
    #[error("Slave {address} not found")]
    SlaveNotFound { address: u16 },
    #[error("Slave {address} rejected state change to {state}")]
    StateChange { address: u16, state: SlaveState },
    #[error("Timeout")]
    Timeout,
}

/// EtherCAT 从站状态（ESM）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlaveState {
    Init,
    PreOperational,
    Bootstrap,
    SafeOperational,
    Operational,
}

impl fmt::Display for SlaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlaveState::Init => "INIT",
            SlaveState::PreOperational => "PRE-OP",
            SlaveState::Bootstrap => "BOOT",
            SlaveState::SafeOperational => "SAFE-OP",
            SlaveState::Operational => "OP",
        };
        f.write_str(name)
    }
}

/// 主站协商得到的过程数据大小（字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PdoSizes {
    pub rx: usize,
    pub tx: usize,
}

/// EtherCAT 传输接口
///
/// 所有方法取 `&self`：同一总线会被周期线程（PDO）与控制线程（SDO）并发使用，
/// 实现方负责内部同步。`address` 为从站在总线上的地址。
pub trait EthercatBus: Send + Sync {
    /// 读取 SDO 到 `buf`，返回实际读取的字节数
    fn sdo_read(
        &self,
        address: u16,
        index: u16,
        subindex: u8,
        complete_access: bool,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, BusError>;

    /// 写入 SDO
    fn sdo_write(
        &self,
        address: u16,
        index: u16,
        subindex: u8,
        complete_access: bool,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), BusError>;

    /// 写入本周期的 RxPDO
    fn write_rx_pdo(&self, address: u16, data: &[u8]) -> Result<(), BusError>;

    /// 读取最近一次收到的 TxPDO，返回实际字节数
    fn read_tx_pdo(&self, address: u16, buf: &mut [u8]) -> Result<usize, BusError>;

    /// 主站为该从站协商的过程数据大小
    fn hardware_pdo_sizes(&self, address: u16) -> Result<PdoSizes, BusError>;

    /// 等待从站进入 `state`，最多重试 `max_retries` 次
    fn wait_for_state(
        &self,
        state: SlaveState,
        address: u16,
        max_retries: u32,
        retry_interval: Duration,
    ) -> bool;

    /// 请求从站切换 EtherCAT 状态
    fn set_state(&self, state: SlaveState, address: u16) -> Result<(), BusError>;
}
