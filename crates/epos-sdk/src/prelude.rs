//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use epos_sdk::prelude::*;
//! ```

// 驱动层（推荐使用）
pub use crate::{Command, Configuration, CyclicWorker, Epos, EposBuilder, Reading};

// 协议层
pub use crate::{DriveState, ModeOfOperation, RxPdoType, TxPdoType};

// 总线层（常用 Trait）
pub use crate::{EthercatBus, SdoExt, SlaveState};

// 错误类型
pub use crate::{BusError, DriverError, ErrorKind, ProtocolError};
