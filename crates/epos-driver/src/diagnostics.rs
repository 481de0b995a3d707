//! 故障诊断线程
//!
//! 周期线程检测到进入 Fault 时非阻塞地投递一次请求，本线程通过 SDO
//! 读取错误码（0x603F）并存入原子变量，下一次发布的 Reading 会带上它。

use crate::DriverError;
use crossbeam_channel::{Sender, TrySendError, bounded};
use epos_bus::{EthercatBus, SdoExt};
use epos_protocol::od::OD_ERROR_CODE;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 尚未读到错误码
const NO_ERROR_CODE: u32 = u32::MAX;

pub(crate) struct DiagnosticsWorker {
    tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    last_error_code: Arc<AtomicU32>,
}

impl DiagnosticsWorker {
    pub fn spawn(
        name: &str,
        address: u16,
        bus: Arc<dyn EthercatBus>,
        sdo_timeout: Duration,
    ) -> Result<Self, DriverError> {
        // 容量 1：已有未处理的请求时新的请求直接丢弃
        let (tx, rx) = bounded::<()>(1);
        let last_error_code = Arc::new(AtomicU32::new(NO_ERROR_CODE));
        let code = last_error_code.clone();
        let device = name.to_string();

        let handle = std::thread::Builder::new()
            .name(format!("epos-diag-{name}"))
            .spawn(move || {
                // 发送端被丢弃时 recv 返回 Err，线程退出
                while rx.recv().is_ok() {
                    match bus.read_sdo::<u16>(address, OD_ERROR_CODE, 0x00, sdo_timeout) {
                        Ok(value) => {
                            error!("'{}' reports error code 0x{:04X}", device, value);
                            code.store(u32::from(value), Ordering::Release);
                        },
                        Err(e) => warn!("Failed to read error code of '{}': {}", device, e),
                    }
                }
                debug!("Diagnostics thread of '{}' exited", device);
            })
            .map_err(|e| DriverError::Thread(e.to_string()))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            last_error_code,
        })
    }

    /// 请求读取错误码；不阻塞，已有排队请求时返回 false
    pub fn request_error_code(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => false,
        }
    }

    pub fn last_error_code(&self) -> Option<u16> {
        match self.last_error_code.load(Ordering::Acquire) {
            NO_ERROR_CODE => None,
            // 只会存入 u16
            value => u16::try_from(value).ok(),
        }
    }
}

impl Drop for DiagnosticsWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Diagnostics thread panicked");
        }
    }
}
