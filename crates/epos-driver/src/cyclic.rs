//! 周期线程
//!
//! 以固定周期依次调用 `update_write` 与 `update_read`。
//! 总线主站自行调度周期时不需要本模块，直接在主站回调里调用这两个方法即可。

use crate::epos::Epos;
use crate::error::DriverError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// 周期线程句柄，`stop()` 或 Drop 时停止并 join
pub struct CyclicWorker {
    is_running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl CyclicWorker {
    /// 启动周期线程
    pub fn spawn(device: Arc<Epos>, period: Duration) -> Result<Self, DriverError> {
        let is_running = Arc::new(AtomicBool::new(true));
        let cycles = Arc::new(AtomicU64::new(0));
        let overruns = Arc::new(AtomicU64::new(0));

        let handle = {
            let is_running = is_running.clone();
            let cycles = cycles.clone();
            let overruns = overruns.clone();
            std::thread::Builder::new()
                .name(format!("epos-cyclic-{}", device.name()))
                .spawn(move || cyclic_loop(&device, period, &is_running, &cycles, &overruns))
                .map_err(|e| DriverError::Thread(e.to_string()))?
        };

        Ok(Self {
            is_running,
            cycles,
            overruns,
            handle: Some(handle),
        })
    }

    /// 已完成的周期数
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// 超出周期的次数
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 停止并等待线程退出
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Cyclic thread panicked");
        }
    }
}

impl Drop for CyclicWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn cyclic_loop(
    device: &Epos,
    period: Duration,
    is_running: &AtomicBool,
    cycles: &AtomicU64,
    overruns: &AtomicU64,
) {
    #[cfg(feature = "realtime")]
    raise_priority(device.name());

    debug!(
        "Cyclic thread of '{}' started ({:?} period)",
        device.name(),
        period
    );
    let mut next = Instant::now();
    while is_running.load(Ordering::Acquire) {
        device.update_write();
        device.update_read();
        cycles.fetch_add(1, Ordering::Relaxed);

        next += period;
        let now = Instant::now();
        if next > now {
            // spin_sleep 提供微秒级精度
            spin_sleep::sleep(next - now);
        } else {
            overruns.fetch_add(1, Ordering::Relaxed);
            trace!("'{}': cycle overrun by {:?}", device.name(), now - next);
            next = now;
        }
    }
    debug!("Cyclic thread of '{}' exited", device.name());
}

/// 周期线程使用最高优先级，失败时继续以普通优先级运行
#[cfg(feature = "realtime")]
fn raise_priority(name: &str) {
    use thread_priority::{ThreadPriority, set_current_thread_priority};

    if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
        tracing::warn!(
            "'{}': cyclic thread keeps normal priority ({}); grant CAP_SYS_NICE or use rtkit on Linux",
            name,
            e
        );
        return;
    }
    tracing::info!("'{}': cyclic thread runs at realtime priority", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use epos_bus::MockBus;
    use epos_protocol::DriveState;

    fn started() -> (Arc<MockBus>, Arc<Epos>) {
        let bus = Arc::new(MockBus::new(1));
        let config = Configuration {
            sdo_verify_timeout_us: 0,
            startup_settle_ms: 0,
            min_successful_target_state_readings: 2,
            drive_state_change_max_timeout_us: 2_000_000,
            ..Default::default()
        };
        let epos = Arc::new(Epos::new("joint1", 1, bus.clone(), config).unwrap());
        epos.startup().unwrap();
        (bus, epos)
    }

    #[test]
    fn test_runs_and_stops() {
        let (bus, epos) = started();
        let worker = CyclicWorker::spawn(epos.clone(), Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(worker.is_running());
        worker.stop();

        let frames = bus.rx_frames().len();
        assert!(frames > 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(bus.rx_frames().len(), frames);
        assert!(epos.reading().updated_at().is_some());
    }

    #[test]
    fn test_blocking_pdo_transition() {
        let (bus, epos) = started();
        let _worker = CyclicWorker::spawn(epos.clone(), Duration::from_millis(1)).unwrap();
        epos.set_drive_state_via_pdo(DriveState::OperationEnabled, true)
            .unwrap();
        assert_eq!(bus.drive_state(), DriveState::OperationEnabled);
        assert_eq!(epos.controlword().raw(), 0x000F);
    }

    #[cfg(feature = "realtime")]
    #[test]
    fn test_raise_priority_never_fails_the_thread() {
        // 没有权限时只记录日志
        let handle = std::thread::spawn(|| raise_priority("joint1"));
        assert!(handle.join().is_ok());
    }
}
