//! 驱动器实例
//!
//! 一个 [`Epos`] 对应总线上的一个从站，所有方法取 `&self`，
//! 可通过 `Arc<Epos>` 在控制线程与周期线程之间共享：
//! - 控制线程：`startup`、`stage_command`、状态切换请求、`reading`
//! - 周期线程：`update_write` / `update_read`（见 `exchange` 模块）
//!
//! 周期数据（控制字、状态切换引擎、工作副本 Reading）由一把锁保护，
//! 暂存命令另用一把锁，Reading 快照通过 ArcSwap 发布。

use crate::command::{Command, ModeDecision, ScaleFactors, StagedCommand, StagingSlot};
use crate::config::{Configuration, ResolvedConfiguration};
use crate::diagnostics::DiagnosticsWorker;
use crate::engine::{PdoTransitionEngine, RequestStatus};
use crate::error::DriverError;
use crate::reading::{ErrorKind, Reading, ReadingFactors};
use arc_swap::{ArcSwap, ArcSwapOption};
use epos_bus::{EthercatBus, PdoSizes, SlaveState};
use epos_protocol::od::{OD_MODES_OF_OPERATION, OD_MOTOR_DATA, SUB_MOTOR_DATA_NOMINAL_CURRENT};
use epos_protocol::{Controlword, DriveState, ModeOfOperation};
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 启动时等待 PRE-OP 的重试次数与间隔
const PRE_OP_RETRIES: u32 = 50;
const PRE_OP_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// 周期线程与控制线程共享的数据
pub(crate) struct CyclicState {
    pub controlword: Controlword,
    pub engine: PdoTransitionEngine,
    /// 工作副本，每个读周期结束后发布
    pub reading: Reading,
    /// 上次 tick 之后是否完成过一次读周期
    pub has_read: bool,
    /// 布局大小与主站协商结果一致
    pub rx_layout_ok: bool,
    pub tx_layout_ok: bool,
    pub pdo_sizes: Option<PdoSizes>,
    pub last_drive_state: Option<DriveState>,
    // 只在边沿打日志
    pub write_failing: bool,
    pub read_failing: bool,
    pub mode_missing: bool,
}

/// Maxon EPOS 驱动器（单个 EtherCAT 从站）
pub struct Epos {
    pub(crate) name: String,
    pub(crate) address: u16,
    pub(crate) bus: Arc<dyn EthercatBus>,
    pub(crate) configuration: Configuration,
    /// `startup` 之后（或配置了额定电流时构造后）可用
    pub(crate) resolved: ArcSwapOption<ResolvedConfiguration>,
    pub(crate) cyclic: Mutex<CyclicState>,
    /// 状态切换完成/取消时通知
    pub(crate) state_changed: Condvar,
    pub(crate) staging: Mutex<StagingSlot>,
    pub(crate) snapshot: ArcSwap<Reading>,
    pub(crate) diagnostics: DiagnosticsWorker,
}

impl Epos {
    /// 创建驱动器实例
    ///
    /// 不访问总线（诊断线程除外）；配置了 `nominal_current_a` 时立即得到解析后的配置，
    /// 否则在 `startup` 中从驱动器读取额定电流。
    pub fn new(
        name: impl Into<String>,
        address: u16,
        bus: Arc<dyn EthercatBus>,
        configuration: Configuration,
    ) -> Result<Self, DriverError> {
        let name = name.into();
        configuration.validate()?;

        let diagnostics =
            DiagnosticsWorker::spawn(&name, address, bus.clone(), configuration.sdo_timeout())?;
        let reading = Reading::new(configuration.error_storage_capacity);
        let state = CyclicState {
            controlword: Controlword::zero(),
            engine: PdoTransitionEngine::new(
                configuration.drive_state_change_min_timeout(),
                configuration.min_successful_target_state_readings,
            ),
            reading: reading.clone(),
            has_read: false,
            rx_layout_ok: true,
            tx_layout_ok: true,
            pdo_sizes: None,
            last_drive_state: None,
            write_failing: false,
            read_failing: false,
            mode_missing: false,
        };

        let epos = Self {
            staging: Mutex::new(StagingSlot::new(configuration.mode_of_operation)),
            name,
            address,
            bus,
            resolved: ArcSwapOption::empty(),
            cyclic: Mutex::new(state),
            state_changed: Condvar::new(),
            snapshot: ArcSwap::from_pointee(reading),
            diagnostics,
            configuration,
        };

        if epos.configuration.nominal_current_a > 0.0 {
            let resolved = epos.configuration.resolve(None)?;
            epos.apply_resolved(resolved);
        }

        info!(
            "Created EPOS '{}' at slave {} (mode {}, rx {}, tx {})",
            epos.name,
            epos.address,
            epos.configuration.mode_of_operation,
            epos.configuration.rx_pdo_type,
            epos.configuration.tx_pdo_type
        );
        Ok(epos)
    }

    // ============================================================
    // 访问器
    // ============================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// 解析后的配置（尚未解析时为 `None`）
    pub fn resolved_configuration(&self) -> Option<Arc<ResolvedConfiguration>> {
        self.resolved.load_full()
    }

    /// 启动时读到的主站协商 PDO 大小
    pub fn pdo_sizes(&self) -> Option<PdoSizes> {
        self.cyclic.lock().pdo_sizes
    }

    /// 当前运行模式
    pub fn active_mode(&self) -> ModeOfOperation {
        self.staging.lock().active_mode
    }

    /// 最近一次暂存的命令
    pub fn staged_command(&self) -> StagedCommand {
        self.staging.lock().command
    }

    /// 周期线程当前下发的控制字
    pub fn controlword(&self) -> Controlword {
        self.cyclic.lock().controlword
    }

    /// 最近一次读周期的反馈（按值拷贝）
    pub fn reading(&self) -> Reading {
        Reading::clone(&self.snapshot.load())
    }

    // ============================================================
    // 生命周期
    // ============================================================

    /// 启动配置
    ///
    /// 等待从站进入 PRE-OP 后依次完成：额定电流读取与配置解析、PDO 映射、
    /// 插补周期、初始运行模式、PDO 大小检查、模式相关参数。
    /// 单个步骤失败不会中断后续步骤，全部完成后汇总返回。
    pub fn startup(&self) -> Result<(), DriverError> {
        info!("Starting up '{}' (slave {})", self.name, self.address);

        if !self.bus.wait_for_state(
            SlaveState::PreOperational,
            self.address,
            PRE_OP_RETRIES,
            PRE_OP_RETRY_INTERVAL,
        ) {
            error!("'{}' did not reach {}", self.name, SlaveState::PreOperational);
            self.record_error(ErrorKind::ConfigurationError);
            return Err(DriverError::SlaveState {
                name: self.name.clone(),
                state: SlaveState::PreOperational,
            });
        }
        std::thread::sleep(self.configuration.startup_settle());

        let mut failed: SmallVec<[&'static str; 8]> = SmallVec::new();
        let mut check = |step: &'static str, result: Result<(), DriverError>| {
            if let Err(e) = result {
                error!("Startup of '{}' failed at {}: {}", self.name, step, e);
                failed.push(step);
            }
        };

        check("nominal current", self.resolve_configuration());
        check(
            "pdo mapping",
            self.map_pdos(self.configuration.rx_pdo_type, self.configuration.tx_pdo_type),
        );
        check("interpolation period", self.configure_interpolation_period());
        check(
            "mode of operation",
            self.verify_write_sdo(
                OD_MODES_OF_OPERATION,
                0x00,
                self.configuration.mode_of_operation.raw(),
            ),
        );
        check("pdo sizes", self.check_pdo_sizes());
        check("parameters", self.configure_parameters());

        if !failed.is_empty() {
            self.record_error(ErrorKind::ConfigurationError);
            return Err(DriverError::Startup {
                name: self.name.clone(),
                failed_steps: failed.into_vec(),
            });
        }
        info!("'{}' configured", self.name);
        Ok(())
    }

    /// 停机前：经 SDO 依次切换到 QuickStopActive 与 SwitchOnDisabled
    pub fn pre_shutdown(&self) -> Result<(), DriverError> {
        info!("Pre-shutdown of '{}'", self.name);
        self.cancel_drive_state_change();
        let quick_stop = self.set_drive_state_via_sdo(DriveState::QuickStopActive);
        let disabled = self.set_drive_state_via_sdo(DriveState::SwitchOnDisabled);
        quick_stop.and(disabled)
    }

    /// 从站切回 INIT
    pub fn shutdown(&self) -> Result<(), DriverError> {
        info!("Shutting down '{}'", self.name);
        self.bus.set_state(SlaveState::Init, self.address)?;
        Ok(())
    }

    fn resolve_configuration(&self) -> Result<(), DriverError> {
        let discovered = if self.configuration.nominal_current_a > 0.0 {
            None
        } else {
            let current_ma: u32 =
                self.read_sdo(OD_MOTOR_DATA, SUB_MOTOR_DATA_NOMINAL_CURRENT)?;
            debug!("'{}' nominal current: {} mA", self.name, current_ma);
            Some(current_ma)
        };
        let resolved = self.configuration.resolve(discovered)?;
        self.apply_resolved(resolved);
        Ok(())
    }

    fn apply_resolved(&self, resolved: ResolvedConfiguration) {
        let factors = ReadingFactors::from_resolved(&resolved);
        {
            let mut state = self.cyclic.lock();
            state
                .reading
                .configure(factors, self.configuration.error_storage_capacity);
            self.publish(&state);
        }
        self.resolved.store(Some(Arc::new(resolved)));
    }

    fn check_pdo_sizes(&self) -> Result<(), DriverError> {
        let sizes = self.bus.hardware_pdo_sizes(self.address)?;
        let rx_expected = self.configuration.rx_pdo_type.size();
        let tx_expected = self.configuration.tx_pdo_type.size();

        let mut state = self.cyclic.lock();
        state.pdo_sizes = Some(sizes);
        state.rx_layout_ok = sizes.rx == rx_expected;
        state.tx_layout_ok = sizes.tx == tx_expected;
        if !state.rx_layout_ok {
            error!(
                "'{}': RxPDO {} needs {} bytes, master negotiated {}",
                self.name, self.configuration.rx_pdo_type, rx_expected, sizes.rx
            );
            state.reading.add_error(ErrorKind::RxPdoTypeError);
        }
        if !state.tx_layout_ok {
            error!(
                "'{}': TxPDO {} needs {} bytes, master negotiated {}",
                self.name, self.configuration.tx_pdo_type, tx_expected, sizes.tx
            );
            state.reading.add_error(ErrorKind::TxPdoTypeError);
        }
        self.publish(&state);
        Ok(())
    }

    // ============================================================
    // 命令
    // ============================================================

    /// 换算并暂存命令，下一个写周期生效
    ///
    /// 不允许切换模式时，与当前模式不同的请求会被拒绝（记录错误日志），
    /// 命令仍按当前模式暂存。
    pub fn stage_command(&self, command: &Command) -> Result<(), DriverError> {
        let resolved = self
            .resolved
            .load_full()
            .ok_or_else(|| DriverError::NotStarted(self.name.clone()))?;
        let factors = ScaleFactors::from_resolved(&resolved);

        let mut slot = self.staging.lock();
        let mode = match slot.decide_mode(command.mode_of_operation, resolved.allow_mode_change()) {
            ModeDecision::Use(mode) => mode,
            ModeDecision::Rejected { requested, active } => {
                error!(
                    "'{}': changing the mode of operation from {} to {} is not allowed with this configuration",
                    self.name, active, requested
                );
                active
            },
        };
        if mode != slot.active_mode {
            info!(
                "'{}': mode of operation {} -> {}",
                self.name, slot.active_mode, mode
            );
        }
        slot.command = StagedCommand::from_command(command, &factors, mode);
        slot.active_mode = mode;
        Ok(())
    }

    // ============================================================
    // PDO 状态切换
    // ============================================================

    /// 经周期 PDO 切换驱动状态
    ///
    /// `wait == false` 时只登记请求；否则阻塞直到完成、被取消/替代，
    /// 或超过 `drive_state_change_max_timeout`。超时后引擎继续工作。
    pub fn set_drive_state_via_pdo(&self, target: DriveState, wait: bool) -> Result<(), DriverError> {
        let mut state = self.cyclic.lock();
        let Some(generation) = state.engine.request(target, Instant::now()) else {
            state.reading.add_error(ErrorKind::PdoStateTransitionError);
            self.publish(&state);
            error!("'{}': {} cannot be requested", self.name, target);
            return Err(DriverError::UnreachableTarget { target });
        };
        state.has_read = false;
        // 唤醒被替代的等待者
        self.state_changed.notify_all();
        debug!("'{}': requested {} via PDO", self.name, target);

        if !wait {
            return Ok(());
        }

        let timeout = self.configuration.drive_state_change_max_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            match state.engine.status(generation) {
                RequestStatus::Completed => return Ok(()),
                RequestStatus::Abandoned => return Err(DriverError::StateChangeCancelled { target }),
                RequestStatus::Pending => {},
            }
            if self.state_changed.wait_until(&mut state, deadline).timed_out() {
                if state.engine.status(generation) == RequestStatus::Completed {
                    return Ok(());
                }
                state.reading.add_error(ErrorKind::PdoStateTransitionError);
                self.publish(&state);
                warn!(
                    "'{}': drive state change to {} timed out after {:?}",
                    self.name, target, timeout
                );
                return Err(DriverError::StateChangeTimeout {
                    target,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }
    }

    /// 取消进行中的 PDO 状态切换，返回被取消的目标
    pub fn cancel_drive_state_change(&self) -> Option<DriveState> {
        let mut state = self.cyclic.lock();
        let cancelled = state.engine.cancel();
        if let Some(target) = cancelled {
            debug!("'{}': cancelled drive state change to {}", self.name, target);
            self.state_changed.notify_all();
        }
        cancelled
    }

    /// 是否有进行中的 PDO 状态切换
    pub fn is_drive_state_change_pending(&self) -> bool {
        self.cyclic.lock().engine.is_pending()
    }

    // ============================================================
    // 内部
    // ============================================================

    /// 发布工作副本（调用方持有周期锁）
    pub(crate) fn publish(&self, state: &CyclicState) {
        self.snapshot.store(Arc::new(state.reading.clone()));
    }

    pub(crate) fn record_error(&self, kind: ErrorKind) {
        let mut state = self.cyclic.lock();
        state.reading.add_error(kind);
        self.publish(&state);
    }
}

impl std::fmt::Debug for Epos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Epos")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("configuration", &self.configuration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epos_bus::MockBus;
    use epos_protocol::od::*;
    use epos_protocol::{RxPdoType, TxPdoType};
    use std::f64::consts::PI;

    fn fast_config() -> Configuration {
        Configuration {
            sdo_verify_timeout_us: 0,
            startup_settle_ms: 0,
            ..Default::default()
        }
    }

    fn device(config: Configuration) -> (Arc<MockBus>, Epos) {
        let bus = Arc::new(MockBus::new(1));
        let epos = Epos::new("joint1", 1, bus.clone(), config).unwrap();
        (bus, epos)
    }

    #[test]
    fn test_new_rejects_invalid_configuration() {
        let bus = Arc::new(MockBus::new(1));
        let config = Configuration {
            position_encoder_resolution: 0,
            ..Default::default()
        };
        assert!(matches!(
            Epos::new("joint1", 1, bus, config),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_stage_before_resolution_fails() {
        let (_bus, epos) = device(fast_config());
        assert!(epos.resolved_configuration().is_none());
        let err = epos.stage_command(&Command::default()).unwrap_err();
        assert!(matches!(err, DriverError::NotStarted(name) if name == "joint1"));
    }

    #[test]
    fn test_configured_current_resolves_at_construction() {
        let (_bus, epos) = device(Configuration {
            nominal_current_a: 2.0,
            ..fast_config()
        });
        let resolved = epos.resolved_configuration().unwrap();
        assert_eq!(resolved.nominal_current_a(), 2.0);
        epos.stage_command(&Command::default().with_target_position(PI / 2.0))
            .unwrap();
        assert_eq!(epos.staged_command().target_position, 1024);
    }

    #[test]
    fn test_startup_configures_drive() {
        let (bus, epos) = device(fast_config());
        epos.startup().unwrap();

        let resolved = epos.resolved_configuration().unwrap();
        assert_eq!(resolved.nominal_current_a(), 4.0);
        assert_eq!(bus.rx_layout(), Some(RxPdoType::Csp));
        assert_eq!(bus.tx_layout(), Some(TxPdoType::Csp));
        assert_eq!(
            bus.object(OD_INTERPOLATION_TIME_PERIOD, SUB_INTERPOLATION_TIME_PERIOD_VALUE),
            Some(vec![1])
        );
        assert_eq!(
            bus.object(OD_INTERPOLATION_TIME_PERIOD, SUB_INTERPOLATION_TIME_INDEX),
            Some(vec![(-3i8) as u8])
        );
        assert_eq!(bus.object(OD_MODES_OF_OPERATION, 0), Some(vec![8]));
        assert_eq!(epos.pdo_sizes(), Some(PdoSizes { rx: 13, tx: 12 }));
        assert_eq!(epos.reading().total_errors(), 0);
        assert_eq!(epos.reading().factors().current, 0.004);
    }

    #[test]
    fn test_startup_requires_pre_op() {
        let bus = Arc::new(MockBus::new(1).with_slave_state(SlaveState::Init));
        let epos = Epos::new("joint1", 1, bus, fast_config()).unwrap();
        let err = epos.startup().unwrap_err();
        assert!(matches!(
            err,
            DriverError::SlaveState {
                state: SlaveState::PreOperational,
                ..
            }
        ));
        assert!(epos.reading().has_error(ErrorKind::ConfigurationError));
    }

    #[test]
    fn test_startup_collects_failed_steps() {
        let (bus, epos) = device(fast_config());
        bus.fail_sdo_read(OD_MOTOR_DATA, SUB_MOTOR_DATA_NOMINAL_CURRENT);
        bus.drop_sdo_write(OD_MODES_OF_OPERATION, 0x00);

        match epos.startup().unwrap_err() {
            DriverError::Startup { name, failed_steps } => {
                assert_eq!(name, "joint1");
                assert_eq!(failed_steps, vec!["nominal current", "mode of operation"]);
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(epos.reading().error_count(ErrorKind::ConfigurationError), 1);
        assert!(epos.resolved_configuration().is_none());
    }

    #[test]
    fn test_startup_flags_layout_size_mismatch() {
        let bus = Arc::new(MockBus::new(1).with_pdo_sizes(PdoSizes { rx: 13, tx: 2 }));
        let epos = Epos::new("joint1", 1, bus, fast_config()).unwrap();
        epos.startup().unwrap();
        let reading = epos.reading();
        assert!(!reading.has_error(ErrorKind::RxPdoTypeError));
        assert!(reading.has_error(ErrorKind::TxPdoTypeError));
    }

    #[test]
    fn test_mode_change_rejected_without_multi_mode() {
        let (_bus, epos) = device(Configuration {
            nominal_current_a: 1.0,
            ..fast_config()
        });
        epos.stage_command(&Command::new(ModeOfOperation::CyclicSynchronousTorque))
            .unwrap();
        assert_eq!(epos.active_mode(), ModeOfOperation::CyclicSynchronousPosition);
        assert_eq!(
            epos.staged_command().mode_of_operation,
            ModeOfOperation::CyclicSynchronousPosition
        );
    }

    #[test]
    fn test_mode_change_allowed_with_standard_layouts() {
        let (_bus, epos) = device(Configuration {
            nominal_current_a: 1.0,
            use_multiple_modes_of_operation: true,
            rx_pdo_type: RxPdoType::Standard,
            tx_pdo_type: TxPdoType::Standard,
            ..fast_config()
        });
        epos.stage_command(&Command::new(ModeOfOperation::ProfileVelocity))
            .unwrap();
        assert_eq!(epos.active_mode(), ModeOfOperation::ProfileVelocity);
        // NotAvailable 沿用当前模式
        epos.stage_command(&Command::default()).unwrap();
        assert_eq!(epos.active_mode(), ModeOfOperation::ProfileVelocity);
    }

    #[test]
    fn test_pdo_fault_target_is_rejected() {
        let (_bus, epos) = device(fast_config());
        let err = epos
            .set_drive_state_via_pdo(DriveState::Fault, false)
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::UnreachableTarget {
                target: DriveState::Fault
            }
        ));
        assert!(!epos.is_drive_state_change_pending());
        assert!(epos.reading().has_error(ErrorKind::PdoStateTransitionError));
    }

    #[test]
    fn test_pdo_wait_reports_timeout_in_ms() {
        // 没有周期线程，引擎不会推进
        let (_bus, epos) = device(Configuration {
            drive_state_change_min_timeout_us: 1_000,
            drive_state_change_max_timeout_us: 20_000,
            ..fast_config()
        });
        let start = Instant::now();
        let err = epos
            .set_drive_state_via_pdo(DriveState::ReadyToSwitchOn, true)
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(matches!(
            err,
            DriverError::StateChangeTimeout {
                target: DriveState::ReadyToSwitchOn,
                timeout_ms: 20
            }
        ));
        assert!(epos.is_drive_state_change_pending());
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let (_bus, epos) = device(Configuration {
            drive_state_change_max_timeout_us: 5_000_000,
            ..fast_config()
        });
        let epos = Arc::new(epos);
        let waiter = {
            let epos = epos.clone();
            std::thread::spawn(move || epos.set_drive_state_via_pdo(DriveState::OperationEnabled, true))
        };
        while !epos.is_drive_state_change_pending() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            epos.cancel_drive_state_change(),
            Some(DriveState::OperationEnabled)
        );
        let result = waiter.join().unwrap();
        assert!(matches!(
            result,
            Err(DriverError::StateChangeCancelled {
                target: DriveState::OperationEnabled
            })
        ));
    }

    #[test]
    fn test_shutdown_requests_init() {
        let (bus, epos) = device(fast_config());
        epos.shutdown().unwrap();
        assert_eq!(bus.state_requests(), vec![SlaveState::Init]);
        assert_eq!(bus.slave_state(), SlaveState::Init);
    }
}
