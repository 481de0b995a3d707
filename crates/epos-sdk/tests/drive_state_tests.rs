//! 驱动状态切换集成测试
//!
//! 使用 MockBus 模拟从站，覆盖 SDO 同步切换与 PDO 周期切换。

use epos_bus::MockBus;
use epos_sdk::prelude::*;
use epos_sdk::protocol::transition_path;
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fast_config() -> Configuration {
    Configuration {
        sdo_verify_timeout_us: 0,
        startup_settle_ms: 0,
        ..Default::default()
    }
}

fn started(config: Configuration) -> (Arc<MockBus>, Arc<Epos>) {
    let bus = Arc::new(MockBus::new(1));
    let epos = EposBuilder::new("joint1", 1, bus.clone())
        .configuration(config)
        .build()
        .expect("Failed to create Epos");
    epos.startup().expect("Startup failed");
    bus.clear_logs();
    (bus, Arc::new(epos))
}

/// 每一对（目标，当前）状态：控制字序列与状态表一致
#[test]
fn test_sdo_paths_match_table() {
    for target in DriveState::ALL {
        for current in DriveState::ALL {
            let (bus, epos) = started(fast_config());
            bus.set_drive_state(current);

            let result = epos.set_drive_state_via_sdo(target);
            if target == DriveState::Fault {
                // 已在 Fault 时视为已到达，否则不可请求
                assert_eq!(result.is_ok(), current == DriveState::Fault, "{current} -> Fault");
                assert!(bus.sdo_controlwords().is_empty());
                continue;
            }

            result.unwrap_or_else(|e| panic!("{current} -> {target}: {e}"));
            let expected: Vec<u16> = transition_path(target, current)
                .unwrap()
                .iter()
                .map(|t| t.raw_controlword())
                .collect();
            assert_eq!(bus.sdo_controlwords(), expected, "{current} -> {target}");
            assert_eq!(bus.drive_state(), target);
        }
    }
}

/// SwitchOnDisabled → OperationEnabled 为 T2、T3、T4；T3 失败时不再尝试 T4
#[test]
fn test_sdo_enable_stops_on_failure() {
    let (bus, epos) = started(fast_config());
    epos.set_drive_state_via_sdo(DriveState::OperationEnabled)
        .unwrap();
    assert_eq!(bus.sdo_controlwords(), vec![0x0006, 0x0007, 0x000F]);

    let (bus, epos) = started(fast_config());
    bus.fail_controlword_write_at(2);
    assert!(
        epos.set_drive_state_via_sdo(DriveState::OperationEnabled)
            .is_err()
    );
    assert_eq!(bus.sdo_controlwords(), vec![0x0006, 0x0007]);
    assert_eq!(
        epos.reading()
            .error_count(ErrorKind::SdoStateTransitionError),
        1
    );
}

/// 已处于目标状态：SDO 与 PDO 两条路径都立即成功
#[test]
#[serial]
fn test_already_in_target_succeeds() {
    let (bus, epos) = started(fast_config());
    epos.set_drive_state_via_sdo(DriveState::SwitchOnDisabled)
        .unwrap();
    assert!(bus.sdo_controlwords().is_empty());

    let worker = CyclicWorker::spawn(epos.clone(), Duration::from_millis(1)).unwrap();
    let start = Instant::now();
    epos.set_drive_state_via_pdo(DriveState::SwitchOnDisabled, true)
        .unwrap();
    assert!(start.elapsed() < epos.configuration().drive_state_change_max_timeout());
    worker.stop();
    assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);
}

/// 周期线程驱动的 PDO 切换：使能后再关闭
#[test]
#[serial]
fn test_pdo_enable_and_disable() {
    let (bus, epos) = started(Configuration {
        drive_state_change_max_timeout_us: 2_000_000,
        ..fast_config()
    });
    let _worker = CyclicWorker::spawn(epos.clone(), Duration::from_millis(1)).unwrap();

    epos.set_drive_state_via_pdo(DriveState::OperationEnabled, true)
        .unwrap();
    assert_eq!(bus.drive_state(), DriveState::OperationEnabled);
    assert_eq!(
        epos.reading().drive_state().unwrap(),
        DriveState::OperationEnabled
    );

    epos.set_drive_state_via_pdo(DriveState::SwitchOnDisabled, true)
        .unwrap();
    assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);
    // PDO 切换不经过 SDO 写控制字
    assert!(bus.sdo_controlwords().is_empty());
}

/// 设备卡住：按最小间隔重发同一控制字，阻塞等待不早于最大超时返回
#[test]
#[serial]
fn test_stuck_device_times_out() {
    let (bus, epos) = started(Configuration {
        drive_state_change_min_timeout_us: 10_000,
        drive_state_change_max_timeout_us: 100_000,
        ..fast_config()
    });
    bus.set_stuck(true);
    let worker = CyclicWorker::spawn(epos.clone(), Duration::from_millis(1)).unwrap();

    let start = Instant::now();
    let result = epos.set_drive_state_via_pdo(DriveState::ReadyToSwitchOn, true);
    let elapsed = start.elapsed();

    assert!(matches!(
        result,
        Err(DriverError::StateChangeTimeout {
            target: DriveState::ReadyToSwitchOn,
            timeout_ms: 100
        })
    ));
    assert!(elapsed >= Duration::from_millis(100), "returned after {elapsed:?}");
    // 超时后引擎继续工作
    assert!(epos.is_drive_state_change_pending());
    epos.cancel_drive_state_change();
    worker.stop();

    // 只下发过初始控制字与 Shutdown
    let frames = bus.rx_frames();
    let changes: Vec<Instant> = frames
        .windows(2)
        .filter(|w| w[0].frame.controlword() != w[1].frame.controlword())
        .map(|w| w[1].at)
        .collect();
    assert!(
        frames
            .iter()
            .all(|r| matches!(r.frame.controlword(), 0x0000 | 0x0006))
    );
    assert!(!changes.is_empty());
    assert!(
        epos.reading()
            .has_error(ErrorKind::PdoStateTransitionError)
    );
}

/// 故障复位：Fault → SwitchOnDisabled 经 T15
#[test]
fn test_fault_reset_via_sdo() {
    let (bus, epos) = started(fast_config());
    bus.inject_fault(0x3210);
    epos.set_drive_state_via_sdo(DriveState::SwitchOnDisabled)
        .unwrap();
    assert_eq!(bus.sdo_controlwords(), vec![0x0080]);
    assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);
}

/// 停机流程：QuickStopActive → SwitchOnDisabled，然后 INIT
#[test]
fn test_pre_shutdown_and_shutdown() {
    let (bus, epos) = started(fast_config());
    epos.set_drive_state_via_sdo(DriveState::OperationEnabled)
        .unwrap();
    bus.clear_logs();

    epos.pre_shutdown().unwrap();
    // OE → QSA：T11；QSA → SOD：T12
    assert_eq!(bus.sdo_controlwords(), vec![0x0002, 0x0000]);
    assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);

    epos.shutdown().unwrap();
    assert_eq!(bus.slave_state(), SlaveState::Init);
}
