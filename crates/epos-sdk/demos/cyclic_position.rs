//! 周期同步位置演示（模拟从站）
//!
//! 完整流程：
//! 1. 启动配置（PDO 映射、插补周期、运行模式）
//! 2. 启动周期线程
//! 3. 经 PDO 使能驱动器
//! 4. 按正弦轨迹暂存 CSP 命令
//! 5. 失能、停机
//!
//! # 运行
//!
//! ```bash
//! RUST_LOG=debug cargo run -p epos-sdk --example cyclic_position --features mock
//! ```

use epos_sdk::MockBus;
use epos_sdk::prelude::*;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CYCLE_PERIOD: Duration = Duration::from_millis(1);
const MOVE_DURATION: Duration = Duration::from_secs(2);
const AMPLITUDE_RAD: f64 = PI / 4.0;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    epos_sdk::init_logger()?;

    println!("EPOS SDK - 周期同步位置演示");
    println!("===========================\n");

    // ==================== 步骤 1: 启动配置 ====================
    println!("步骤 1: 启动配置...");
    let bus = Arc::new(MockBus::new(1));
    let epos = EposBuilder::new("joint1", 1, bus.clone())
        .configuration(Configuration {
            mode_of_operation: ModeOfOperation::CyclicSynchronousPosition,
            rx_pdo_type: RxPdoType::Csp,
            tx_pdo_type: TxPdoType::Csp,
            position_encoder_resolution: 4096,
            ..Default::default()
        })
        .build()?;
    epos.startup()?;
    let resolved = epos
        .resolved_configuration()
        .ok_or("configuration not resolved after startup")?;
    println!("   额定电流: {:.3} A\n", resolved.nominal_current_a());

    // ==================== 步骤 2: 周期线程 ====================
    let epos = Arc::new(epos);
    let worker = CyclicWorker::spawn(epos.clone(), CYCLE_PERIOD)?;

    // ==================== 步骤 3: 使能 ====================
    println!("步骤 3: 使能...");
    epos.set_drive_state_via_pdo(DriveState::OperationEnabled, true)?;
    println!("   驱动状态: {}\n", epos.reading().drive_state()?);

    // ==================== 步骤 4: 正弦轨迹 ====================
    println!("步骤 4: 正弦轨迹 ±{:.3} rad...", AMPLITUDE_RAD);
    let start = Instant::now();
    let mut last_print = start;
    while start.elapsed() < MOVE_DURATION {
        let t = start.elapsed().as_secs_f64();
        let position = AMPLITUDE_RAD * (2.0 * PI * 0.5 * t).sin();
        epos.stage_command(
            &Command::new(ModeOfOperation::CyclicSynchronousPosition)
                .with_target_position(position),
        )?;

        if last_print.elapsed() >= Duration::from_millis(250) {
            let staged = epos.staged_command();
            println!(
                "   t={:.2}s  目标 {:+.4} rad  线上 {:+6} inc",
                t, position, staged.target_position
            );
            last_print = Instant::now();
        }
        std::thread::sleep(CYCLE_PERIOD);
    }
    println!();

    // ==================== 步骤 5: 失能与停机 ====================
    println!("步骤 5: 失能与停机...");
    epos.set_drive_state_via_pdo(DriveState::SwitchOnDisabled, true)?;
    println!(
        "   周期数 {}，超时周期 {}",
        worker.cycles(),
        worker.overruns()
    );
    worker.stop();

    epos.pre_shutdown()?;
    epos.shutdown()?;

    let reading = epos.reading();
    println!("   累计错误: {}", reading.total_errors());
    for kind in ErrorKind::ALL {
        let count = reading.error_count(kind);
        if count > 0 {
            println!("     {:?}: {}", kind, count);
        }
    }
    println!("   从站状态: {}", bus.slave_state());
    Ok(())
}
