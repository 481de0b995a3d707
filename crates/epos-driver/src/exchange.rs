//! 周期过程数据交换
//!
//! 周期线程每个总线周期依次调用 [`Epos::update_write`] 与 [`Epos::update_read`]。
//! 两者都在周期锁内完成，错误只记录到 Reading，不中断周期。

use crate::command::StagedCommand;
use crate::engine::TickOutcome;
use crate::epos::Epos;
use crate::error::DriverError;
use crate::reading::ErrorKind;
use epos_protocol::{
    Controlword, DriveState, ModeOfOperation, ProtocolError, RxPdoCst, RxPdoCstCsp, RxPdoCsp,
    RxPdoCsv, RxPdoFrame, RxPdoPvm, RxPdoStandard, RxPdoType, TxPdoFrame,
};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// TxPDO 读缓冲（所有布局都不超过该长度）
const TX_BUFFER_SIZE: usize = 16;

/// 按布局组装 RxPDO
pub(crate) fn build_rx_frame(
    layout: RxPdoType,
    controlword: Controlword,
    staged: &StagedCommand,
) -> RxPdoFrame {
    let controlword = controlword.raw();
    let mode_of_operation = staged.mode_of_operation.raw();
    match layout {
        RxPdoType::Standard => RxPdoFrame::Standard(RxPdoStandard {
            controlword,
            mode_of_operation,
        }),
        RxPdoType::Csp => RxPdoFrame::Csp(RxPdoCsp {
            target_position: staged.target_position,
            position_offset: staged.position_offset,
            torque_offset: staged.torque_offset,
            controlword,
            mode_of_operation,
        }),
        RxPdoType::Cst => RxPdoFrame::Cst(RxPdoCst {
            target_torque: staged.target_torque,
            torque_offset: staged.torque_offset,
            controlword,
            mode_of_operation,
        }),
        RxPdoType::Csv => RxPdoFrame::Csv(RxPdoCsv {
            target_velocity: staged.target_velocity,
            velocity_offset: staged.velocity_offset,
            controlword,
            mode_of_operation,
        }),
        RxPdoType::CstCsp => RxPdoFrame::CstCsp(RxPdoCstCsp {
            target_position: staged.target_position,
            position_offset: staged.position_offset,
            target_torque: staged.target_torque,
            torque_offset: staged.torque_offset,
            controlword,
            mode_of_operation,
        }),
        RxPdoType::Pvm => RxPdoFrame::Pvm(RxPdoPvm {
            controlword,
            target_velocity: staged.target_velocity,
            profile_acceleration: staged.profile_acceleration,
            profile_deceleration: staged.profile_deceleration,
            motion_profile_type: staged.motion_profile_type,
        }),
    }
}

impl Epos {
    /// 写周期：推进状态切换引擎，下发 RxPDO
    pub fn update_write(&self) {
        let mut guard = self.cyclic.lock();
        let state = &mut *guard;

        if !state.rx_layout_ok {
            state.reading.add_error(ErrorKind::RxPdoTypeError);
            return;
        }

        let slot = *self.staging.lock();
        if slot.active_mode == ModeOfOperation::NotAvailable {
            state.reading.add_error(ErrorKind::ModeOfOperationError);
            if !state.mode_missing {
                error!("'{}': no mode of operation set, RxPDO not written", self.name);
                state.mode_missing = true;
            }
            return;
        }
        state.mode_missing = false;

        if state.engine.is_pending() && state.has_read {
            let current = state.reading.drive_state();
            match state
                .engine
                .tick(current, &mut state.controlword, Instant::now())
            {
                TickOutcome::Applied(transition) => debug!(
                    "'{}': {} via PDO (controlword {})",
                    self.name, transition, state.controlword
                ),
                TickOutcome::Reached(target) => {
                    info!("'{}' reached {} via PDO", self.name, target);
                    self.state_changed.notify_all();
                },
                TickOutcome::Undecodable => {
                    trace!("'{}': undecodable drive state, holding controlword", self.name)
                },
                TickOutcome::Idle | TickOutcome::Waiting => {},
            }
            state.has_read = false;
        }

        let frame = build_rx_frame(
            self.configuration.rx_pdo_type,
            state.controlword,
            &slot.command,
        );
        match self.bus.write_rx_pdo(self.address, &frame.encode()) {
            Ok(()) => {
                if state.write_failing {
                    info!("'{}': RxPDO write recovered", self.name);
                    state.write_failing = false;
                }
            },
            Err(e) => {
                state.reading.add_error(ErrorKind::PdoWriteError);
                if !state.write_failing {
                    warn!("'{}': RxPDO write failed: {}", self.name, e);
                    state.write_failing = true;
                }
            },
        }
    }

    /// 读周期：读取 TxPDO，更新并发布 Reading
    pub fn update_read(&self) {
        let mut guard = self.cyclic.lock();
        let state = &mut *guard;

        if !state.tx_layout_ok {
            state.reading.add_error(ErrorKind::TxPdoTypeError);
            self.publish(state);
            return;
        }

        let layout = self.configuration.tx_pdo_type;
        let expected = layout.size();
        let mut buf = [0u8; TX_BUFFER_SIZE];
        let frame = self
            .bus
            .read_tx_pdo(self.address, &mut buf[..expected])
            .map_err(DriverError::from)
            .and_then(|len| {
                // 传输层报告的长度不可信，必须与布局一致
                if len != expected {
                    return Err(ProtocolError::InvalidLength {
                        expected,
                        actual: len,
                    }
                    .into());
                }
                TxPdoFrame::decode(layout, &buf[..len]).map_err(DriverError::from)
            });
        let frame = match frame {
            Ok(frame) => {
                if state.read_failing {
                    info!("'{}': TxPDO read recovered", self.name);
                    state.read_failing = false;
                }
                frame
            },
            Err(e) => {
                state.reading.add_error(ErrorKind::PdoReadError);
                if !state.read_failing {
                    warn!("'{}': TxPDO read failed: {}", self.name, e);
                    state.read_failing = true;
                }
                self.publish(state);
                return;
            },
        };

        state.reading.update_from_frame(&frame, Instant::now());
        state.has_read = true;

        match state.reading.drive_state() {
            Ok(drive_state) => {
                if state.last_drive_state != Some(drive_state) {
                    debug!("'{}' is now {}", self.name, drive_state);
                    if drive_state == DriveState::Fault {
                        warn!(
                            "'{}' entered Fault (statusword {})",
                            self.name,
                            state.reading.statusword()
                        );
                        if !self.diagnostics.request_error_code() {
                            debug!("'{}': error code request already queued", self.name);
                        }
                    }
                }
                state.last_drive_state = Some(drive_state);
            },
            Err(e) => {
                state.reading.add_error(ErrorKind::StatuswordError);
                trace!("'{}': {}", self.name, e);
                state.last_drive_state = None;
            },
        }

        state
            .reading
            .set_last_error_code(self.diagnostics.last_error_code());
        self.publish(state);
    }
}
