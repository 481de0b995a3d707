//! SDO 访问：状态切换、PDO 映射、参数配置
//!
//! 这些操作都在控制线程中同步执行，不与周期线程竞争周期锁
//! （只在写完控制字后同步一次周期控制字）。

use crate::epos::Epos;
use crate::error::DriverError;
use crate::reading::ErrorKind;
use epos_bus::{SdoExt, SdoValue};
use epos_protocol::od::*;
use epos_protocol::{
    DriveState, ModeOfOperation, PdoMappingEntry, RxPdoType, Statusword, TxPdoType, transition_path,
};
use std::fmt::Display;
use tracing::{debug, error, info, trace};

impl Epos {
    // ============================================================
    // 基础读写
    // ============================================================

    pub(crate) fn read_sdo<T: SdoValue>(&self, index: u16, subindex: u8) -> Result<T, DriverError> {
        let value =
            self.bus
                .read_sdo::<T>(self.address, index, subindex, self.configuration.sdo_timeout())?;
        trace!(
            "'{}' SDO read 0x{:04X}:{:02X} = {:?}",
            self.name, index, subindex, value
        );
        Ok(value)
    }

    pub(crate) fn write_sdo<T: SdoValue>(
        &self,
        index: u16,
        subindex: u8,
        value: T,
    ) -> Result<(), DriverError> {
        trace!(
            "'{}' SDO write 0x{:04X}:{:02X} = {:?}",
            self.name, index, subindex, value
        );
        self.bus.write_sdo(
            self.address,
            index,
            subindex,
            value,
            self.configuration.sdo_timeout(),
        )?;
        Ok(())
    }

    /// 写入后等待 `sdo_verify_timeout`，读回并比较
    pub(crate) fn verify_write_sdo<T: SdoValue + Display>(
        &self,
        index: u16,
        subindex: u8,
        value: T,
    ) -> Result<(), DriverError> {
        self.write_sdo(index, subindex, value)?;
        std::thread::sleep(self.configuration.sdo_verify_timeout());
        let read: T = self.read_sdo(index, subindex)?;
        if read != value {
            return Err(DriverError::VerifyMismatch {
                index,
                subindex,
                written: value.to_string(),
                read: read.to_string(),
            });
        }
        Ok(())
    }

    // ============================================================
    // 状态切换
    // ============================================================

    /// 经 SDO 读取当前驱动状态
    pub fn drive_state_via_sdo(&self) -> Result<DriveState, DriverError> {
        let statusword = Statusword::from(self.read_sdo::<u16>(OD_STATUSWORD, 0x00)?);
        Ok(statusword.drive_state()?)
    }

    /// 经 SDO 同步切换驱动状态
    ///
    /// 读取状态字，按状态表依次写入控制字，遇到第一次失败即停止（不重试）。
    /// 已处于目标状态时直接成功。
    pub fn set_drive_state_via_sdo(&self, target: DriveState) -> Result<(), DriverError> {
        match self.walk_sdo_path(target) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    "'{}': drive state change to {} via SDO failed: {}",
                    self.name, target, e
                );
                self.record_error(ErrorKind::SdoStateTransitionError);
                Err(e)
            },
        }
    }

    fn walk_sdo_path(&self, target: DriveState) -> Result<(), DriverError> {
        let current = self.drive_state_via_sdo()?;
        let path = transition_path(target, current)?;
        if path.is_empty() {
            debug!("'{}' already in {}", self.name, target);
            return Ok(());
        }

        for transition in path {
            let controlword = transition.controlword();
            self.write_sdo(OD_CONTROLWORD, 0x00, controlword.raw())?;
            debug!(
                "'{}': {} via SDO (controlword {})",
                self.name, transition, controlword
            );
            // 周期线程继续下发同样的控制字，不把状态拉回去
            self.cyclic.lock().controlword = controlword;
        }
        info!("'{}': {} -> {} via SDO", self.name, current, target);
        Ok(())
    }

    // ============================================================
    // 启动配置
    // ============================================================

    /// 按布局写入 RxPDO/TxPDO 映射并分配到 SyncManager
    pub(crate) fn map_pdos(&self, rx: RxPdoType, tx: TxPdoType) -> Result<(), DriverError> {
        self.map_direction(OD_RX_PDO_ASSIGNMENT, OD_RX_PDO_MAPPING, rx.mapping())?;
        self.map_direction(OD_TX_PDO_ASSIGNMENT, OD_TX_PDO_MAPPING, tx.mapping())?;
        debug!("'{}' mapped RxPDO {} and TxPDO {}", self.name, rx, tx);
        Ok(())
    }

    fn map_direction(
        &self,
        assignment: u16,
        mapping: u16,
        entries: &[PdoMappingEntry],
    ) -> Result<(), DriverError> {
        // 修改映射前先解除分配并清空条目数
        self.write_sdo(assignment, 0x00, 0u8)?;
        self.write_sdo(mapping, 0x00, 0u8)?;
        for (subindex, entry) in (1u8..).zip(entries) {
            self.write_sdo(mapping, subindex, entry.raw())?;
        }
        self.write_sdo(mapping, 0x00, entries.len() as u8)?;
        self.write_sdo(assignment, 0x01, mapping)?;
        self.write_sdo(assignment, 0x00, 1u8)?;
        Ok(())
    }

    /// 插补周期 1 ms（1 × 10^-3 s）
    pub(crate) fn configure_interpolation_period(&self) -> Result<(), DriverError> {
        self.verify_write_sdo(
            OD_INTERPOLATION_TIME_PERIOD,
            SUB_INTERPOLATION_TIME_PERIOD_VALUE,
            1u8,
        )?;
        self.verify_write_sdo(OD_INTERPOLATION_TIME_PERIOD, SUB_INTERPOLATION_TIME_INDEX, -3i8)
    }

    /// 写入已配置的运行参数
    pub(crate) fn configure_parameters(&self) -> Result<(), DriverError> {
        let config = &self.configuration;
        if config.mode_of_operation.is_position_mode()
            && let Some(window) = config.following_error_window
        {
            self.verify_write_sdo(OD_FOLLOWING_ERROR_WINDOW, 0x00, window)?;
        }
        if let Some(speed) = config.max_motor_speed {
            self.verify_write_sdo(OD_MAX_MOTOR_SPEED, 0x00, speed)?;
        }
        if let Some(deceleration) = config.quick_stop_deceleration {
            self.verify_write_sdo(OD_QUICK_STOP_DECELERATION, 0x00, deceleration)?;
        }
        if config.mode_of_operation == ModeOfOperation::ProfileVelocity {
            if let Some(acceleration) = config.profile_acceleration {
                self.verify_write_sdo(OD_PROFILE_ACCELERATION, 0x00, acceleration)?;
            }
            if let Some(deceleration) = config.profile_deceleration {
                self.verify_write_sdo(OD_PROFILE_DECELERATION, 0x00, deceleration)?;
            }
        }
        Ok(())
    }
}
