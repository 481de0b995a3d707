//! 状态字（0x6041）位域定义与驱动状态分类

use crate::ProtocolError;
use crate::state::DriveState;
use bilge::prelude::*;
use std::fmt;

/// CiA 402 状态字
///
/// 协议定义（小端位序，Bit 0 为最低位）：
/// - Bit 0: Ready to switch on
/// - Bit 1: Switched on
/// - Bit 2: Operation enabled
/// - Bit 3: Fault
/// - Bit 4: Voltage enabled
/// - Bit 5: Quick stop（低有效）
/// - Bit 6: Switch on disabled
/// - Bit 7: Warning
/// - Bit 8: 厂商自定义
/// - Bit 9: Remote
/// - Bit 10: Target reached
/// - Bit 11: Internal limit active
/// - Bit 12-13: 运行模式相关
/// - Bit 14: 厂商自定义
/// - Bit 15: Position referenced to home
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statusword {
    pub ready_to_switch_on: bool,         // Bit 0
    pub switched_on: bool,                // Bit 1
    pub operation_enabled: bool,          // Bit 2
    pub fault: bool,                      // Bit 3
    pub voltage_enabled: bool,            // Bit 4
    pub quick_stop: bool,                 // Bit 5
    pub switch_on_disabled: bool,         // Bit 6
    pub warning: bool,                    // Bit 7
    pub manufacturer_specific0: bool,     // Bit 8
    pub remote: bool,                     // Bit 9
    pub target_reached: bool,             // Bit 10
    pub internal_limit_active: bool,      // Bit 11
    pub operation_mode_specific: u2,      // Bit 12-13
    pub manufacturer_specific1: bool,     // Bit 14
    pub position_referenced: bool,        // Bit 15
}

/// (mask, value, state)，按优先级排列
///
/// Fault 必须最先判断：故障位与其他状态共享低位。
const DRIVE_STATE_PATTERNS: [(u16, u16, DriveState); 6] = [
    (0x004F, 0x0008, DriveState::Fault),
    (0x004F, 0x0040, DriveState::SwitchOnDisabled),
    (0x006F, 0x0021, DriveState::ReadyToSwitchOn),
    (0x006F, 0x0023, DriveState::SwitchedOn),
    (0x006F, 0x0027, DriveState::OperationEnabled),
    (0x006F, 0x0007, DriveState::QuickStopActive),
];

impl Statusword {
    /// 原始 16 位值
    pub fn raw(self) -> u16 {
        u16::from(self)
    }

    /// 由状态字推导驱动状态
    ///
    /// 对所有 16 位输入均有定义：要么得到六个状态之一，要么返回
    /// [`ProtocolError::UnknownDriveState`]（例如 Not ready to switch on、
    /// Fault reaction active）。
    pub fn drive_state(self) -> Result<DriveState, ProtocolError> {
        let raw = self.raw();
        DRIVE_STATE_PATTERNS
            .iter()
            .find(|(mask, value, _)| raw & mask == *value)
            .map(|(_, _, state)| *state)
            .ok_or(ProtocolError::UnknownDriveState { statusword: raw })
    }

    /// 某驱动状态的典型状态字（无关位全部为 0）
    pub fn for_drive_state(state: DriveState) -> Self {
        let raw = DRIVE_STATE_PATTERNS
            .iter()
            .find(|(_, _, s)| *s == state)
            .map(|(_, value, _)| *value)
            .unwrap_or_default();
        Self::from(raw)
    }
}

impl fmt::Display for Statusword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X} ({:016b})", self.raw(), self.raw())
    }
}
