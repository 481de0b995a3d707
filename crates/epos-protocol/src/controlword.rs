//! 控制字（0x6040）位域定义

use bilge::prelude::*;
use std::fmt;

/// CiA 402 控制字
///
/// 协议定义（小端位序，Bit 0 为最低位）：
/// - Bit 0: Switch on
/// - Bit 1: Enable voltage
/// - Bit 2: Quick stop（低有效）
/// - Bit 3: Enable operation
/// - Bit 4-6: 运行模式相关（PPM: new set-point / change set immediately / abs-rel；HMM: homing start）
/// - Bit 7: Fault reset（上升沿有效）
/// - Bit 8: Halt
/// - Bit 9: 运行模式相关（PPM: change on set-point）
/// - Bit 10: 保留
/// - Bit 11-15: 厂商自定义
///
/// 状态转换相关的位（0-3, 7）只能通过 [`StateTransition::controlword`](crate::StateTransition::controlword)
/// 整体设置；运行模式相关位可在此基础上单独修改。
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controlword {
    pub switch_on: bool,               // Bit 0
    pub enable_voltage: bool,          // Bit 1
    pub quick_stop: bool,              // Bit 2
    pub enable_operation: bool,        // Bit 3
    pub new_setpoint: bool,            // Bit 4
    pub change_set_immediately: bool,  // Bit 5
    pub relative: bool,                // Bit 6
    pub fault_reset: bool,             // Bit 7
    pub halt: bool,                    // Bit 8
    pub change_on_setpoint: bool,      // Bit 9
    pub reserved: bool,                // Bit 10: 保留
    pub manufacturer_specific: u5,     // Bit 11-15
}

impl Controlword {
    /// 全零控制字（Disable voltage）
    pub fn zero() -> Self {
        Self::from(0u16)
    }

    /// 原始 16 位值
    pub fn raw(self) -> u16 {
        u16::from(self)
    }
}

impl fmt::Display for Controlword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X} ({:016b})", self.raw(), self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateTransition;

    #[test]
    fn test_controlword_bits() {
        let cw = StateTransition::T4.controlword();
        assert!(cw.switch_on());
        assert!(cw.enable_voltage());
        assert!(cw.quick_stop());
        assert!(cw.enable_operation());
        assert!(!cw.fault_reset());

        let cw = StateTransition::T15.controlword();
        assert!(cw.fault_reset());
        assert!(!cw.switch_on());
        assert!(!cw.enable_voltage());
    }

    #[test]
    fn test_quick_stop_is_active_low() {
        // Quick stop 命令：enable voltage = 1，quick stop = 0
        let cw = StateTransition::T11.controlword();
        assert!(cw.enable_voltage());
        assert!(!cw.quick_stop());
    }

    #[test]
    fn test_mode_specific_bits_keep_state_bits() {
        let mut cw = StateTransition::T4.controlword();
        cw.set_new_setpoint(true);
        cw.set_halt(true);
        assert_eq!(cw.raw(), 0x000F | 0x0010 | 0x0100);

        cw.set_halt(false);
        assert_eq!(cw.raw(), 0x001F);
    }

    #[test]
    fn test_raw_roundtrip_and_display() {
        let cw = Controlword::from(0x0086u16);
        assert_eq!(cw.raw(), 0x0086);
        assert_eq!(cw.to_string(), "0x0086 (0000000010000110)");
        assert_eq!(Controlword::zero().raw(), 0);
        assert_eq!(Controlword::default().raw(), 0);
    }
}
