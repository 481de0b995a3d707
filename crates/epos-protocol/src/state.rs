//! 驱动状态与编号状态转换定义

use crate::controlword::Controlword;
use std::fmt;

/// CiA 402 驱动状态
///
/// 只能由状态字推导得到（见 [`Statusword::drive_state`](crate::Statusword::drive_state)），
/// 不直接设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveState {
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    OperationEnabled,
    QuickStopActive,
    Fault,
}

impl DriveState {
    /// 全部状态（按状态表列顺序）
    pub const ALL: [DriveState; 6] = [
        DriveState::SwitchOnDisabled,
        DriveState::ReadyToSwitchOn,
        DriveState::SwitchedOn,
        DriveState::OperationEnabled,
        DriveState::QuickStopActive,
        DriveState::Fault,
    ];

    /// 状态表中的下标
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveState::SwitchOnDisabled => "SwitchOnDisabled",
            DriveState::ReadyToSwitchOn => "ReadyToSwitchOn",
            DriveState::SwitchedOn => "SwitchedOn",
            DriveState::OperationEnabled => "OperationEnabled",
            DriveState::QuickStopActive => "QuickStopActive",
            DriveState::Fault => "Fault",
        };
        f.write_str(name)
    }
}

/// CiA 402 编号状态转换
///
/// 每个转换对应一个固定的控制字位模式。13/14（故障反应）由驱动器内部完成，
/// 0/1 为上电自动转换，均不由主站触发。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum StateTransition {
    /// Shutdown: SwitchOnDisabled → ReadyToSwitchOn
    T2 = 2,
    /// Switch on: ReadyToSwitchOn → SwitchedOn
    T3 = 3,
    /// Enable operation: SwitchedOn → OperationEnabled
    T4 = 4,
    /// Disable operation: OperationEnabled → SwitchedOn
    T5 = 5,
    /// Shutdown: SwitchedOn → ReadyToSwitchOn
    T6 = 6,
    /// Disable voltage: ReadyToSwitchOn → SwitchOnDisabled
    T7 = 7,
    /// Shutdown: OperationEnabled → ReadyToSwitchOn
    T8 = 8,
    /// Disable voltage: OperationEnabled → SwitchOnDisabled
    T9 = 9,
    /// Disable voltage: SwitchedOn → SwitchOnDisabled
    T10 = 10,
    /// Quick stop: OperationEnabled → QuickStopActive
    T11 = 11,
    /// Disable voltage: QuickStopActive → SwitchOnDisabled
    T12 = 12,
    /// Fault reset: Fault → SwitchOnDisabled
    T15 = 15,
}

impl StateTransition {
    /// 该转换对应的原始控制字
    ///
    /// 查表得到完整位模式，而不是在上一次控制字上增量修改，
    /// 避免残留位叠加。
    pub const fn raw_controlword(self) -> u16 {
        match self {
            StateTransition::T2 | StateTransition::T6 | StateTransition::T8 => 0x0006,
            StateTransition::T3 | StateTransition::T5 => 0x0007,
            StateTransition::T4 => 0x000F,
            StateTransition::T7
            | StateTransition::T9
            | StateTransition::T10
            | StateTransition::T12 => 0x0000,
            StateTransition::T11 => 0x0002,
            StateTransition::T15 => 0x0080,
        }
    }

    /// 该转换对应的控制字
    pub fn controlword(self) -> Controlword {
        Controlword::from(self.raw_controlword())
    }

    /// 转换编号
    pub fn number(self) -> u8 {
        self.into()
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition {}", self.number())
    }
}
