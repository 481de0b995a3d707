//! 驱动状态机：(目标状态, 当前状态) → 转换序列
//!
//! 状态图以常量查找表表示，SDO 驱动使用完整序列，PDO 引擎每次只取第一步。

use crate::ProtocolError;
use crate::state::{DriveState, StateTransition};

use StateTransition::*;

/// 已到达目标
const ARRIVED: &[StateTransition] = &[];

/// 状态转换表，按 `[target][current]` 索引
///
/// 列顺序：SwitchOnDisabled, ReadyToSwitchOn, SwitchedOn, OperationEnabled,
/// QuickStopActive, Fault（与 [`DriveState::ALL`] 一致）。
/// 对角线为空序列。
const TRANSITION_TABLE: [[&[StateTransition]; 6]; 5] = [
    // target = SwitchOnDisabled
    [&[], &[T7], &[T10], &[T9], &[T12], &[T15]],
    // target = ReadyToSwitchOn
    [&[T2], &[], &[T6], &[T8], &[T12, T2], &[T15, T2]],
    // target = SwitchedOn
    [&[T2, T3], &[T3], &[], &[T5], &[T12, T2, T3], &[T15, T2, T3]],
    // target = OperationEnabled
    [&[T2, T3, T4], &[T3, T4], &[T4], &[], &[T12, T2, T3, T4], &[T15, T2, T3, T4]],
    // target = QuickStopActive
    [
        &[T2, T3, T4, T11],
        &[T3, T4, T11],
        &[T4, T11],
        &[T11],
        &[],
        &[T15, T2, T3, T4, T11],
    ],
];

/// 从 `current` 到达 `target` 所需的完整转换序列
///
/// `current == target` 时返回空序列。目标为 [`DriveState::Fault`] 时返回
/// [`ProtocolError::UnreachableDriveState`]（故障只能由驱动器自身进入）。
pub fn transition_path(
    target: DriveState,
    current: DriveState,
) -> Result<&'static [StateTransition], ProtocolError> {
    if target == current {
        return Ok(ARRIVED);
    }
    TRANSITION_TABLE
        .get(target.index())
        .map(|row| row[current.index()])
        .ok_or(ProtocolError::UnreachableDriveState { target, current })
}

/// 从 `current` 向 `target` 前进的下一步
///
/// 已到达时返回 `Ok(None)`。
pub fn next_transition(
    target: DriveState,
    current: DriveState,
) -> Result<Option<StateTransition>, ProtocolError> {
    transition_path(target, current).map(|path| path.first().copied())
}
