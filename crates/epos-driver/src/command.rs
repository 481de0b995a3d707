//! 命令与命令暂存
//!
//! 调用方以物理单位描述命令（[`Command`]），`stage_command` 在调用方线程内
//! 按当前配置换算为线上整数（[`StagedCommand`]）后放入暂存槽；
//! 周期线程每次写 RxPDO 时读取暂存槽。

use crate::config::ResolvedConfiguration;
use epos_protocol::ModeOfOperation;

/// 物理单位命令
///
/// 位置为 rad，速度为 rad/s，扭矩为 Nm（输出端），电流为 A，
/// 轮廓加/减速度为 rad/s²。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub target_position: f64,
    pub target_velocity: f64,
    pub target_torque: f64,
    pub target_current: f64,
    pub position_offset: f64,
    pub velocity_offset: f64,
    pub torque_offset: f64,
    pub profile_acceleration: f64,
    pub profile_deceleration: f64,
    /// 0: 线性斜坡，1: sin² 斜坡
    pub motion_profile_type: i16,
    /// `NotAvailable` 表示沿用当前运行模式
    pub mode_of_operation: ModeOfOperation,
}

impl Command {
    /// 指定运行模式的零命令
    pub fn new(mode_of_operation: ModeOfOperation) -> Self {
        Self {
            mode_of_operation,
            ..Default::default()
        }
    }

    pub fn with_target_position(mut self, position: f64) -> Self {
        self.target_position = position;
        self
    }

    pub fn with_target_velocity(mut self, velocity: f64) -> Self {
        self.target_velocity = velocity;
        self
    }

    pub fn with_target_torque(mut self, torque: f64) -> Self {
        self.target_torque = torque;
        self
    }

    pub fn with_target_current(mut self, current: f64) -> Self {
        self.target_current = current;
        self
    }

    pub fn with_offsets(mut self, position: f64, velocity: f64, torque: f64) -> Self {
        self.position_offset = position;
        self.velocity_offset = velocity;
        self.torque_offset = torque;
        self
    }

    pub fn with_profile(mut self, acceleration: f64, deceleration: f64, profile_type: i16) -> Self {
        self.profile_acceleration = acceleration;
        self.profile_deceleration = deceleration;
        self.motion_profile_type = profile_type;
        self
    }
}

/// 物理单位 → 线上整数的换算系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    /// rad → inc
    pub position: f64,
    /// rad/s → rpm
    pub velocity: f64,
    /// A → 额定电流千分比
    pub current: f64,
    /// Nm → 额定电流千分比
    pub torque: f64,
    /// 电流上限（原始值）
    pub max_current_raw: f64,
    /// 扭矩上限（原始值）
    pub max_torque_raw: f64,
}

impl ScaleFactors {
    /// 由解析后的配置计算
    ///
    /// 原始模式下四个换算系数为 1，但上限仍按物理系数换算成原始值。
    pub fn from_resolved(resolved: &ResolvedConfiguration) -> Self {
        let max_current_raw = resolved.configuration().max_current_a * resolved.current_factor();
        let max_torque_raw = resolved.max_torque_nm() * resolved.torque_factor();
        if resolved.configuration().use_raw_commands {
            return Self {
                position: 1.0,
                velocity: 1.0,
                current: 1.0,
                torque: 1.0,
                max_current_raw,
                max_torque_raw,
            };
        }
        Self {
            position: resolved.position_factor(),
            velocity: resolved.velocity_factor(),
            current: resolved.current_factor(),
            torque: resolved.torque_factor(),
            max_current_raw,
            max_torque_raw,
        }
    }
}

/// 换算后的命令（线上整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagedCommand {
    pub target_position: i32,
    pub target_velocity: i32,
    pub target_torque: i16,
    pub target_current: i16,
    pub position_offset: i32,
    pub velocity_offset: i32,
    pub torque_offset: i16,
    pub profile_acceleration: u32,
    pub profile_deceleration: u32,
    pub motion_profile_type: i16,
    /// 实际下发的运行模式（暂存时的当前模式）
    pub mode_of_operation: ModeOfOperation,
}

// `as` 从浮点到整数的转换是饱和的（NaN → 0），这里只负责四舍五入
fn to_i32(value: f64) -> i32 {
    value.round() as i32
}

fn to_i16(value: f64) -> i16 {
    value.round() as i16
}

fn to_u32(value: f64) -> u32 {
    value.round() as u32
}

fn clamp_symmetric(value: f64, limit: f64) -> f64 {
    value.clamp(-limit, limit)
}

impl StagedCommand {
    /// 按换算系数转换命令；电流、扭矩与扭矩偏置被限制在上限内
    pub fn from_command(command: &Command, factors: &ScaleFactors, mode: ModeOfOperation) -> Self {
        Self {
            target_position: to_i32(command.target_position * factors.position),
            target_velocity: to_i32(command.target_velocity * factors.velocity),
            target_torque: to_i16(clamp_symmetric(
                command.target_torque * factors.torque,
                factors.max_torque_raw,
            )),
            target_current: to_i16(clamp_symmetric(
                command.target_current * factors.current,
                factors.max_current_raw,
            )),
            position_offset: to_i32(command.position_offset * factors.position),
            velocity_offset: to_i32(command.velocity_offset * factors.velocity),
            torque_offset: to_i16(clamp_symmetric(
                command.torque_offset * factors.torque,
                factors.max_torque_raw,
            )),
            profile_acceleration: to_u32(command.profile_acceleration * factors.velocity),
            profile_deceleration: to_u32(command.profile_deceleration * factors.velocity),
            motion_profile_type: command.motion_profile_type,
            mode_of_operation: mode,
        }
    }
}

/// 暂存槽：最新的换算结果与当前运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StagingSlot {
    pub command: StagedCommand,
    pub active_mode: ModeOfOperation,
}

/// 模式选择结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModeDecision {
    /// 使用该模式
    Use(ModeOfOperation),
    /// 请求的模式被拒绝，保留当前模式
    Rejected {
        requested: ModeOfOperation,
        active: ModeOfOperation,
    },
}

impl StagingSlot {
    pub fn new(mode: ModeOfOperation) -> Self {
        Self {
            command: StagedCommand {
                mode_of_operation: mode,
                ..Default::default()
            },
            active_mode: mode,
        }
    }

    /// 决定本次命令使用的运行模式
    pub fn decide_mode(&self, requested: ModeOfOperation, allow_mode_change: bool) -> ModeDecision {
        if requested == ModeOfOperation::NotAvailable || requested == self.active_mode {
            return ModeDecision::Use(self.active_mode);
        }
        if allow_mode_change {
            ModeDecision::Use(requested)
        } else {
            ModeDecision::Rejected {
                requested,
                active: self.active_mode,
            }
        }
    }
}
