//! 反馈聚合（Reading）
//!
//! 周期线程在锁内更新工作副本，每次读周期结束后整体发布为快照；
//! 调用方拿到的是按值拷贝，不会与周期线程竞争。

use crate::config::ResolvedConfiguration;
use epos_protocol::{DriveState, ProtocolError, Statusword, TxPdoFrame};
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt;
use std::time::Instant;

/// 非致命错误分类（累积在 Reading 上）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum ErrorKind {
    /// 启动配置失败
    ConfigurationError = 0,
    /// 运行模式未设置
    ModeOfOperationError = 1,
    /// RxPDO 布局与主站协商大小不符
    RxPdoTypeError = 2,
    /// TxPDO 布局与主站协商大小不符
    TxPdoTypeError = 3,
    /// SDO 状态切换失败
    SdoStateTransitionError = 4,
    /// PDO 状态切换失败（超时或非法目标）
    PdoStateTransitionError = 5,
    /// 状态字无法对应到驱动状态
    StatuswordError = 6,
    /// RxPDO 写入失败
    PdoWriteError = 7,
    /// TxPDO 读取失败
    PdoReadError = 8,
}

impl ErrorKind {
    pub const COUNT: usize = 9;

    pub const ALL: [ErrorKind; Self::COUNT] = [
        ErrorKind::ConfigurationError,
        ErrorKind::ModeOfOperationError,
        ErrorKind::RxPdoTypeError,
        ErrorKind::TxPdoTypeError,
        ErrorKind::SdoStateTransitionError,
        ErrorKind::PdoStateTransitionError,
        ErrorKind::StatuswordError,
        ErrorKind::PdoWriteError,
        ErrorKind::PdoReadError,
    ];

    fn index(self) -> usize {
        u8::from(self) as usize
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 一条错误记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub at: Instant,
}

/// 原始值 → 物理量的换算系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingFactors {
    /// inc → rad
    pub position: f64,
    /// rpm → rad/s
    pub velocity: f64,
    /// 千分比 → A
    pub current: f64,
    /// 千分比 → Nm
    pub torque: f64,
}

impl Default for ReadingFactors {
    fn default() -> Self {
        Self {
            position: 1.0,
            velocity: 1.0,
            current: 1.0,
            torque: 1.0,
        }
    }
}

impl ReadingFactors {
    /// 由解析后的配置计算（原始模式下全部为 1）
    pub fn from_resolved(resolved: &ResolvedConfiguration) -> Self {
        let config = resolved.configuration();
        if config.use_raw_commands {
            return Self::default();
        }
        let current = resolved.nominal_current_a() / 1000.0;
        Self {
            position: 2.0 * PI / f64::from(config.position_encoder_resolution),
            velocity: 2.0 * PI / 60.0,
            current,
            torque: current * config.motor_constant * config.gear_ratio,
        }
    }
}

/// 驱动器反馈
#[derive(Debug, Clone)]
pub struct Reading {
    statusword: Statusword,
    actual_position_raw: i32,
    actual_velocity_raw: i32,
    actual_current_raw: i16,
    demand_velocity_raw: i32,
    mode_of_operation_display: Option<i8>,
    factors: ReadingFactors,
    error_counts: [u64; ErrorKind::COUNT],
    error_history: VecDeque<ErrorRecord>,
    error_capacity: usize,
    last_error_code: Option<u16>,
    updated_at: Option<Instant>,
}

impl Default for Reading {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Reading {
    /// 创建空 Reading，错误历史最多保留 `error_capacity` 条
    pub fn new(error_capacity: usize) -> Self {
        Self {
            statusword: Statusword::from(0u16),
            actual_position_raw: 0,
            actual_velocity_raw: 0,
            actual_current_raw: 0,
            demand_velocity_raw: 0,
            mode_of_operation_display: None,
            factors: ReadingFactors::default(),
            error_counts: [0; ErrorKind::COUNT],
            error_history: VecDeque::with_capacity(error_capacity),
            error_capacity,
            last_error_code: None,
            updated_at: None,
        }
    }

    /// 更新换算系数与错误历史容量
    pub(crate) fn configure(&mut self, factors: ReadingFactors, error_capacity: usize) {
        self.factors = factors;
        self.error_capacity = error_capacity;
        while self.error_history.len() > error_capacity {
            self.error_history.pop_front();
        }
    }

    /// 用一帧 TxPDO 更新（布局不含的字段保持不变）
    pub(crate) fn update_from_frame(&mut self, frame: &TxPdoFrame, now: Instant) {
        self.statusword = Statusword::from(frame.statusword());
        if let Some((position, velocity, current)) = frame.actual_values() {
            self.actual_position_raw = position;
            self.actual_velocity_raw = velocity;
            self.actual_current_raw = current;
        }
        if let Some(velocity) = frame.demand_velocity() {
            self.demand_velocity_raw = velocity;
        }
        if let TxPdoFrame::CstCsp(pdo) = frame {
            self.mode_of_operation_display = Some(pdo.mode_of_operation_display);
        }
        self.updated_at = Some(now);
    }

    pub(crate) fn add_error(&mut self, kind: ErrorKind) {
        self.error_counts[kind.index()] += 1;
        if self.error_capacity == 0 {
            return;
        }
        if self.error_history.len() >= self.error_capacity {
            self.error_history.pop_front();
        }
        self.error_history.push_back(ErrorRecord {
            kind,
            at: Instant::now(),
        });
    }

    pub(crate) fn set_last_error_code(&mut self, code: Option<u16>) {
        self.last_error_code = code;
    }

    // ------------------------------------------------------------------------
    // 状态
    // ------------------------------------------------------------------------

    pub fn statusword(&self) -> Statusword {
        self.statusword
    }

    /// 由状态字即时推导的驱动状态
    pub fn drive_state(&self) -> Result<DriveState, ProtocolError> {
        self.statusword.drive_state()
    }

    /// 运行模式显示（仅 CstCsp 布局提供）
    pub fn mode_of_operation_display(&self) -> Option<i8> {
        self.mode_of_operation_display
    }

    /// 最近一次更新时间，尚未收到过 TxPDO 时为 `None`
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    // ------------------------------------------------------------------------
    // 物理量
    // ------------------------------------------------------------------------

    /// 实际位置（rad）
    pub fn actual_position(&self) -> f64 {
        f64::from(self.actual_position_raw) * self.factors.position
    }

    /// 实际速度（rad/s）
    pub fn actual_velocity(&self) -> f64 {
        f64::from(self.actual_velocity_raw) * self.factors.velocity
    }

    /// 实际电流（A）
    pub fn actual_current(&self) -> f64 {
        f64::from(self.actual_current_raw) * self.factors.current
    }

    /// 由电流推算的输出端扭矩（Nm）
    pub fn actual_torque(&self) -> f64 {
        f64::from(self.actual_current_raw) * self.factors.torque
    }

    /// 速度需求值（rad/s，仅 PVM 布局提供）
    pub fn demand_velocity(&self) -> f64 {
        f64::from(self.demand_velocity_raw) * self.factors.velocity
    }

    // ------------------------------------------------------------------------
    // 原始值
    // ------------------------------------------------------------------------

    pub fn actual_position_raw(&self) -> i32 {
        self.actual_position_raw
    }

    pub fn actual_velocity_raw(&self) -> i32 {
        self.actual_velocity_raw
    }

    pub fn actual_current_raw(&self) -> i16 {
        self.actual_current_raw
    }

    pub fn demand_velocity_raw(&self) -> i32 {
        self.demand_velocity_raw
    }

    pub fn factors(&self) -> ReadingFactors {
        self.factors
    }

    // ------------------------------------------------------------------------
    // 错误
    // ------------------------------------------------------------------------

    /// 某类错误的累计次数
    pub fn error_count(&self, kind: ErrorKind) -> u64 {
        self.error_counts[kind.index()]
    }

    pub fn has_error(&self, kind: ErrorKind) -> bool {
        self.error_count(kind) > 0
    }

    pub fn total_errors(&self) -> u64 {
        self.error_counts.iter().sum()
    }

    /// 最近的错误（按时间顺序，最多 `error_storage_capacity` 条）
    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.error_history.iter()
    }

    /// 最近一次进入 Fault 时读到的错误码（0x603F）
    pub fn last_error_code(&self) -> Option<u16> {
        self.last_error_code
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.drive_state() {
            Ok(state) => write!(f, "state: {state}, ")?,
            Err(_) => write!(f, "state: unknown ({}), ", self.statusword)?,
        }
        write!(
            f,
            "position: {:.4} rad, velocity: {:.4} rad/s, current: {:.3} A, errors: {}",
            self.actual_position(),
            self.actual_velocity(),
            self.actual_current(),
            self.total_errors()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use epos_protocol::{TxPdoCyclic, TxPdoPvm};

    fn resolved(raw: bool) -> ResolvedConfiguration {
        Configuration {
            position_encoder_resolution: 4096,
            nominal_current_a: 2.0,
            motor_constant: 0.5,
            gear_ratio: 10.0,
            use_raw_commands: raw,
            ..Default::default()
        }
        .resolve(None)
        .unwrap()
    }

    #[test]
    fn test_physical_units() {
        let mut reading = Reading::new(10);
        reading.configure(ReadingFactors::from_resolved(&resolved(false)), 10);
        let frame = TxPdoFrame::Cyclic(TxPdoCyclic {
            statusword: 0x0237,
            actual_torque: 500,
            actual_velocity: 60,
            actual_position: 1024,
        });
        reading.update_from_frame(&frame, Instant::now());

        assert_eq!(reading.drive_state().unwrap(), DriveState::OperationEnabled);
        assert!((reading.actual_position() - PI / 2.0).abs() < 1e-9);
        assert!((reading.actual_velocity() - 2.0 * PI).abs() < 1e-9);
        assert!((reading.actual_current() - 1.0).abs() < 1e-9);
        assert!((reading.actual_torque() - 5.0).abs() < 1e-9);
        assert!(reading.updated_at().is_some());
    }

    #[test]
    fn test_raw_factors() {
        let factors = ReadingFactors::from_resolved(&resolved(true));
        assert_eq!(factors, ReadingFactors::default());
    }

    #[test]
    fn test_pvm_frame_keeps_actual_values() {
        let mut reading = Reading::new(10);
        reading.update_from_frame(
            &TxPdoFrame::Cyclic(TxPdoCyclic {
                statusword: 0x0027,
                actual_position: 7,
                ..Default::default()
            }),
            Instant::now(),
        );
        reading.update_from_frame(
            &TxPdoFrame::Pvm(TxPdoPvm {
                statusword: 0x0023,
                demand_velocity: -120,
            }),
            Instant::now(),
        );
        assert_eq!(reading.actual_position_raw(), 7);
        assert_eq!(reading.demand_velocity_raw(), -120);
        assert_eq!(reading.drive_state().unwrap(), DriveState::SwitchedOn);
    }

    #[test]
    fn test_undecodable_statusword() {
        let mut reading = Reading::new(10);
        reading.update_from_frame(
            &TxPdoFrame::Standard(epos_protocol::TxPdoStandard { statusword: 0x0000 }),
            Instant::now(),
        );
        assert!(reading.drive_state().is_err());
        assert!(reading.to_string().starts_with("state: unknown"));
    }

    #[test]
    fn test_error_history_is_bounded() {
        let mut reading = Reading::new(3);
        for _ in 0..5 {
            reading.add_error(ErrorKind::PdoReadError);
        }
        reading.add_error(ErrorKind::StatuswordError);

        assert_eq!(reading.error_count(ErrorKind::PdoReadError), 5);
        assert_eq!(reading.error_count(ErrorKind::StatuswordError), 1);
        assert_eq!(reading.total_errors(), 6);
        let kinds: Vec<_> = reading.errors().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::PdoReadError,
                ErrorKind::PdoReadError,
                ErrorKind::StatuswordError
            ]
        );

        reading.configure(ReadingFactors::default(), 1);
        assert_eq!(reading.errors().count(), 1);
    }

    #[test]
    fn test_zero_capacity_still_counts() {
        let mut reading = Reading::new(0);
        reading.add_error(ErrorKind::ConfigurationError);
        assert!(reading.has_error(ErrorKind::ConfigurationError));
        assert_eq!(reading.errors().count(), 0);
    }

    #[test]
    fn test_error_kind_indices() {
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
