//! 驱动配置
//!
//! 两阶段：
//! 1. [`Configuration`]：用户配置（TOML 反序列化，所有字段有默认值）
//! 2. [`ResolvedConfiguration`]：启动时结合从站读出的额定电流得到的只读配置，
//!    之后所有换算系数都由它计算

use crate::error::ConfigError;
use epos_protocol::{ModeOfOperation, RxPdoType, TxPdoType};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// 启动时写入 0x6060 的运行模式
    pub mode_of_operation: ModeOfOperation,
    pub rx_pdo_type: RxPdoType,
    pub tx_pdo_type: TxPdoType,

    /// SDO 超时（微秒）
    pub sdo_timeout_us: u64,
    /// 校验写：写入后等待多久再读回（微秒）
    pub sdo_verify_timeout_us: u64,
    /// 启动时进入 PRE-OP 后的等待时间（毫秒）
    pub startup_settle_ms: u64,

    /// 命令值直接作为原始整数下发（所有换算系数为 1）
    pub use_raw_commands: bool,

    /// PDO 状态机两次切换控制字之间的最小间隔（微秒）
    pub drive_state_change_min_timeout_us: u64,
    /// 阻塞等待状态切换的最长时间（微秒）
    pub drive_state_change_max_timeout_us: u64,
    /// 连续读到目标状态多少次才算切换完成
    pub min_successful_target_state_readings: u32,
    /// Reading 中保留的错误历史条数
    pub error_storage_capacity: usize,

    /// 编码器每圈计数
    pub position_encoder_resolution: u32,
    pub gear_ratio: f64,
    /// 电机转矩常数（Nm/A）
    pub motor_constant: f64,
    /// 电流上限（A）
    pub max_current_a: f64,
    /// 额定电流（A），0 表示启动时从 0x3001:02 读取
    pub nominal_current_a: f64,

    /// 是否允许在命令之间切换运行模式（仅 Standard 布局下生效）
    pub use_multiple_modes_of_operation: bool,

    // 以下参数仅在配置时于启动阶段写入
    /// 跟随误差窗口（inc，0x6065）
    pub following_error_window: Option<u32>,
    /// 最大电机转速（rpm，0x6080）
    pub max_motor_speed: Option<u32>,
    /// 快停减速度（rpm/s，0x6085）
    pub quick_stop_deceleration: Option<u32>,
    /// 轮廓加速度（rpm/s，0x6083）
    pub profile_acceleration: Option<u32>,
    /// 轮廓减速度（rpm/s，0x6084）
    pub profile_deceleration: Option<u32>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            mode_of_operation: ModeOfOperation::CyclicSynchronousPosition,
            rx_pdo_type: RxPdoType::Csp,
            tx_pdo_type: TxPdoType::Csp,
            sdo_timeout_us: 50_000,
            sdo_verify_timeout_us: 10_000,
            startup_settle_ms: 100,
            use_raw_commands: false,
            drive_state_change_min_timeout_us: 20_000,
            drive_state_change_max_timeout_us: 300_000,
            min_successful_target_state_readings: 10,
            error_storage_capacity: 100,
            position_encoder_resolution: 4096,
            gear_ratio: 1.0,
            motor_constant: 1.0,
            max_current_a: 1.0,
            nominal_current_a: 0.0,
            use_multiple_modes_of_operation: false,
            following_error_window: None,
            max_motor_speed: None,
            quick_stop_deceleration: None,
            profile_acceleration: None,
            profile_deceleration: None,
        }
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("must be a positive number, got {value}"),
        ));
    }
    Ok(())
}

impl Configuration {
    /// 从 TOML 字符串加载并校验
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Configuration = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("gear_ratio", self.gear_ratio)?;
        require_positive("motor_constant", self.motor_constant)?;
        require_positive("max_current_a", self.max_current_a)?;
        if !self.nominal_current_a.is_finite() || self.nominal_current_a < 0.0 {
            return Err(ConfigError::invalid(
                "nominal_current_a",
                format!("must be >= 0 (0 = read from drive), got {}", self.nominal_current_a),
            ));
        }
        if self.position_encoder_resolution == 0 {
            return Err(ConfigError::invalid(
                "position_encoder_resolution",
                "must not be 0",
            ));
        }
        if self.min_successful_target_state_readings == 0 {
            return Err(ConfigError::invalid(
                "min_successful_target_state_readings",
                "must not be 0",
            ));
        }
        if self.drive_state_change_min_timeout_us >= self.drive_state_change_max_timeout_us {
            return Err(ConfigError::invalid(
                "drive_state_change_min_timeout_us",
                format!(
                    "must be smaller than drive_state_change_max_timeout_us ({} >= {})",
                    self.drive_state_change_min_timeout_us, self.drive_state_change_max_timeout_us
                ),
            ));
        }
        Ok(())
    }

    /// 是否允许在命令之间切换运行模式
    ///
    /// 仅当启用多模式且两个方向都是 Standard 布局时为真：
    /// 其他布局的过程数据只对应一种模式。
    pub fn allow_mode_change(&self) -> bool {
        self.use_multiple_modes_of_operation
            && self.rx_pdo_type == RxPdoType::Standard
            && self.tx_pdo_type == TxPdoType::Standard
    }

    pub fn sdo_timeout(&self) -> Duration {
        Duration::from_micros(self.sdo_timeout_us)
    }

    pub fn sdo_verify_timeout(&self) -> Duration {
        Duration::from_micros(self.sdo_verify_timeout_us)
    }

    pub fn startup_settle(&self) -> Duration {
        Duration::from_millis(self.startup_settle_ms)
    }

    pub fn drive_state_change_min_timeout(&self) -> Duration {
        Duration::from_micros(self.drive_state_change_min_timeout_us)
    }

    pub fn drive_state_change_max_timeout(&self) -> Duration {
        Duration::from_micros(self.drive_state_change_max_timeout_us)
    }

    /// 结合从站读出的额定电流（mA）得到最终配置
    ///
    /// 纯函数：配置了 `nominal_current_a` 时忽略读出值。
    pub fn resolve(
        &self,
        discovered_nominal_current_ma: Option<u32>,
    ) -> Result<ResolvedConfiguration, ConfigError> {
        self.validate()?;
        let nominal_current_a = if self.nominal_current_a > 0.0 {
            self.nominal_current_a
        } else {
            match discovered_nominal_current_ma {
                Some(ma) if ma > 0 => f64::from(ma) / 1000.0,
                Some(_) => {
                    return Err(ConfigError::invalid(
                        "nominal_current_a",
                        "drive reported a nominal current of 0 mA",
                    ));
                },
                None => {
                    return Err(ConfigError::invalid(
                        "nominal_current_a",
                        "not configured and not read from the drive",
                    ));
                },
            }
        };
        Ok(ResolvedConfiguration {
            configuration: self.clone(),
            nominal_current_a,
            allow_mode_change: self.allow_mode_change(),
        })
    }
}

/// 启动后的只读配置
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfiguration {
    configuration: Configuration,
    nominal_current_a: f64,
    allow_mode_change: bool,
}

impl ResolvedConfiguration {
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// 实际使用的额定电流（A）
    pub fn nominal_current_a(&self) -> f64 {
        self.nominal_current_a
    }

    pub fn allow_mode_change(&self) -> bool {
        self.allow_mode_change
    }

    /// rad → inc
    pub fn position_factor(&self) -> f64 {
        f64::from(self.configuration.position_encoder_resolution) / (2.0 * PI)
    }

    /// rad/s → rpm
    pub fn velocity_factor(&self) -> f64 {
        60.0 / (2.0 * PI)
    }

    /// A → 额定电流千分比
    pub fn current_factor(&self) -> f64 {
        1000.0 / self.nominal_current_a
    }

    /// Nm → 额定电流千分比
    pub fn torque_factor(&self) -> f64 {
        self.current_factor() / (self.configuration.motor_constant * self.configuration.gear_ratio)
    }

    /// 输出端扭矩上限（Nm）
    pub fn max_torque_nm(&self) -> f64 {
        self.configuration.max_current_a
            * self.configuration.motor_constant
            * self.configuration.gear_ratio
    }

    pub fn sdo_timeout(&self) -> Duration {
        self.configuration.sdo_timeout()
    }

    pub fn drive_state_change_max_timeout(&self) -> Duration {
        self.configuration.drive_state_change_max_timeout()
    }
}
