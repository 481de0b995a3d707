//! 对象字典索引常量
//!
//! 仅作为不透明地址使用。CiA 402 标准对象位于 0x6000 段，
//! EPOS 厂商对象位于 0x3000 段，PDO 映射与分配对象位于 0x1600/0x1A00/0x1C1x。

// ============================================================================
// 通信对象
// ============================================================================

/// RxPDO1 映射参数
pub const OD_RX_PDO_MAPPING: u16 = 0x1600;
/// TxPDO1 映射参数
pub const OD_TX_PDO_MAPPING: u16 = 0x1A00;
/// SM2 (输出) PDO 分配
pub const OD_RX_PDO_ASSIGNMENT: u16 = 0x1C12;
/// SM3 (输入) PDO 分配
pub const OD_TX_PDO_ASSIGNMENT: u16 = 0x1C13;

// ============================================================================
// 厂商对象
// ============================================================================

/// 电机数据
pub const OD_MOTOR_DATA: u16 = 0x3001;
/// 电机数据子索引：额定电流（mA）
pub const SUB_MOTOR_DATA_NOMINAL_CURRENT: u8 = 0x02;

// ============================================================================
// CiA 402 对象
// ============================================================================

/// 错误码
pub const OD_ERROR_CODE: u16 = 0x603F;
/// 控制字
pub const OD_CONTROLWORD: u16 = 0x6040;
/// 状态字
pub const OD_STATUSWORD: u16 = 0x6041;
/// 运行模式
pub const OD_MODES_OF_OPERATION: u16 = 0x6060;
/// 运行模式显示
pub const OD_MODES_OF_OPERATION_DISPLAY: u16 = 0x6061;
/// 实际位置
pub const OD_POSITION_ACTUAL_VALUE: u16 = 0x6064;
/// 跟随误差窗口
pub const OD_FOLLOWING_ERROR_WINDOW: u16 = 0x6065;
/// 速度需求值
pub const OD_VELOCITY_DEMAND_VALUE: u16 = 0x606B;
/// 实际速度
pub const OD_VELOCITY_ACTUAL_VALUE: u16 = 0x606C;
/// 目标扭矩
pub const OD_TARGET_TORQUE: u16 = 0x6071;
/// 实际扭矩
pub const OD_TORQUE_ACTUAL_VALUE: u16 = 0x6077;
/// 目标位置
pub const OD_TARGET_POSITION: u16 = 0x607A;
/// 最大电机转速
pub const OD_MAX_MOTOR_SPEED: u16 = 0x6080;
/// 轮廓加速度
pub const OD_PROFILE_ACCELERATION: u16 = 0x6083;
/// 轮廓减速度
pub const OD_PROFILE_DECELERATION: u16 = 0x6084;
/// 快停减速度
pub const OD_QUICK_STOP_DECELERATION: u16 = 0x6085;
/// 运动轮廓类型
pub const OD_MOTION_PROFILE_TYPE: u16 = 0x6086;
/// 位置偏置
pub const OD_POSITION_OFFSET: u16 = 0x60B0;
/// 速度偏置
pub const OD_VELOCITY_OFFSET: u16 = 0x60B1;
/// 扭矩偏置
pub const OD_TORQUE_OFFSET: u16 = 0x60B2;
/// 插补周期
pub const OD_INTERPOLATION_TIME_PERIOD: u16 = 0x60C2;
/// 插补周期子索引：周期值
pub const SUB_INTERPOLATION_TIME_PERIOD_VALUE: u8 = 0x01;
/// 插补周期子索引：10 的幂次
pub const SUB_INTERPOLATION_TIME_INDEX: u8 = 0x02;
/// 目标速度
pub const OD_TARGET_VELOCITY: u16 = 0x60FF;
