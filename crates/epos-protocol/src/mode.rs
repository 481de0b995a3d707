//! 运行模式（0x6060 Modes of Operation）

use std::fmt;

/// CiA 402 运行模式
///
/// `NotAvailable` 表示尚未选择模式：此时周期写入被跳过。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i8)]
pub enum ModeOfOperation {
    #[default]
    NotAvailable = 0,
    ProfilePosition = 1,
    ProfileVelocity = 3,
    Homing = 6,
    CyclicSynchronousPosition = 8,
    CyclicSynchronousVelocity = 9,
    CyclicSynchronousTorque = 10,
}

impl ModeOfOperation {
    /// 原始 i8 值
    pub fn raw(self) -> i8 {
        self.into()
    }

    /// 是否为位置类模式（需要跟随误差窗口）
    pub fn is_position_mode(self) -> bool {
        matches!(
            self,
            ModeOfOperation::ProfilePosition | ModeOfOperation::CyclicSynchronousPosition
        )
    }
}

impl fmt::Display for ModeOfOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModeOfOperation::NotAvailable => "NA",
            ModeOfOperation::ProfilePosition => "PPM",
            ModeOfOperation::ProfileVelocity => "PVM",
            ModeOfOperation::Homing => "HMM",
            ModeOfOperation::CyclicSynchronousPosition => "CSP",
            ModeOfOperation::CyclicSynchronousVelocity => "CSV",
            ModeOfOperation::CyclicSynchronousTorque => "CST",
        };
        f.write_str(name)
    }
}
