//! PDO 线格式定义
//!
//! 每种布局对应一个结构体，字段按线上顺序排列（小端、紧凑）。
//! Rx 为主站 → 从站（命令），Tx 为从站 → 主站（反馈）。

use crate::ProtocolError;
use crate::od::*;
use bytes::{Buf, BufMut};
use smallvec::SmallVec;
use std::fmt;

/// 编码后的 PDO 字节（最大布局 16 字节，栈上分配）
pub type PdoBuffer = SmallVec<[u8; 16]>;

/// PDO 映射条目
///
/// 写入 0x1600/0x1A00 子索引时的原始值为 `index << 16 | subindex << 8 | bits`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoMappingEntry {
    pub index: u16,
    pub subindex: u8,
    pub bits: u8,
}

impl PdoMappingEntry {
    pub const fn new(index: u16, subindex: u8, bits: u8) -> Self {
        Self {
            index,
            subindex,
            bits,
        }
    }

    /// 映射对象的原始 32 位值
    pub fn raw(self) -> u32 {
        (u32::from(self.index) << 16) | (u32::from(self.subindex) << 8) | u32::from(self.bits)
    }
}

const fn entry(index: u16, bits: u8) -> PdoMappingEntry {
    PdoMappingEntry::new(index, 0x00, bits)
}

fn check_len(expected: usize, data: &[u8]) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

// ============================================================================
// 布局选择
// ============================================================================

/// RxPDO 布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RxPdoType {
    #[default]
    Standard,
    Csp,
    Cst,
    Csv,
    CstCsp,
    Pvm,
}

/// TxPDO 布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxPdoType {
    #[default]
    Standard,
    Csp,
    Cst,
    Csv,
    CstCsp,
    Pvm,
}

const RX_STANDARD_MAPPING: &[PdoMappingEntry] =
    &[entry(OD_CONTROLWORD, 16), entry(OD_MODES_OF_OPERATION, 8)];
const RX_CSP_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_TARGET_POSITION, 32),
    entry(OD_POSITION_OFFSET, 32),
    entry(OD_TORQUE_OFFSET, 16),
    entry(OD_CONTROLWORD, 16),
    entry(OD_MODES_OF_OPERATION, 8),
];
const RX_CST_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_TARGET_TORQUE, 16),
    entry(OD_TORQUE_OFFSET, 16),
    entry(OD_CONTROLWORD, 16),
    entry(OD_MODES_OF_OPERATION, 8),
];
const RX_CSV_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_TARGET_VELOCITY, 32),
    entry(OD_VELOCITY_OFFSET, 32),
    entry(OD_CONTROLWORD, 16),
    entry(OD_MODES_OF_OPERATION, 8),
];
const RX_CST_CSP_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_TARGET_POSITION, 32),
    entry(OD_POSITION_OFFSET, 32),
    entry(OD_TARGET_TORQUE, 16),
    entry(OD_TORQUE_OFFSET, 16),
    entry(OD_CONTROLWORD, 16),
    entry(OD_MODES_OF_OPERATION, 8),
];
const RX_PVM_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_CONTROLWORD, 16),
    entry(OD_TARGET_VELOCITY, 32),
    entry(OD_PROFILE_ACCELERATION, 32),
    entry(OD_PROFILE_DECELERATION, 32),
    entry(OD_MOTION_PROFILE_TYPE, 16),
];

const TX_STANDARD_MAPPING: &[PdoMappingEntry] = &[entry(OD_STATUSWORD, 16)];
const TX_CYCLIC_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_STATUSWORD, 16),
    entry(OD_TORQUE_ACTUAL_VALUE, 16),
    entry(OD_VELOCITY_ACTUAL_VALUE, 32),
    entry(OD_POSITION_ACTUAL_VALUE, 32),
];
const TX_CST_CSP_MAPPING: &[PdoMappingEntry] = &[
    entry(OD_STATUSWORD, 16),
    entry(OD_TORQUE_ACTUAL_VALUE, 16),
    entry(OD_VELOCITY_ACTUAL_VALUE, 32),
    entry(OD_POSITION_ACTUAL_VALUE, 32),
    entry(OD_MODES_OF_OPERATION_DISPLAY, 8),
];
const TX_PVM_MAPPING: &[PdoMappingEntry] =
    &[entry(OD_STATUSWORD, 16), entry(OD_VELOCITY_DEMAND_VALUE, 32)];

impl RxPdoType {
    /// 线上字节数
    pub fn size(self) -> usize {
        match self {
            RxPdoType::Standard => RxPdoStandard::SIZE,
            RxPdoType::Csp => RxPdoCsp::SIZE,
            RxPdoType::Cst => RxPdoCst::SIZE,
            RxPdoType::Csv => RxPdoCsv::SIZE,
            RxPdoType::CstCsp => RxPdoCstCsp::SIZE,
            RxPdoType::Pvm => RxPdoPvm::SIZE,
        }
    }

    /// 写入 0x1600 的映射条目（按线上顺序）
    pub fn mapping(self) -> &'static [PdoMappingEntry] {
        match self {
            RxPdoType::Standard => RX_STANDARD_MAPPING,
            RxPdoType::Csp => RX_CSP_MAPPING,
            RxPdoType::Cst => RX_CST_MAPPING,
            RxPdoType::Csv => RX_CSV_MAPPING,
            RxPdoType::CstCsp => RX_CST_CSP_MAPPING,
            RxPdoType::Pvm => RX_PVM_MAPPING,
        }
    }
}

impl TxPdoType {
    /// 线上字节数
    pub fn size(self) -> usize {
        match self {
            TxPdoType::Standard => TxPdoStandard::SIZE,
            TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv => TxPdoCyclic::SIZE,
            TxPdoType::CstCsp => TxPdoCstCsp::SIZE,
            TxPdoType::Pvm => TxPdoPvm::SIZE,
        }
    }

    /// 写入 0x1A00 的映射条目（按线上顺序）
    pub fn mapping(self) -> &'static [PdoMappingEntry] {
        match self {
            TxPdoType::Standard => TX_STANDARD_MAPPING,
            TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv => TX_CYCLIC_MAPPING,
            TxPdoType::CstCsp => TX_CST_CSP_MAPPING,
            TxPdoType::Pvm => TX_PVM_MAPPING,
        }
    }
}

impl fmt::Display for RxPdoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for TxPdoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// RxPDO 结构体
// ============================================================================

/// 标准 RxPDO：仅控制字与运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxPdoStandard {
    pub controlword: u16,
    pub mode_of_operation: i8,
}

impl RxPdoStandard {
    pub const SIZE: usize = 3;

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_u16_le(self.controlword);
        buf.put_i8(self.mode_of_operation);
        out
    }
}

/// 周期同步位置（CSP）RxPDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxPdoCsp {
    pub target_position: i32,
    pub position_offset: i32,
    pub torque_offset: i16,
    pub controlword: u16,
    pub mode_of_operation: i8,
}

impl RxPdoCsp {
    pub const SIZE: usize = 13;

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_i32_le(self.target_position);
        buf.put_i32_le(self.position_offset);
        buf.put_i16_le(self.torque_offset);
        buf.put_u16_le(self.controlword);
        buf.put_i8(self.mode_of_operation);
        out
    }
}

/// 周期同步扭矩（CST）RxPDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxPdoCst {
    pub target_torque: i16,
    pub torque_offset: i16,
    pub controlword: u16,
    pub mode_of_operation: i8,
}

impl RxPdoCst {
    pub const SIZE: usize = 7;

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_i16_le(self.target_torque);
        buf.put_i16_le(self.torque_offset);
        buf.put_u16_le(self.controlword);
        buf.put_i8(self.mode_of_operation);
        out
    }
}

/// 周期同步速度（CSV）RxPDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxPdoCsv {
    pub target_velocity: i32,
    pub velocity_offset: i32,
    pub controlword: u16,
    pub mode_of_operation: i8,
}

impl RxPdoCsv {
    pub const SIZE: usize = 11;

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_i32_le(self.target_velocity);
        buf.put_i32_le(self.velocity_offset);
        buf.put_u16_le(self.controlword);
        buf.put_i8(self.mode_of_operation);
        out
    }
}

/// CST/CSP 混合 RxPDO（可在两种模式间切换）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxPdoCstCsp {
    pub target_position: i32,
    pub position_offset: i32,
    pub target_torque: i16,
    pub torque_offset: i16,
    pub controlword: u16,
    pub mode_of_operation: i8,
}

impl RxPdoCstCsp {
    pub const SIZE: usize = 15;

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_i32_le(self.target_position);
        buf.put_i32_le(self.position_offset);
        buf.put_i16_le(self.target_torque);
        buf.put_i16_le(self.torque_offset);
        buf.put_u16_le(self.controlword);
        buf.put_i8(self.mode_of_operation);
        out
    }
}

/// 轮廓速度（PVM）RxPDO
///
/// 不携带运行模式：PVM 布局下模式只在启动时通过 SDO 设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxPdoPvm {
    pub controlword: u16,
    pub target_velocity: i32,
    pub profile_acceleration: u32,
    pub profile_deceleration: u32,
    pub motion_profile_type: i16,
}

impl RxPdoPvm {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_u16_le(self.controlword);
        buf.put_i32_le(self.target_velocity);
        buf.put_u32_le(self.profile_acceleration);
        buf.put_u32_le(self.profile_deceleration);
        buf.put_i16_le(self.motion_profile_type);
        out
    }
}

/// 任意布局的 RxPDO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxPdoFrame {
    Standard(RxPdoStandard),
    Csp(RxPdoCsp),
    Cst(RxPdoCst),
    Csv(RxPdoCsv),
    CstCsp(RxPdoCstCsp),
    Pvm(RxPdoPvm),
}

impl RxPdoFrame {
    pub fn layout(&self) -> RxPdoType {
        match self {
            RxPdoFrame::Standard(_) => RxPdoType::Standard,
            RxPdoFrame::Csp(_) => RxPdoType::Csp,
            RxPdoFrame::Cst(_) => RxPdoType::Cst,
            RxPdoFrame::Csv(_) => RxPdoType::Csv,
            RxPdoFrame::CstCsp(_) => RxPdoType::CstCsp,
            RxPdoFrame::Pvm(_) => RxPdoType::Pvm,
        }
    }

    pub fn controlword(&self) -> u16 {
        match self {
            RxPdoFrame::Standard(p) => p.controlword,
            RxPdoFrame::Csp(p) => p.controlword,
            RxPdoFrame::Cst(p) => p.controlword,
            RxPdoFrame::Csv(p) => p.controlword,
            RxPdoFrame::CstCsp(p) => p.controlword,
            RxPdoFrame::Pvm(p) => p.controlword,
        }
    }

    pub fn encode(&self) -> PdoBuffer {
        match self {
            RxPdoFrame::Standard(p) => p.encode(),
            RxPdoFrame::Csp(p) => p.encode(),
            RxPdoFrame::Cst(p) => p.encode(),
            RxPdoFrame::Csv(p) => p.encode(),
            RxPdoFrame::CstCsp(p) => p.encode(),
            RxPdoFrame::Pvm(p) => p.encode(),
        }
    }

    /// 按布局解码（从站侧 / 测试使用）
    pub fn decode(layout: RxPdoType, data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(layout.size(), data)?;
        let mut buf = data;
        let frame = match layout {
            RxPdoType::Standard => RxPdoFrame::Standard(RxPdoStandard {
                controlword: buf.get_u16_le(),
                mode_of_operation: buf.get_i8(),
            }),
            RxPdoType::Csp => RxPdoFrame::Csp(RxPdoCsp {
                target_position: buf.get_i32_le(),
                position_offset: buf.get_i32_le(),
                torque_offset: buf.get_i16_le(),
                controlword: buf.get_u16_le(),
                mode_of_operation: buf.get_i8(),
            }),
            RxPdoType::Cst => RxPdoFrame::Cst(RxPdoCst {
                target_torque: buf.get_i16_le(),
                torque_offset: buf.get_i16_le(),
                controlword: buf.get_u16_le(),
                mode_of_operation: buf.get_i8(),
            }),
            RxPdoType::Csv => RxPdoFrame::Csv(RxPdoCsv {
                target_velocity: buf.get_i32_le(),
                velocity_offset: buf.get_i32_le(),
                controlword: buf.get_u16_le(),
                mode_of_operation: buf.get_i8(),
            }),
            RxPdoType::CstCsp => RxPdoFrame::CstCsp(RxPdoCstCsp {
                target_position: buf.get_i32_le(),
                position_offset: buf.get_i32_le(),
                target_torque: buf.get_i16_le(),
                torque_offset: buf.get_i16_le(),
                controlword: buf.get_u16_le(),
                mode_of_operation: buf.get_i8(),
            }),
            RxPdoType::Pvm => RxPdoFrame::Pvm(RxPdoPvm {
                controlword: buf.get_u16_le(),
                target_velocity: buf.get_i32_le(),
                profile_acceleration: buf.get_u32_le(),
                profile_deceleration: buf.get_u32_le(),
                motion_profile_type: buf.get_i16_le(),
            }),
        };
        Ok(frame)
    }
}

// ============================================================================
// TxPDO 结构体
// ============================================================================

/// 标准 TxPDO：仅状态字
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPdoStandard {
    pub statusword: u16,
}

impl TxPdoStandard {
    pub const SIZE: usize = 2;

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            statusword: buf.get_u16_le(),
        })
    }

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_u16_le(self.statusword);
        out
    }
}

/// CSP/CST/CSV 共用的 TxPDO
///
/// `actual_torque` 实际为电流千分比（0x6077 以额定电流为基准）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPdoCyclic {
    pub statusword: u16,
    pub actual_torque: i16,
    pub actual_velocity: i32,
    pub actual_position: i32,
}

impl TxPdoCyclic {
    pub const SIZE: usize = 12;

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            statusword: buf.get_u16_le(),
            actual_torque: buf.get_i16_le(),
            actual_velocity: buf.get_i32_le(),
            actual_position: buf.get_i32_le(),
        })
    }

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_u16_le(self.statusword);
        buf.put_i16_le(self.actual_torque);
        buf.put_i32_le(self.actual_velocity);
        buf.put_i32_le(self.actual_position);
        out
    }
}

/// CST/CSP 混合 TxPDO（附带运行模式显示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPdoCstCsp {
    pub statusword: u16,
    pub actual_torque: i16,
    pub actual_velocity: i32,
    pub actual_position: i32,
    pub mode_of_operation_display: i8,
}

impl TxPdoCstCsp {
    pub const SIZE: usize = 13;

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            statusword: buf.get_u16_le(),
            actual_torque: buf.get_i16_le(),
            actual_velocity: buf.get_i32_le(),
            actual_position: buf.get_i32_le(),
            mode_of_operation_display: buf.get_i8(),
        })
    }

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_u16_le(self.statusword);
        buf.put_i16_le(self.actual_torque);
        buf.put_i32_le(self.actual_velocity);
        buf.put_i32_le(self.actual_position);
        buf.put_i8(self.mode_of_operation_display);
        out
    }
}

/// 轮廓速度（PVM）TxPDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPdoPvm {
    pub statusword: u16,
    pub demand_velocity: i32,
}

impl TxPdoPvm {
    pub const SIZE: usize = 6;

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len(Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            statusword: buf.get_u16_le(),
            demand_velocity: buf.get_i32_le(),
        })
    }

    pub fn encode(&self) -> PdoBuffer {
        let mut out = PdoBuffer::from_elem(0, Self::SIZE);
        let mut buf = &mut out[..];
        buf.put_u16_le(self.statusword);
        buf.put_i32_le(self.demand_velocity);
        out
    }
}

/// 任意布局的 TxPDO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPdoFrame {
    Standard(TxPdoStandard),
    Cyclic(TxPdoCyclic),
    CstCsp(TxPdoCstCsp),
    Pvm(TxPdoPvm),
}

impl TxPdoFrame {
    /// 按布局解码
    pub fn decode(layout: TxPdoType, data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(match layout {
            TxPdoType::Standard => TxPdoFrame::Standard(TxPdoStandard::decode(data)?),
            TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv => {
                TxPdoFrame::Cyclic(TxPdoCyclic::decode(data)?)
            },
            TxPdoType::CstCsp => TxPdoFrame::CstCsp(TxPdoCstCsp::decode(data)?),
            TxPdoType::Pvm => TxPdoFrame::Pvm(TxPdoPvm::decode(data)?),
        })
    }

    pub fn encode(&self) -> PdoBuffer {
        match self {
            TxPdoFrame::Standard(p) => p.encode(),
            TxPdoFrame::Cyclic(p) => p.encode(),
            TxPdoFrame::CstCsp(p) => p.encode(),
            TxPdoFrame::Pvm(p) => p.encode(),
        }
    }

    pub fn statusword(&self) -> u16 {
        match self {
            TxPdoFrame::Standard(p) => p.statusword,
            TxPdoFrame::Cyclic(p) => p.statusword,
            TxPdoFrame::CstCsp(p) => p.statusword,
            TxPdoFrame::Pvm(p) => p.statusword,
        }
    }

    /// (实际位置, 实际速度, 实际电流千分比)，仅周期同步布局提供
    pub fn actual_values(&self) -> Option<(i32, i32, i16)> {
        match self {
            TxPdoFrame::Cyclic(p) => Some((p.actual_position, p.actual_velocity, p.actual_torque)),
            TxPdoFrame::CstCsp(p) => Some((p.actual_position, p.actual_velocity, p.actual_torque)),
            TxPdoFrame::Standard(_) | TxPdoFrame::Pvm(_) => None,
        }
    }

    /// 速度需求值，仅 PVM 布局提供
    pub fn demand_velocity(&self) -> Option<i32> {
        match self {
            TxPdoFrame::Pvm(p) => Some(p.demand_velocity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RX_TYPES: [RxPdoType; 6] = [
        RxPdoType::Standard,
        RxPdoType::Csp,
        RxPdoType::Cst,
        RxPdoType::Csv,
        RxPdoType::CstCsp,
        RxPdoType::Pvm,
    ];
    const TX_TYPES: [TxPdoType; 6] = [
        TxPdoType::Standard,
        TxPdoType::Csp,
        TxPdoType::Cst,
        TxPdoType::Csv,
        TxPdoType::CstCsp,
        TxPdoType::Pvm,
    ];

    #[test]
    fn test_mapping_bits_match_wire_size() {
        for layout in RX_TYPES {
            let bits: usize = layout.mapping().iter().map(|e| e.bits as usize).sum();
            assert_eq!(bits / 8, layout.size(), "{layout}");
        }
        for layout in TX_TYPES {
            let bits: usize = layout.mapping().iter().map(|e| e.bits as usize).sum();
            assert_eq!(bits / 8, layout.size(), "{layout}");
        }
    }

    #[test]
    fn test_mapping_entry_raw() {
        assert_eq!(PdoMappingEntry::new(0x6040, 0x00, 16).raw(), 0x6040_0010);
        assert_eq!(PdoMappingEntry::new(0x60C2, 0x01, 8).raw(), 0x60C2_0108);
    }

    #[test]
    fn test_csp_wire_layout() {
        let pdo = RxPdoCsp {
            target_position: 1024,
            position_offset: -1,
            torque_offset: 0x0102,
            controlword: 0x000F,
            mode_of_operation: 8,
        };
        let bytes = pdo.encode();
        assert_eq!(
            bytes.as_slice(),
            &[
                0x00, 0x04, 0x00, 0x00, // target position
                0xFF, 0xFF, 0xFF, 0xFF, // position offset
                0x02, 0x01, // torque offset
                0x0F, 0x00, // controlword
                0x08, // mode
            ]
        );
        assert_eq!(
            RxPdoFrame::decode(RxPdoType::Csp, &bytes).unwrap(),
            RxPdoFrame::Csp(pdo)
        );
    }

    #[test]
    fn test_pvm_controlword_first() {
        let pdo = RxPdoPvm {
            controlword: 0x0006,
            target_velocity: -100,
            profile_acceleration: 1000,
            profile_deceleration: 2000,
            motion_profile_type: 1,
        };
        let bytes = pdo.encode();
        assert_eq!(bytes.len(), RxPdoPvm::SIZE);
        assert_eq!(&bytes[..2], &[0x06, 0x00]);
        assert_eq!(&bytes[2..6], &(-100i32).to_le_bytes());
        assert_eq!(RxPdoFrame::Pvm(pdo).controlword(), 0x0006);
    }

    #[test]
    fn test_tx_decode() {
        let data = [0x37, 0x06, 0xF6, 0xFF, 0x64, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x0A];
        let frame = TxPdoFrame::decode(TxPdoType::CstCsp, &data).unwrap();
        assert_eq!(frame.statusword(), 0x0637);
        assert_eq!(frame.actual_values(), Some((1024, 100, -10)));
        assert_eq!(frame.demand_velocity(), None);
        match frame {
            TxPdoFrame::CstCsp(p) => assert_eq!(p.mode_of_operation_display, 10),
            other => panic!("unexpected frame {other:?}"),
        }

        let frame = TxPdoFrame::decode(TxPdoType::Pvm, &[0x27, 0x00, 0x9C, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(frame.statusword(), 0x0027);
        assert_eq!(frame.demand_velocity(), Some(-100));
        assert_eq!(frame.actual_values(), None);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        assert_eq!(
            TxPdoFrame::decode(TxPdoType::Csp, &[0u8; 4]),
            Err(ProtocolError::InvalidLength {
                expected: 12,
                actual: 4
            })
        );
        assert!(RxPdoFrame::decode(RxPdoType::Pvm, &[0u8; 15]).is_err());
    }

    #[test]
    fn test_tx_encode_matches_decode() {
        let frame = TxPdoFrame::Cyclic(TxPdoCyclic {
            statusword: 0x0027,
            actual_torque: 500,
            actual_velocity: -3000,
            actual_position: 123_456,
        });
        let bytes = frame.encode();
        assert_eq!(TxPdoFrame::decode(TxPdoType::Csv, &bytes).unwrap(), frame);
    }
}
