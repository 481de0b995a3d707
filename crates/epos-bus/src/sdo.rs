//! 类型化 SDO 读写
//!
//! CoE 数据均为小端字节序。[`SdoExt`] 对任意 [`EthercatBus`]（含 trait 对象）可用。

use crate::{BusError, EthercatBus};
use std::fmt::Debug;
use std::time::Duration;

/// 可通过 SDO 传输的定长整数
pub trait SdoValue: Copy + Debug + PartialEq + Send + 'static {
    /// 字节数
    const SIZE: usize;

    /// 写入小端字节（`buf.len() == SIZE`）
    fn write_le(self, buf: &mut [u8]);

    /// 从小端字节解析（`buf.len() == SIZE`）
    fn read_le(buf: &[u8]) -> Self;
}

macro_rules! impl_sdo_value {
    ($($t:ty),*) => {
        $(
            impl SdoValue for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_le(self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(buf);
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_sdo_value!(u8, i8, u16, i16, u32, i32);

/// 最大 SDO 值宽度
const MAX_VALUE_SIZE: usize = 4;

/// 类型化 SDO 读写扩展
pub trait SdoExt: EthercatBus {
    /// 读取一个定长值（非完整访问）
    fn read_sdo<T: SdoValue>(
        &self,
        address: u16,
        index: u16,
        subindex: u8,
        timeout: Duration,
    ) -> Result<T, BusError> {
        let mut buf = [0u8; MAX_VALUE_SIZE];
        let read = self.sdo_read(address, index, subindex, false, &mut buf[..T::SIZE], timeout)?;
        if read != T::SIZE {
            return Err(BusError::SdoSize {
                index,
                subindex,
                expected: T::SIZE,
                actual: read,
            });
        }
        Ok(T::read_le(&buf[..T::SIZE]))
    }

    /// 写入一个定长值（非完整访问）
    fn write_sdo<T: SdoValue>(
        &self,
        address: u16,
        index: u16,
        subindex: u8,
        value: T,
        timeout: Duration,
    ) -> Result<(), BusError> {
        let mut buf = [0u8; MAX_VALUE_SIZE];
        value.write_le(&mut buf[..T::SIZE]);
        self.sdo_write(address, index, subindex, false, &buf[..T::SIZE], timeout)
    }
}

impl<B: EthercatBus + ?Sized> SdoExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockBus;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[test]
    fn test_value_encoding() {
        let mut buf = [0u8; 4];
        (-3i8).write_le(&mut buf[..1]);
        assert_eq!(buf[0], 0xFD);
        0x1234_5678u32.write_le(&mut buf);
        assert_eq!(buf, [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(i16::read_le(&[0xFE, 0xFF]), -2);
        assert_eq!(<u32 as SdoValue>::SIZE, 4);
    }

    #[test]
    fn test_typed_roundtrip_through_trait_object() {
        let bus: Arc<dyn EthercatBus> = Arc::new(MockBus::new(1));
        bus.write_sdo(1, 0x6065, 0x00, 2000u32, TIMEOUT).unwrap();
        assert_eq!(bus.read_sdo::<u32>(1, 0x6065, 0x00, TIMEOUT).unwrap(), 2000);
    }

    #[test]
    fn test_size_mismatch() {
        let bus = MockBus::new(1);
        bus.write_sdo(1, 0x6065, 0x00, 7u32, TIMEOUT).unwrap();
        assert_eq!(
            bus.read_sdo::<u16>(1, 0x6065, 0x00, TIMEOUT),
            Err(BusError::SdoSize {
                index: 0x6065,
                subindex: 0,
                expected: 2,
                actual: 4
            })
        );
    }
}
