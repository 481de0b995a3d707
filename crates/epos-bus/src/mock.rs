//! 模拟 CiA 402 从站
//!
//! 用于无硬件测试：
//! - 按控制字驱动设备侧状态机（SDO 与 PDO 两条路径）
//! - 由映射对象（0x1600/0x1A00）推导布局，按布局编解码过程数据
//! - SDO 对象存储
//! - 故障注入：第 N 次控制字写失败、设备“卡住”、强制故障、PDO 读写失败

use crate::{BusError, EthercatBus, PdoSizes, SlaveState};
use epos_protocol::od::*;
use epos_protocol::{
    DriveState, RxPdoFrame, RxPdoType, Statusword, TxPdoCstCsp, TxPdoCyclic, TxPdoFrame,
    TxPdoPvm, TxPdoStandard, TxPdoType,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 默认额定电流（mA）
pub const DEFAULT_NOMINAL_CURRENT_MA: u32 = 4000;

/// 状态字中与状态无关的常亮位（Remote）
const STATUSWORD_REMOTE: u16 = 0x0200;

/// 一次 SDO 写记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdoWriteRecord {
    pub index: u16,
    pub subindex: u8,
    pub data: Vec<u8>,
}

/// 一次 RxPDO 写记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxPdoRecord {
    pub at: Instant,
    pub frame: RxPdoFrame,
}

#[derive(Debug)]
struct MockSlave {
    slave_state: SlaveState,
    drive_state: DriveState,
    statusword_override: Option<u16>,
    error_code: u16,
    objects: HashMap<(u16, u8), Vec<u8>>,
    rx_mapping: Vec<u32>,
    tx_mapping: Vec<u32>,
    pdo_sizes_override: Option<PdoSizes>,

    // 反馈值
    actual_position: i32,
    actual_velocity: i32,
    actual_current: i16,
    demand_velocity: i32,

    // 故障注入
    stuck: bool,
    controlword_writes: usize,
    fail_controlword_write_at: Option<usize>,
    failing_sdo_reads: HashSet<(u16, u8)>,
    failing_sdo_writes: HashSet<(u16, u8)>,
    dropped_sdo_writes: HashSet<(u16, u8)>,
    fail_pdo_write: bool,
    fail_pdo_read: bool,

    // 日志
    sdo_controlwords: Vec<u16>,
    sdo_writes: Vec<SdoWriteRecord>,
    rx_frames: Vec<RxPdoRecord>,
    state_requests: Vec<SlaveState>,
}

impl MockSlave {
    fn statusword(&self) -> u16 {
        self.statusword_override.unwrap_or_else(|| {
            Statusword::for_drive_state(self.drive_state).raw() | STATUSWORD_REMOTE
        })
    }

    /// 设备侧对控制字的响应
    fn apply_controlword(&mut self, controlword: u16) {
        if self.stuck {
            return;
        }
        let next = match self.drive_state {
            DriveState::Fault => {
                if controlword & 0x0080 != 0 {
                    self.error_code = 0;
                    Some(DriveState::SwitchOnDisabled)
                } else {
                    None
                }
            },
            current => device_transition(current, controlword),
        };
        if let Some(next) = next.filter(|s| *s != self.drive_state) {
            debug!(
                "Mock slave: {} -> {} (controlword 0x{:04X})",
                self.drive_state, next, controlword
            );
            self.drive_state = next;
        }
    }

    fn mapped_bytes(mapping: &[u32]) -> usize {
        mapping.iter().map(|raw| (raw & 0xFF) as usize).sum::<usize>() / 8
    }

    fn rx_layout(&self) -> Option<RxPdoType> {
        RX_LAYOUTS.into_iter().find(|layout| {
            let raws: Vec<u32> = layout.mapping().iter().map(|e| e.raw()).collect();
            raws == self.rx_mapping
        })
    }

    fn tx_layout(&self) -> Option<TxPdoType> {
        TX_LAYOUTS.into_iter().find(|layout| {
            let raws: Vec<u32> = layout.mapping().iter().map(|e| e.raw()).collect();
            raws == self.tx_mapping
        })
    }

    fn pdo_sizes(&self) -> PdoSizes {
        self.pdo_sizes_override.unwrap_or(PdoSizes {
            rx: Self::mapped_bytes(&self.rx_mapping),
            tx: Self::mapped_bytes(&self.tx_mapping),
        })
    }

    fn mode_display(&self) -> i8 {
        self.objects
            .get(&(OD_MODES_OF_OPERATION, 0x00))
            .and_then(|data| data.first())
            .map(|b| *b as i8)
            .unwrap_or(0)
    }

    fn update_mapping(&mut self, index: u16, subindex: u8, data: &[u8]) {
        let mapping = match index {
            OD_RX_PDO_MAPPING => &mut self.rx_mapping,
            OD_TX_PDO_MAPPING => &mut self.tx_mapping,
            _ => return,
        };
        if subindex == 0 {
            let count = data.first().copied().unwrap_or(0) as usize;
            mapping.truncate(count);
            return;
        }
        let mut raw = [0u8; 4];
        let len = data.len().min(4);
        raw[..len].copy_from_slice(&data[..len]);
        let slot = subindex as usize - 1;
        if mapping.len() <= slot {
            mapping.resize(slot + 1, 0);
        }
        mapping[slot] = u32::from_le_bytes(raw);
    }
}

const RX_LAYOUTS: [RxPdoType; 6] = [
    RxPdoType::Standard,
    RxPdoType::Csp,
    RxPdoType::Cst,
    RxPdoType::Csv,
    RxPdoType::CstCsp,
    RxPdoType::Pvm,
];

const TX_LAYOUTS: [TxPdoType; 6] = [
    TxPdoType::Standard,
    TxPdoType::Csp,
    TxPdoType::Cst,
    TxPdoType::Csv,
    TxPdoType::CstCsp,
    TxPdoType::Pvm,
];

/// CiA 402 设备侧命令解码（故障状态除外）
fn device_transition(current: DriveState, controlword: u16) -> Option<DriveState> {
    use DriveState::*;

    let disable_voltage = controlword & 0x0002 == 0;
    let quick_stop = controlword & 0x0006 == 0x0002;
    let shutdown = controlword & 0x0087 == 0x0006;
    let switch_on = controlword & 0x008F == 0x0007;
    let enable_operation = controlword & 0x008F == 0x000F;

    if disable_voltage {
        return match current {
            ReadyToSwitchOn | SwitchedOn | OperationEnabled | QuickStopActive => {
                Some(SwitchOnDisabled)
            },
            _ => None,
        };
    }
    if quick_stop {
        return match current {
            OperationEnabled => Some(QuickStopActive),
            ReadyToSwitchOn | SwitchedOn => Some(SwitchOnDisabled),
            _ => None,
        };
    }
    match current {
        SwitchOnDisabled if shutdown => Some(ReadyToSwitchOn),
        ReadyToSwitchOn if switch_on => Some(SwitchedOn),
        SwitchedOn if enable_operation => Some(OperationEnabled),
        SwitchedOn if shutdown => Some(ReadyToSwitchOn),
        OperationEnabled if switch_on => Some(SwitchedOn),
        OperationEnabled if shutdown => Some(ReadyToSwitchOn),
        _ => None,
    }
}

/// 模拟单个从站的总线
pub struct MockBus {
    address: u16,
    inner: Mutex<MockSlave>,
}

impl MockBus {
    /// 创建位于 `address` 的从站：PRE-OP，SwitchOnDisabled
    pub fn new(address: u16) -> Self {
        let mut objects = HashMap::new();
        objects.insert(
            (OD_MOTOR_DATA, SUB_MOTOR_DATA_NOMINAL_CURRENT),
            DEFAULT_NOMINAL_CURRENT_MA.to_le_bytes().to_vec(),
        );
        Self {
            address,
            inner: Mutex::new(MockSlave {
                slave_state: SlaveState::PreOperational,
                drive_state: DriveState::SwitchOnDisabled,
                statusword_override: None,
                error_code: 0,
                objects,
                rx_mapping: Vec::new(),
                tx_mapping: Vec::new(),
                pdo_sizes_override: None,
                actual_position: 0,
                actual_velocity: 0,
                actual_current: 0,
                demand_velocity: 0,
                stuck: false,
                controlword_writes: 0,
                fail_controlword_write_at: None,
                failing_sdo_reads: HashSet::new(),
                failing_sdo_writes: HashSet::new(),
                dropped_sdo_writes: HashSet::new(),
                fail_pdo_write: false,
                fail_pdo_read: false,
                sdo_controlwords: Vec::new(),
                sdo_writes: Vec::new(),
                rx_frames: Vec::new(),
                state_requests: Vec::new(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // 构造配置
    // ------------------------------------------------------------------------

    pub fn with_drive_state(self, state: DriveState) -> Self {
        self.inner.lock().drive_state = state;
        self
    }

    pub fn with_slave_state(self, state: SlaveState) -> Self {
        self.inner.lock().slave_state = state;
        self
    }

    pub fn with_nominal_current_ma(self, current_ma: u32) -> Self {
        self.inner.lock().objects.insert(
            (OD_MOTOR_DATA, SUB_MOTOR_DATA_NOMINAL_CURRENT),
            current_ma.to_le_bytes().to_vec(),
        );
        self
    }

    /// 覆盖主站协商的 PDO 大小（模拟映射不一致）
    pub fn with_pdo_sizes(self, sizes: PdoSizes) -> Self {
        self.inner.lock().pdo_sizes_override = Some(sizes);
        self
    }

    // ------------------------------------------------------------------------
    // 故障注入
    // ------------------------------------------------------------------------

    /// 设备忽略所有控制字
    pub fn set_stuck(&self, stuck: bool) {
        self.inner.lock().stuck = stuck;
    }

    /// 第 `n` 次（从 1 开始）SDO 控制字写入失败
    pub fn fail_controlword_write_at(&self, n: usize) {
        self.inner.lock().fail_controlword_write_at = Some(n);
    }

    pub fn fail_sdo_read(&self, index: u16, subindex: u8) {
        self.inner.lock().failing_sdo_reads.insert((index, subindex));
    }

    pub fn fail_sdo_write(&self, index: u16, subindex: u8) {
        self.inner.lock().failing_sdo_writes.insert((index, subindex));
    }

    /// SDO 写入被确认但不生效（校验写会读回旧值）
    pub fn drop_sdo_write(&self, index: u16, subindex: u8) {
        self.inner.lock().dropped_sdo_writes.insert((index, subindex));
    }

    pub fn set_fail_pdo_write(&self, fail: bool) {
        self.inner.lock().fail_pdo_write = fail;
    }

    pub fn set_fail_pdo_read(&self, fail: bool) {
        self.inner.lock().fail_pdo_read = fail;
    }

    /// 强制进入 Fault 并设置错误码（0x603F）
    pub fn inject_fault(&self, error_code: u16) {
        let mut slave = self.inner.lock();
        slave.drive_state = DriveState::Fault;
        slave.error_code = error_code;
    }

    /// 直接设置设备状态（不经过控制字）
    pub fn set_drive_state(&self, state: DriveState) {
        self.inner.lock().drive_state = state;
    }

    /// 用原始值覆盖状态字（`None` 恢复按状态生成）
    pub fn set_statusword_override(&self, statusword: Option<u16>) {
        self.inner.lock().statusword_override = statusword;
    }

    /// 设置反馈值：位置（inc）、速度（rpm）、电流（额定电流千分比）
    pub fn set_actual_values(&self, position: i32, velocity: i32, current_permille: i16) {
        let mut slave = self.inner.lock();
        slave.actual_position = position;
        slave.actual_velocity = velocity;
        slave.actual_current = current_permille;
    }

    pub fn set_demand_velocity(&self, velocity: i32) {
        self.inner.lock().demand_velocity = velocity;
    }

    // ------------------------------------------------------------------------
    // 观察
    // ------------------------------------------------------------------------

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn drive_state(&self) -> DriveState {
        self.inner.lock().drive_state
    }

    pub fn slave_state(&self) -> SlaveState {
        self.inner.lock().slave_state
    }

    pub fn statusword(&self) -> u16 {
        self.inner.lock().statusword()
    }

    /// 经 SDO 写入的控制字（按顺序，含失败的那一次）
    pub fn sdo_controlwords(&self) -> Vec<u16> {
        self.inner.lock().sdo_controlwords.clone()
    }

    /// 所有成功的 SDO 写
    pub fn sdo_writes(&self) -> Vec<SdoWriteRecord> {
        self.inner.lock().sdo_writes.clone()
    }

    /// 收到的 RxPDO
    pub fn rx_frames(&self) -> Vec<RxPdoRecord> {
        self.inner.lock().rx_frames.clone()
    }

    pub fn last_rx_frame(&self) -> Option<RxPdoFrame> {
        self.inner.lock().rx_frames.last().map(|r| r.frame)
    }

    pub fn object(&self, index: u16, subindex: u8) -> Option<Vec<u8>> {
        self.inner.lock().objects.get(&(index, subindex)).cloned()
    }

    pub fn rx_layout(&self) -> Option<RxPdoType> {
        self.inner.lock().rx_layout()
    }

    pub fn tx_layout(&self) -> Option<TxPdoType> {
        self.inner.lock().tx_layout()
    }

    pub fn state_requests(&self) -> Vec<SlaveState> {
        self.inner.lock().state_requests.clone()
    }

    pub fn clear_logs(&self) {
        let mut slave = self.inner.lock();
        slave.sdo_controlwords.clear();
        slave.sdo_writes.clear();
        slave.rx_frames.clear();
        slave.state_requests.clear();
    }

    fn check_address(&self, address: u16) -> Result<(), BusError> {
        if address != self.address {
            return Err(BusError::SlaveNotFound { address });
        }
        Ok(())
    }
}

impl EthercatBus for MockBus {
    fn sdo_read(
        &self,
        address: u16,
        index: u16,
        subindex: u8,
        _complete_access: bool,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, BusError> {
        self.check_address(address)?;
        let slave = self.inner.lock();
        if slave.failing_sdo_reads.contains(&(index, subindex)) {
            return Err(BusError::SdoRead {
                address,
                index,
                subindex,
                reason: "injected failure".to_string(),
            });
        }
        let data = match (index, subindex) {
            (OD_STATUSWORD, 0x00) => slave.statusword().to_le_bytes().to_vec(),
            (OD_ERROR_CODE, 0x00) => slave.error_code.to_le_bytes().to_vec(),
            (OD_MODES_OF_OPERATION_DISPLAY, 0x00) => vec![slave.mode_display() as u8],
            key => slave.objects.get(&key).cloned().ok_or_else(|| BusError::SdoRead {
                address,
                index,
                subindex,
                reason: "object does not exist".to_string(),
            })?,
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        trace!(
            "Mock SDO read 0x{:04X}:{:02X} = {}",
            index,
            subindex,
            hex::encode(&data)
        );
        Ok(data.len())
    }

    fn sdo_write(
        &self,
        address: u16,
        index: u16,
        subindex: u8,
        _complete_access: bool,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<(), BusError> {
        self.check_address(address)?;
        let mut slave = self.inner.lock();
        trace!(
            "Mock SDO write 0x{:04X}:{:02X} = {}",
            index,
            subindex,
            hex::encode(data)
        );

        if index == OD_CONTROLWORD && subindex == 0x00 {
            let mut raw = [0u8; 2];
            let len = data.len().min(2);
            raw[..len].copy_from_slice(&data[..len]);
            let controlword = u16::from_le_bytes(raw);
            slave.sdo_controlwords.push(controlword);
            slave.controlword_writes += 1;
            if slave.fail_controlword_write_at == Some(slave.controlword_writes) {
                return Err(BusError::SdoWrite {
                    address,
                    index,
                    subindex,
                    reason: "injected failure".to_string(),
                });
            }
            slave.apply_controlword(controlword);
        }

        if slave.failing_sdo_writes.contains(&(index, subindex)) {
            return Err(BusError::SdoWrite {
                address,
                index,
                subindex,
                reason: "injected failure".to_string(),
            });
        }
        slave.sdo_writes.push(SdoWriteRecord {
            index,
            subindex,
            data: data.to_vec(),
        });
        if slave.dropped_sdo_writes.contains(&(index, subindex)) {
            return Ok(());
        }
        slave.update_mapping(index, subindex, data);
        slave.objects.insert((index, subindex), data.to_vec());
        Ok(())
    }

    fn write_rx_pdo(&self, address: u16, data: &[u8]) -> Result<(), BusError> {
        self.check_address(address)?;
        let mut slave = self.inner.lock();
        if slave.fail_pdo_write {
            return Err(BusError::PdoWrite {
                address,
                reason: "injected failure".to_string(),
            });
        }
        let layout = slave.rx_layout().ok_or_else(|| BusError::PdoWrite {
            address,
            reason: "RxPDO not mapped".to_string(),
        })?;
        if data.len() != layout.size() {
            return Err(BusError::PdoWrite {
                address,
                reason: format!("expected {} bytes, got {}", layout.size(), data.len()),
            });
        }
        let frame = RxPdoFrame::decode(layout, data).map_err(|e| BusError::PdoWrite {
            address,
            reason: e.to_string(),
        })?;
        slave.rx_frames.push(RxPdoRecord {
            at: Instant::now(),
            frame,
        });
        slave.apply_controlword(frame.controlword());
        Ok(())
    }

    fn read_tx_pdo(&self, address: u16, buf: &mut [u8]) -> Result<usize, BusError> {
        self.check_address(address)?;
        let slave = self.inner.lock();
        if slave.fail_pdo_read {
            return Err(BusError::PdoRead {
                address,
                reason: "injected failure".to_string(),
            });
        }
        let layout = slave.tx_layout().ok_or_else(|| BusError::PdoRead {
            address,
            reason: "TxPDO not mapped".to_string(),
        })?;
        let statusword = slave.statusword();
        let frame = match layout {
            TxPdoType::Standard => TxPdoFrame::Standard(TxPdoStandard { statusword }),
            TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv => TxPdoFrame::Cyclic(TxPdoCyclic {
                statusword,
                actual_torque: slave.actual_current,
                actual_velocity: slave.actual_velocity,
                actual_position: slave.actual_position,
            }),
            TxPdoType::CstCsp => TxPdoFrame::CstCsp(TxPdoCstCsp {
                statusword,
                actual_torque: slave.actual_current,
                actual_velocity: slave.actual_velocity,
                actual_position: slave.actual_position,
                mode_of_operation_display: slave.mode_display(),
            }),
            TxPdoType::Pvm => TxPdoFrame::Pvm(TxPdoPvm {
                statusword,
                demand_velocity: slave.demand_velocity,
            }),
        };
        let bytes = frame.encode();
        if buf.len() < bytes.len() {
            return Err(BusError::PdoRead {
                address,
                reason: format!("buffer too small: {} < {}", buf.len(), bytes.len()),
            });
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn hardware_pdo_sizes(&self, address: u16) -> Result<PdoSizes, BusError> {
        self.check_address(address)?;
        Ok(self.inner.lock().pdo_sizes())
    }

    fn wait_for_state(
        &self,
        state: SlaveState,
        address: u16,
        max_retries: u32,
        retry_interval: Duration,
    ) -> bool {
        if self.check_address(address).is_err() {
            return false;
        }
        for attempt in 0..=max_retries {
            if self.inner.lock().slave_state == state {
                return true;
            }
            if attempt < max_retries {
                std::thread::sleep(retry_interval);
            }
        }
        false
    }

    fn set_state(&self, state: SlaveState, address: u16) -> Result<(), BusError> {
        self.check_address(address)?;
        let mut slave = self.inner.lock();
        slave.state_requests.push(state);
        slave.slave_state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SdoExt;
    use epos_protocol::StateTransition;

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn write_controlword(bus: &MockBus, transition: StateTransition) {
        bus.write_sdo(1, OD_CONTROLWORD, 0x00, transition.raw_controlword(), TIMEOUT)
            .unwrap();
    }

    fn map_layouts(bus: &MockBus, rx: RxPdoType, tx: TxPdoType) {
        for (sub, entry) in rx.mapping().iter().enumerate() {
            bus.write_sdo(1, OD_RX_PDO_MAPPING, sub as u8 + 1, entry.raw(), TIMEOUT)
                .unwrap();
        }
        for (sub, entry) in tx.mapping().iter().enumerate() {
            bus.write_sdo(1, OD_TX_PDO_MAPPING, sub as u8 + 1, entry.raw(), TIMEOUT)
                .unwrap();
        }
    }

    #[test]
    fn test_device_follows_enable_sequence() {
        let bus = MockBus::new(1);
        write_controlword(&bus, StateTransition::T2);
        assert_eq!(bus.drive_state(), DriveState::ReadyToSwitchOn);
        write_controlword(&bus, StateTransition::T3);
        assert_eq!(bus.drive_state(), DriveState::SwitchedOn);
        write_controlword(&bus, StateTransition::T4);
        assert_eq!(bus.drive_state(), DriveState::OperationEnabled);
        write_controlword(&bus, StateTransition::T11);
        assert_eq!(bus.drive_state(), DriveState::QuickStopActive);
        write_controlword(&bus, StateTransition::T12);
        assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);
        assert_eq!(bus.sdo_controlwords(), vec![0x0006, 0x0007, 0x000F, 0x0002, 0x0000]);
    }

    #[test]
    fn test_fault_reset_clears_error_code() {
        let bus = MockBus::new(1);
        bus.inject_fault(0x7320);
        assert_eq!(bus.read_sdo::<u16>(1, OD_ERROR_CODE, 0, TIMEOUT).unwrap(), 0x7320);
        write_controlword(&bus, StateTransition::T2);
        assert_eq!(bus.drive_state(), DriveState::Fault);
        write_controlword(&bus, StateTransition::T15);
        assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);
        assert_eq!(bus.read_sdo::<u16>(1, OD_ERROR_CODE, 0, TIMEOUT).unwrap(), 0);
    }

    #[test]
    fn test_statusword_reflects_state() {
        let bus = MockBus::new(1).with_drive_state(DriveState::OperationEnabled);
        let sw = bus.read_sdo::<u16>(1, OD_STATUSWORD, 0, TIMEOUT).unwrap();
        assert_eq!(
            Statusword::from(sw).drive_state().unwrap(),
            DriveState::OperationEnabled
        );
        bus.set_statusword_override(Some(0x0000));
        assert!(Statusword::from(bus.statusword()).drive_state().is_err());
    }

    #[test]
    fn test_failure_injection_on_nth_controlword() {
        let bus = MockBus::new(1);
        bus.fail_controlword_write_at(2);
        write_controlword(&bus, StateTransition::T2);
        assert!(
            bus.write_sdo(1, OD_CONTROLWORD, 0, 0x0007u16, TIMEOUT)
                .is_err()
        );
        assert_eq!(bus.drive_state(), DriveState::ReadyToSwitchOn);
        assert_eq!(bus.sdo_controlwords(), vec![0x0006, 0x0007]);
    }

    #[test]
    fn test_stuck_device_ignores_controlwords() {
        let bus = MockBus::new(1);
        bus.set_stuck(true);
        write_controlword(&bus, StateTransition::T2);
        assert_eq!(bus.drive_state(), DriveState::SwitchOnDisabled);
    }

    #[test]
    fn test_layout_from_mapping_and_pdo_exchange() {
        let bus = MockBus::new(1);
        map_layouts(&bus, RxPdoType::Csp, TxPdoType::Csp);
        assert_eq!(bus.rx_layout(), Some(RxPdoType::Csp));
        assert_eq!(bus.tx_layout(), Some(TxPdoType::Csp));
        assert_eq!(bus.hardware_pdo_sizes(1).unwrap(), PdoSizes { rx: 13, tx: 12 });

        let frame = RxPdoFrame::Csp(epos_protocol::RxPdoCsp {
            target_position: 1024,
            controlword: 0x0006,
            mode_of_operation: 8,
            ..Default::default()
        });
        bus.write_rx_pdo(1, &frame.encode()).unwrap();
        assert_eq!(bus.drive_state(), DriveState::ReadyToSwitchOn);
        assert_eq!(bus.last_rx_frame(), Some(frame));

        bus.set_actual_values(2048, -30, 250);
        let mut buf = [0u8; 16];
        let n = bus.read_tx_pdo(1, &mut buf).unwrap();
        let tx = TxPdoFrame::decode(TxPdoType::Csp, &buf[..n]).unwrap();
        assert_eq!(tx.actual_values(), Some((2048, -30, 250)));
    }

    #[test]
    fn test_pdo_before_mapping_fails() {
        let bus = MockBus::new(1);
        assert!(bus.write_rx_pdo(1, &[0x06, 0x00, 0x08]).is_err());
        let mut buf = [0u8; 2];
        assert!(bus.read_tx_pdo(1, &mut buf).is_err());
    }

    #[test]
    fn test_wrong_address() {
        let bus = MockBus::new(1);
        assert_eq!(
            bus.hardware_pdo_sizes(2),
            Err(BusError::SlaveNotFound { address: 2 })
        );
        assert!(!bus.wait_for_state(SlaveState::PreOperational, 2, 0, Duration::ZERO));
    }

    #[test]
    fn test_slave_state() {
        let bus = MockBus::new(1);
        assert!(bus.wait_for_state(SlaveState::PreOperational, 1, 0, Duration::ZERO));
        bus.set_state(SlaveState::Init, 1).unwrap();
        assert_eq!(bus.slave_state(), SlaveState::Init);
        assert!(!bus.wait_for_state(SlaveState::PreOperational, 1, 2, Duration::from_millis(1)));
        assert_eq!(bus.state_requests(), vec![SlaveState::Init]);
    }

    #[test]
    fn test_dropped_write_keeps_old_value() {
        let bus = MockBus::new(1);
        bus.write_sdo(1, OD_INTERPOLATION_TIME_PERIOD, 0x01, 5u8, TIMEOUT).unwrap();
        bus.drop_sdo_write(OD_INTERPOLATION_TIME_PERIOD, 0x01);
        bus.write_sdo(1, OD_INTERPOLATION_TIME_PERIOD, 0x01, 1u8, TIMEOUT).unwrap();
        assert_eq!(
            bus.read_sdo::<u8>(1, OD_INTERPOLATION_TIME_PERIOD, 0x01, TIMEOUT).unwrap(),
            5
        );
    }
}
