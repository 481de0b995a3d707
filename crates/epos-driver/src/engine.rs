//! PDO 状态切换引擎
//!
//! 每个写周期（且上次 tick 之后已有新的读周期）推进一步：
//! - 当前状态等于目标：连续命中计数 +1，达到阈值后完成
//! - 否则清零计数；距上次更换控制字超过最小间隔时，按状态表取下一步转换
//!
//! 时间由调用方传入，便于测试。

use epos_protocol::{Controlword, DriveState, ProtocolError, StateTransition, next_transition};
use std::time::{Duration, Instant};

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// 没有进行中的请求
    Idle,
    /// 等待：已命中目标但次数不足，或未到最小间隔
    Waiting,
    /// 应用了一步转换（控制字已更新）
    Applied(StateTransition),
    /// 状态切换完成
    Reached(DriveState),
    /// 当前状态无法解码，保持控制字
    Undecodable,
}

/// 某个请求的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestStatus {
    Pending,
    Completed,
    /// 被取消或被更新的请求替代
    Abandoned,
}

#[derive(Debug)]
pub(crate) struct PdoTransitionEngine {
    target: Option<DriveState>,
    matches: u32,
    last_change: Instant,
    min_dwell: Duration,
    required_matches: u32,
    generation: u64,
    completed_generation: u64,
}

impl PdoTransitionEngine {
    pub fn new(min_dwell: Duration, required_matches: u32) -> Self {
        Self {
            target: None,
            matches: 0,
            last_change: Instant::now(),
            min_dwell,
            required_matches: required_matches.max(1),
            generation: 0,
            completed_generation: 0,
        }
    }

    /// 开始新的状态切换，返回请求编号
    ///
    /// Fault 不能作为目标，返回 `None` 且不影响进行中的请求。
    pub fn request(&mut self, target: DriveState, now: Instant) -> Option<u64> {
        if target == DriveState::Fault {
            return None;
        }
        self.generation += 1;
        self.target = Some(target);
        self.matches = 0;
        self.last_change = now;
        Some(self.generation)
    }

    pub fn cancel(&mut self) -> Option<DriveState> {
        self.matches = 0;
        self.target.take()
    }

    pub fn is_pending(&self) -> bool {
        self.target.is_some()
    }

    pub fn status(&self, generation: u64) -> RequestStatus {
        if self.completed_generation == generation {
            RequestStatus::Completed
        } else if generation == self.generation && self.target.is_some() {
            RequestStatus::Pending
        } else {
            RequestStatus::Abandoned
        }
    }

    /// 推进一步
    pub fn tick(
        &mut self,
        current: Result<DriveState, ProtocolError>,
        controlword: &mut Controlword,
        now: Instant,
    ) -> TickOutcome {
        let Some(target) = self.target else {
            return TickOutcome::Idle;
        };
        let Ok(current) = current else {
            self.matches = 0;
            return TickOutcome::Undecodable;
        };

        if current == target {
            self.matches += 1;
            if self.matches >= self.required_matches {
                self.target = None;
                self.matches = 0;
                self.completed_generation = self.generation;
                return TickOutcome::Reached(target);
            }
            return TickOutcome::Waiting;
        }

        self.matches = 0;
        if now.saturating_duration_since(self.last_change) <= self.min_dwell {
            return TickOutcome::Waiting;
        }
        match next_transition(target, current) {
            Ok(Some(transition)) => {
                *controlword = transition.controlword();
                self.last_change = now;
                TickOutcome::Applied(transition)
            },
            // current != target 且目标不是 Fault，状态表总有下一步
            Ok(None) | Err(_) => TickOutcome::Waiting,
        }
    }
}
