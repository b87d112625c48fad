//! Observable refresh state.

use serde::Serialize;

use crate::cycle::CycleReport;

/// Whether a cycle currently holds the single-flight gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleState {
    #[default]
    Idle,
    Running { cycle: u64 },
}

/// Counters and last result, published on every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    #[serde(flatten)]
    pub state: CycleState,
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_timed_out: u64,
    /// Ticks dropped because the previous cycle was still running.
    pub ticks_skipped: u64,
    pub last_cycle: Option<CycleReport>,
}

impl RefreshStatus {
    pub fn is_running(&self) -> bool {
        matches!(self.state, CycleState::Running { .. })
    }
}
