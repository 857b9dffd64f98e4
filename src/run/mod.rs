//! One valuation run and its guard

pub mod guard;
pub mod orchestrator;

pub use guard::{MarkerCells, RunGuard, NO_ERROR_SENTINEL};
pub use orchestrator::{RunLayout, RunOrchestrator, UpstreamRetry};

use std::fmt;

/// Step a run is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    CheckingUpstream,
    CheckingFreshness,
    ResolvingLedger,
    Fetching,
    Writing,
    ComputingTotals,
    WritingTotals,
    ComputingDelta,
    WritingTimestamp,
    Done,
    Errored,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Errored)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::CheckingUpstream => "checking upstream",
            RunState::CheckingFreshness => "checking freshness",
            RunState::ResolvingLedger => "resolving ledger",
            RunState::Fetching => "fetching prices",
            RunState::Writing => "writing prices",
            RunState::ComputingTotals => "computing totals",
            RunState::WritingTotals => "writing totals",
            RunState::ComputingDelta => "computing delta",
            RunState::WritingTimestamp => "writing timestamp",
            RunState::Done => "done",
            RunState::Errored => "errored",
        };
        write!(f, "{}", name)
    }
}
