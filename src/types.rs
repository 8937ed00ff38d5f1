use serde::{Deserialize, Serialize};

/// One validated server record submitted to a probing round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub address: String,
    /// Unique, ascending scan-candidate ports.
    pub ports: Vec<u16>,
    pub scan: bool,
}

/// Liveness outcome for one target within a round.
///
/// A status only advances `Pending -> {Reachable, Unreachable}`; it never
/// reverts within a round.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Reachable,
    Unreachable,
}

/// Current probe result for one target: liveness plus port classification.
///
/// `open` and `closed` are disjoint subsets of the target's declared ports
/// and only ever grow while the round is running.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: Status,
    pub open: Vec<u16>,
    pub closed: Vec<u16>,
}

impl ProbeOutcome {
    pub fn pending() -> Self {
        Self {
            status: Status::Pending,
            open: Vec::new(),
            closed: Vec::new(),
        }
    }
}

/// One row of a store snapshot, in submission order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetRow {
    pub name: String,
    pub address: String,
    pub outcome: ProbeOutcome,
}

/// Aggregate round report, written as pretty JSON by `--output`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoundReport {
    pub generated_at: String,
    pub timeout_secs: u64,
    pub targets: Vec<TargetRow>,
}
