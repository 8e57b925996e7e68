//! Failure-mode labels and per-mode parameter tables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SynthError;

/// Failure-mode label assigned once per trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    Normal,
    Incipient,
    Recovering,
    Terminal,
}

impl FailureMode {
    pub const ALL: [FailureMode; 4] = [
        FailureMode::Normal,
        FailureMode::Incipient,
        FailureMode::Recovering,
        FailureMode::Terminal,
    ];

    /// Modes that can trip the FTC latch.
    pub const FAULTING: [FailureMode; 3] = [
        FailureMode::Incipient,
        FailureMode::Recovering,
        FailureMode::Terminal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FailureMode::Normal => "normal",
            FailureMode::Incipient => "incipient",
            FailureMode::Recovering => "recovering",
            FailureMode::Terminal => "terminal",
        }
    }

    pub fn can_latch(self) -> bool {
        self != FailureMode::Normal
    }

    pub fn is_terminal(self) -> bool {
        self == FailureMode::Terminal
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Per-mode parameter table. Lookups fail instead of falling back to a default.
pub type ModeTable<T> = BTreeMap<FailureMode, T>;

pub fn lookup<T: Copy>(
    table: &ModeTable<T>,
    name: &'static str,
    mode: FailureMode,
) -> Result<T, SynthError> {
    table
        .get(&mode)
        .copied()
        .ok_or(SynthError::UnmappedMode { table: name, mode })
}
