//! On-disk form of the phase state.
//!
//! ```json
//! {
//!   "currentPhase": "TaxiOut",
//!   "enteredAt": "2026-03-01T10:15:00Z",
//!   "transitionHistory": [
//!     { "from": "Departure", "to": "TaxiOut", "timestamp": "...", "duration": 912.4, "reason": "Ready for taxi" }
//!   ],
//!   "predictedNextPhase": "Flight",
//!   "lastUpdated": "2026-03-01T10:15:02Z"
//! }
//! ```
//!
//! Phases are written by symbolic name so documents survive enum reordering.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PersistenceError;
use super::types::{FlightPhase, PhaseTransitionRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhaseStateDocument {
    pub current_phase: FlightPhase,
    pub entered_at: DateTime<Utc>,
    pub transition_history: Vec<TransitionEntry>,
    pub predicted_next_phase: Option<FlightPhase>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TransitionEntry {
    pub from: FlightPhase,
    pub to: FlightPhase,
    pub timestamp: DateTime<Utc>,
    /// Seconds spent in `from`.
    pub duration: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<&PhaseTransitionRecord> for TransitionEntry {
    fn from(record: &PhaseTransitionRecord) -> Self {
        Self {
            from: record.from,
            to: record.to,
            timestamp: record.timestamp,
            duration: record.duration_in_previous_phase.as_secs_f64(),
            reason: record.reason.clone(),
        }
    }
}

impl TryFrom<TransitionEntry> for PhaseTransitionRecord {
    type Error = PersistenceError;

    fn try_from(entry: TransitionEntry) -> Result<Self, Self::Error> {
        let duration = Duration::try_from_secs_f64(entry.duration).map_err(|_| {
            PersistenceError::InvalidDocument(format!(
                "transition {} -> {} has invalid duration {}",
                entry.from, entry.to, entry.duration
            ))
        })?;
        Ok(Self {
            from: entry.from,
            to: entry.to,
            timestamp: entry.timestamp,
            duration_in_previous_phase: duration,
            reason: entry.reason,
        })
    }
}

impl PhaseStateDocument {
    pub(crate) fn write_to<W: Write>(&self, writer: W) -> Result<(), PersistenceError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(reader: R) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Convert the history, rejecting the whole document on any bad entry.
    pub(crate) fn history(&self) -> Result<Vec<PhaseTransitionRecord>, PersistenceError> {
        self.transition_history
            .iter()
            .cloned()
            .map(PhaseTransitionRecord::try_from)
            .collect()
    }
}

/// Write `bytes` to `path` through a temporary sibling, then rename over it.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "phase_state".into());
    name.push(".tmp");
    path.with_file_name(name)
}
