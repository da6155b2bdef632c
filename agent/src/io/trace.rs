//! Trace files for agent runs.
//!
//! A trace directory holds one `turn-NNN.json` per turn, the seeding
//! `initial.json` observation, and a final `outcome.json`. Files are written
//! as the loop progresses so a crashed run still leaves a partial trace.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{Observation, TurnRecord};

#[derive(Debug, Clone)]
pub struct TraceWriter {
    dir: PathBuf,
}

impl TraceWriter {
    /// Create the trace directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create trace dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn turn_path(&self, turn: u32) -> PathBuf {
        self.dir.join(format!("turn-{turn:03}.json"))
    }

    pub fn write_initial(&self, observation: &Observation) -> Result<PathBuf> {
        let path = self.dir.join("initial.json");
        write_json(&path, observation)?;
        Ok(path)
    }

    pub fn write_turn(&self, record: &TurnRecord) -> Result<PathBuf> {
        let path = self.turn_path(record.turn);
        write_json(&path, record)?;
        Ok(path)
    }

    pub fn write_outcome<T: Serialize>(&self, outcome: &T) -> Result<PathBuf> {
        let path = self.dir.join("outcome.json");
        write_json(&path, outcome)?;
        Ok(path)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ActionRecord, CiStatus, Decision, TurnFault};

    #[test]
    fn turn_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let writer = TraceWriter::create(temp.path().join("trace")).expect("create");
        assert!(writer.turn_path(7).ends_with("trace/turn-007.json"));
    }

    #[test]
    fn writes_turn_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let writer = TraceWriter::create(temp.path()).expect("create");
        let record = TurnRecord {
            turn: 1,
            decision: Decision::error("Invalid reasoning format from LLM"),
            action: ActionRecord::error("", "", "Invalid reasoning format from LLM"),
            observation: Observation::new(
                "Error occurred: Invalid reasoning format from LLM",
                CiStatus::Unknown,
                true,
            ),
            faults: vec![TurnFault::Reasoning, TurnFault::Action],
            consecutive_failures: 1,
        };

        let path = writer.write_turn(&record).expect("write");
        let written: TurnRecord =
            serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("parse");
        assert_eq!(written, record);
    }
}
