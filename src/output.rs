use std::{fs::File, path::Path};

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::search::Goal;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TuningStats {
    pub metric_name: Option<String>,
    pub trials: Vec<TrialRecord>,
}

impl TuningStats {
    /// Best trial under `goal`. On ties the earliest trial wins.
    pub fn best(&self, goal: Goal) -> Option<&TrialRecord> {
        self.trials.iter().reduce(|best, trial| {
            if goal.is_better(trial.metric, best.metric) {
                trial
            } else {
                best
            }
        })
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = File::options()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)?;
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrialRecord {
    pub index: i64,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub metric: f64,
}
