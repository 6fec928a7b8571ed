use std::{fs::File, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSearchConfig {
    pub budget: u64,
    /// Fixed seed for reproducible searches. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for RandomSearchConfig {
    fn default() -> Self {
        Self {
            budget: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    pub gcloud_binary: String,
    pub region: String,
    pub scale_tier: String,
    /// Where the rendered hyperparameter YAML is written before submission.
    pub config_dir: PathBuf,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            gcloud_binary: "gcloud".to_string(),
            region: "us-central1".to_string(),
            scale_tier: "BASIC".to_string(),
            config_dir: std::env::temp_dir(),
        }
    }
}

/// Reads any of the config structs from a JSON file. Missing keys fall back
/// to their defaults.
pub fn read_config<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}
