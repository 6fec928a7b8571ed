//! Submission of tuning jobs to the cloud training service.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use anyhow::Context;

use crate::config::SubmitConfig;
use crate::search::TrainingInputFile;

/// What the caller asks for when launching a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub job_name: String,
    pub project: String,
    pub image_uri: String,
    /// Passed unchanged to every trial, next to the tuned parameters.
    pub static_args: BTreeMap<String, String>,
}

impl JobRequest {
    pub fn new(
        job_name: impl Into<String>,
        project: impl Into<String>,
        image_uri: impl Into<String>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            project: project.into(),
            image_uri: image_uri.into(),
            static_args: BTreeMap::new(),
        }
    }

    pub fn static_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_args.insert(name.into(), value.into());
        self
    }
}

/// A fully rendered job, ready to hand to a [`JobSubmitter`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    pub job_name: String,
    pub project: String,
    pub image_uri: String,
    /// `--name=value` flags for the training container.
    pub args: Vec<String>,
    pub training_input: TrainingInputFile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub job_name: String,
    /// Whatever the service reported back on submission.
    pub detail: String,
}

pub trait JobSubmitter {
    fn submit(&self, submission: &JobSubmission) -> anyhow::Result<JobHandle>;
}

impl<F> JobSubmitter for F
where
    F: Fn(&JobSubmission) -> anyhow::Result<JobHandle>,
{
    fn submit(&self, submission: &JobSubmission) -> anyhow::Result<JobHandle> {
        self(submission)
    }
}

/// Submits jobs through the `gcloud ai-platform` command line tool.
pub struct GcloudSubmitter {
    config: SubmitConfig,
}

impl GcloudSubmitter {
    pub fn new(config: SubmitConfig) -> Self {
        Self { config }
    }

    pub fn command_args(&self, submission: &JobSubmission, config_path: &Path) -> Vec<String> {
        let mut args = vec![
            "ai-platform".to_string(),
            "jobs".to_string(),
            "submit".to_string(),
            "training".to_string(),
            submission.job_name.clone(),
            format!("--project={}", submission.project),
            format!("--region={}", self.config.region),
            format!("--master-image-uri={}", submission.image_uri),
            format!("--scale-tier={}", self.config.scale_tier),
            format!("--config={}", config_path.display()),
        ];
        if !submission.args.is_empty() {
            args.push("--".to_string());
            args.extend(submission.args.iter().cloned());
        }
        args
    }
}

impl Default for GcloudSubmitter {
    fn default() -> Self {
        Self::new(SubmitConfig::default())
    }
}

impl JobSubmitter for GcloudSubmitter {
    fn submit(&self, submission: &JobSubmission) -> anyhow::Result<JobHandle> {
        let config_path = self
            .config
            .config_dir
            .join(format!("{}_hps.yaml", submission.job_name));
        submission
            .training_input
            .write_yaml(&config_path)
            .context("failed to write the job configuration")?;

        let args = self.command_args(submission, &config_path);
        log::debug!("Running {} {}", self.config.gcloud_binary, args.join(" "));
        let output = Command::new(&self.config.gcloud_binary)
            .args(&args)
            .output()
            .with_context(|| format!("failed to run {}", self.config.gcloud_binary))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.config.gcloud_binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(JobHandle {
            job_name: submission.job_name.clone(),
            detail: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::HyperparamSearchSpec;

    fn submission() -> JobSubmission {
        JobSubmission {
            job_name: "sample_job_7".to_string(),
            project: "kb-experiment".to_string(),
            image_uri: "gcr.io/kb-experiment/trainer:latest".to_string(),
            args: vec!["--bucket_id=kb-bucket".to_string()],
            training_input: HyperparamSearchSpec::builder("val_acc")
                .build()
                .to_training_input()
                .unwrap(),
        }
    }

    fn submitter_in(dir: &Path, binary: &str) -> GcloudSubmitter {
        GcloudSubmitter::new(SubmitConfig {
            gcloud_binary: binary.to_string(),
            config_dir: dir.to_path_buf(),
            ..SubmitConfig::default()
        })
    }

    #[test]
    fn test_command_args() {
        let submitter = GcloudSubmitter::default();
        let args = submitter.command_args(&submission(), Path::new("/tmp/hps.yaml"));
        assert_eq!(
            args,
            vec![
                "ai-platform",
                "jobs",
                "submit",
                "training",
                "sample_job_7",
                "--project=kb-experiment",
                "--region=us-central1",
                "--master-image-uri=gcr.io/kb-experiment/trainer:latest",
                "--scale-tier=BASIC",
                "--config=/tmp/hps.yaml",
                "--",
                "--bucket_id=kb-bucket",
            ]
        );
    }

    #[test]
    fn test_job_request_builder() {
        let request = JobRequest::new("job", "project", "image")
            .static_arg("bucket_id", "kb-bucket")
            .static_arg("epochs", "3");
        assert_eq!(request.static_args.len(), 2);
        assert_eq!(request.static_args["epochs"], "3");
    }

    #[test]
    fn test_missing_binary_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let submitter = submitter_in(dir.path(), "/nonexistent/gcloud");
        let err = submitter.submit(&submission()).unwrap_err();
        assert!(err.to_string().contains("failed to run"));
        // the configuration is written before the command runs
        assert!(dir.path().join("sample_job_7_hps.yaml").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_decides_outcome() {
        let dir = tempfile::TempDir::new().unwrap();

        let handle = submitter_in(dir.path(), "true").submit(&submission()).unwrap();
        assert_eq!(handle.job_name, "sample_job_7");

        let err = submitter_in(dir.path(), "false")
            .submit(&submission())
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }
}
