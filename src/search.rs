//! Cloud hyperparameter tuning job specifications.
//!
//! A [`HyperparamSearchSpec`] pairs the trial controls of a tuning job with
//! the distributions of one [`ParameterSet`] and renders them in the
//! `trainingInput` layout the AI Platform tuning service reads:
//!
//! ```yaml
//! trainingInput:
//!   hyperparameters:
//!     algorithm: ALGORITHM_UNSPECIFIED
//!     enableTrialEarlyStopping: true
//!     goal: MAXIMIZE
//!     hyperparameterMetricTag: val_acc
//!     maxFailedTrials: 2
//!     maxParallelTrials: 5
//!     maxTrials: 10
//!     params:
//!     - maxValue: 0.9
//!       minValue: -0.1
//!       parameterName: dropout_rate
//!       type: DOUBLE
//!     resumePreviousJobId: null
//! ```
//!
//! Struct fields below are declared in the order the keys are emitted.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::distribution::{ChoiceKind, Distribution};
use crate::errors::{Error, Result};
use crate::params::{Field, ParameterSet};
use crate::submit::{JobHandle, JobRequest, JobSubmission, JobSubmitter};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Goal {
    #[default]
    Maximize,
    Minimize,
}

impl Goal {
    /// Whether `candidate` beats `current` under this goal. Ties keep `current`.
    pub fn is_better(&self, candidate: f64, current: f64) -> bool {
        let wanted = match self {
            Goal::Maximize => Ordering::Greater,
            Goal::Minimize => Ordering::Less,
        };
        candidate.total_cmp(&current) == wanted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    #[default]
    AlgorithmUnspecified,
    GridSearch,
    RandomSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    Double,
    Integer,
    Discrete,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrete_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Value>,
    pub parameter_name: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hyperparameters {
    pub algorithm: Algorithm,
    pub enable_trial_early_stopping: bool,
    pub goal: Goal,
    pub hyperparameter_metric_tag: String,
    pub max_failed_trials: u32,
    pub max_parallel_trials: u32,
    pub max_trials: u32,
    pub params: Vec<ParameterSpec>,
    pub resume_previous_job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingInput {
    pub hyperparameters: Hyperparameters,
}

/// Top level document of a job configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingInputFile {
    pub training_input: TrainingInput,
}

impl TrainingInputFile {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_yaml()?)?;
        log::info!("Wrote training input to {}", path.as_ref().display());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HyperparamSearchSpec {
    max_trials: u32,
    max_parallel_trials: u32,
    max_failed_trials: u32,
    hyperparameter_metric_tag: String,
    goal: Goal,
    algorithm: Algorithm,
    enable_trial_early_stopping: bool,
    resume_previous_job_id: Option<String>,
    params: Option<ParameterSet>,
}

pub struct HyperparamSearchSpecBuilder {
    max_trials: u32,
    max_parallel_trials: u32,
    max_failed_trials: u32,
    hyperparameter_metric_tag: String,
    goal: Goal,
    algorithm: Algorithm,
    enable_trial_early_stopping: bool,
    resume_previous_job_id: Option<String>,
}

impl HyperparamSearchSpecBuilder {
    pub fn new(hyperparameter_metric_tag: impl Into<String>) -> Self {
        Self {
            max_trials: 10,
            max_parallel_trials: 1,
            max_failed_trials: 0,
            hyperparameter_metric_tag: hyperparameter_metric_tag.into(),
            goal: Goal::default(),
            algorithm: Algorithm::default(),
            enable_trial_early_stopping: true,
            resume_previous_job_id: None,
        }
    }

    pub fn max_trials(mut self, max_trials: u32) -> Self {
        self.max_trials = max_trials;
        self
    }

    pub fn max_parallel_trials(mut self, max_parallel_trials: u32) -> Self {
        self.max_parallel_trials = max_parallel_trials;
        self
    }

    pub fn max_failed_trials(mut self, max_failed_trials: u32) -> Self {
        self.max_failed_trials = max_failed_trials;
        self
    }

    pub fn goal(mut self, goal: Goal) -> Self {
        self.goal = goal;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn enable_trial_early_stopping(mut self, enable: bool) -> Self {
        self.enable_trial_early_stopping = enable;
        self
    }

    pub fn resume_previous_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.resume_previous_job_id = Some(job_id.into());
        self
    }

    pub fn build(self) -> HyperparamSearchSpec {
        HyperparamSearchSpec {
            max_trials: self.max_trials,
            max_parallel_trials: self.max_parallel_trials,
            max_failed_trials: self.max_failed_trials,
            hyperparameter_metric_tag: self.hyperparameter_metric_tag,
            goal: self.goal,
            algorithm: self.algorithm,
            enable_trial_early_stopping: self.enable_trial_early_stopping,
            resume_previous_job_id: self.resume_previous_job_id,
            params: None,
        }
    }
}

impl HyperparamSearchSpec {
    pub fn builder(hyperparameter_metric_tag: impl Into<String>) -> HyperparamSearchSpecBuilder {
        HyperparamSearchSpecBuilder::new(hyperparameter_metric_tag)
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    pub fn hyperparameter_metric_tag(&self) -> &str {
        &self.hyperparameter_metric_tag
    }

    pub fn parameters(&self) -> Option<&ParameterSet> {
        self.params.as_ref()
    }

    /// Attaches the parameter set whose distributions define the search
    /// space, replacing any previously attached set.
    pub fn add_parameters(&mut self, params: &ParameterSet) {
        self.params = Some(params.clone());
    }

    pub fn to_training_input(&self) -> Result<TrainingInputFile> {
        let params = match &self.params {
            Some(params) => render_params(params)?,
            None => Vec::new(),
        };
        Ok(TrainingInputFile {
            training_input: TrainingInput {
                hyperparameters: Hyperparameters {
                    algorithm: self.algorithm,
                    enable_trial_early_stopping: self.enable_trial_early_stopping,
                    goal: self.goal,
                    hyperparameter_metric_tag: self.hyperparameter_metric_tag.clone(),
                    max_failed_trials: self.max_failed_trials,
                    max_parallel_trials: self.max_parallel_trials,
                    max_trials: self.max_trials,
                    params,
                    resume_previous_job_id: self.resume_previous_job_id.clone(),
                },
            },
        })
    }

    pub fn to_training_input_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_training_input()?.write_yaml(path)
    }

    /// Submits a tuning job built from this spec. Static arguments are passed
    /// to every trial as `--name=value` flags. Submitter failures come back as
    /// [`Error::Submission`] and are never retried.
    pub fn run_job(&self, request: &JobRequest, submitter: &impl JobSubmitter) -> Result<JobHandle> {
        let submission = JobSubmission {
            job_name: request.job_name.clone(),
            project: request.project.clone(),
            image_uri: request.image_uri.clone(),
            args: request
                .static_args
                .iter()
                .map(|(name, value)| format!("--{}={}", name, value))
                .collect(),
            training_input: self.to_training_input()?,
        };
        log::info!(
            "Submitting job {} to project {}",
            submission.job_name,
            submission.project
        );
        let handle = submitter
            .submit(&submission)
            .map_err(|source| Error::Submission {
                job_name: request.job_name.clone(),
                source,
            })?;
        log::debug!("Job {} submitted: {}", handle.job_name, handle.detail);
        Ok(handle)
    }
}

fn render_params(params: &ParameterSet) -> Result<Vec<ParameterSpec>> {
    let mut specs = Vec::new();
    for (name, field) in params.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        match field {
            Field::Literal(_) => {}
            Field::Nested(nested) => {
                if nested.has_distributions() {
                    return Err(Error::Unsupported {
                        name: name.to_string(),
                        reason: "distributions inside nested parameter sets cannot be tuned"
                            .to_string(),
                    });
                }
            }
            Field::Distribution(distribution) => {
                specs.push(render_distribution(name, distribution)?)
            }
        }
    }
    Ok(specs)
}

fn render_distribution(name: &str, distribution: &Distribution) -> Result<ParameterSpec> {
    let mut spec = ParameterSpec {
        categorical_values: None,
        discrete_values: None,
        max_value: None,
        min_value: None,
        parameter_name: name.to_string(),
        parameter_type: ParameterType::Double,
    };
    match distribution {
        Distribution::Double(d) => {
            spec.min_value = Some(Value::Float(d.min_value()));
            spec.max_value = Some(Value::Float(d.max_value()));
        }
        Distribution::Integer(d) => {
            spec.parameter_type = ParameterType::Integer;
            spec.min_value = Some(Value::Integer(d.min_value()));
            spec.max_value = Some(Value::Integer(d.max_value()));
        }
        Distribution::Boolean(d) => {
            if d.p_true() != 0.5 {
                log::warn!(
                    "Dropping p_true={} of {}, the tuning service samples categories uniformly",
                    d.p_true(),
                    name
                );
            }
            spec.parameter_type = ParameterType::Categorical;
            spec.categorical_values = Some(vec!["false".to_string(), "true".to_string()]);
        }
        Distribution::Choice(choice) => {
            if !choice.is_uniform() {
                log::warn!(
                    "Dropping weights of {}, the tuning service samples values uniformly",
                    name
                );
            }
            match choice.kind() {
                ChoiceKind::Discrete => {
                    spec.parameter_type = ParameterType::Discrete;
                    spec.discrete_values = Some(choice.values().to_vec());
                }
                ChoiceKind::Categorical => {
                    spec.parameter_type = ParameterType::Categorical;
                    spec.categorical_values =
                        Some(choice.values().iter().map(|v| v.to_string()).collect());
                }
            }
        }
    }
    let mut numbers = spec
        .min_value
        .iter()
        .chain(&spec.max_value)
        .chain(spec.discrete_values.iter().flatten());
    if let Some(v) = numbers.find(|v| v.to_json().is_none()) {
        return Err(Error::Unsupported {
            name: name.to_string(),
            reason: format!("bound {} cannot be serialized", v),
        });
    }
    Ok(spec)
}
