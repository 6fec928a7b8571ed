use std::path::PathBuf;

use anyhow::Context;

use crate::output::{TrialRecord, TuningStats};
use crate::params::ParameterSet;
use crate::runners::TrialGenerator;
use crate::search::Goal;

/// A training function: takes one concrete parameter set and reports the
/// metric of interest.
pub trait TrialRunner {
    fn run(&self, params: &ParameterSet) -> anyhow::Result<f64>;
}

impl<T> TrialRunner for T
where
    T: Fn(&ParameterSet) -> anyhow::Result<f64>,
{
    fn run(&self, params: &ParameterSet) -> anyhow::Result<f64> {
        self(params)
    }
}

pub struct TuningResult {
    pub best_params: ParameterSet,
    pub best_metric: f64,
    pub stats: TuningStats,
}

/// Runs local trials and keeps track of the best one.
pub struct Tuner<R: TrialRunner> {
    runner: R,
    metric_name: Option<String>,
    output: Option<PathBuf>,
    save_interval: Option<u32>,
}

impl<R: TrialRunner> Tuner<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            metric_name: None,
            output: None,
            save_interval: None,
        }
    }

    pub fn metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = Some(name.into());
        self
    }

    /// Writes the stats to `path` when the search ends.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Also writes the stats every `interval` trials. Needs [`Tuner::output`].
    pub fn save_interval(mut self, interval: u32) -> Self {
        self.save_interval = Some(interval);
        self
    }

    /// Evaluates every trial the generator yields. The first failing trial
    /// stops the search and its error is returned, and so does a trial that
    /// reports a NaN or infinite metric.
    pub fn tune<G: TrialGenerator>(
        &self,
        ranges: &ParameterSet,
        generator: &G,
        goal: Goal,
    ) -> anyhow::Result<TuningResult> {
        let mut stats = TuningStats {
            metric_name: self.metric_name.clone(),
            trials: Vec::new(),
        };
        let mut best: Option<(ParameterSet, f64)> = None;
        let size = generator.budget();

        for (count, params) in generator.generate_iterator(ranges).enumerate() {
            let index = params.index().unwrap_or(count as i64);
            let metric = self
                .runner
                .run(&params)
                .with_context(|| format!("trial {} failed with {}", index, params))?;
            if !metric.is_finite() {
                anyhow::bail!(
                    "trial {} reported a non-finite metric {} for {}",
                    index,
                    metric,
                    params
                );
            }
            log::debug!("Trial evaluated {}/{}: {}", count + 1, size, metric);

            stats.trials.push(TrialRecord {
                index,
                params: params.to_dict()?,
                metric,
            });
            if best
                .as_ref()
                .map_or(true, |(_, current)| goal.is_better(metric, *current))
            {
                best = Some((params, metric));
            }

            if let (Some(path), Some(interval)) = (&self.output, self.save_interval) {
                if interval > 0 && (count as u32 + 1) % interval == 0 {
                    stats.write_to_file(path)?;
                }
            }
        }

        if let Some(path) = &self.output {
            stats.write_to_file(path)?;
            log::info!("Saved {} trials to {}", stats.trials.len(), path.display());
        }
        let (best_params, best_metric) = best.context("the search produced no trials")?;
        Ok(TuningResult {
            best_params,
            best_metric,
            stats,
        })
    }
}
