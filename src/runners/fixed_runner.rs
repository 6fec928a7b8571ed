use crate::params::ParameterSet;

use super::TrialGenerator;

/// Replays an explicit list of parameter sets, e.g. to re-run the best trials
/// of an earlier search.
pub struct FixedRunner {
    points: Vec<ParameterSet>,
}

impl FixedRunner {
    pub fn new(points: impl IntoIterator<Item = ParameterSet>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }
}

impl TrialGenerator for FixedRunner {
    fn generate_iterator<'a>(
        &'a self,
        _ranges: &'a ParameterSet,
    ) -> Box<dyn Iterator<Item = ParameterSet> + 'a> {
        let iterator = self.points.iter().enumerate().map(|(index, params)| {
            let mut params = params.clone();
            params.set_index(index as i64);
            params
        });
        Box::new(iterator)
    }

    fn budget(&self) -> u64 {
        self.points.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_replays_points_in_order() {
        let defaults = ParameterSet::builder("P").field("lr", 0.1).build().unwrap();
        let points = [0.1, 0.01, 0.001].map(|lr| {
            let mut p = defaults.clone();
            p.set("lr", lr).unwrap();
            p
        });
        let runner = FixedRunner::new(points);
        assert_eq!(runner.budget(), 3);

        let trials = runner.generate_iterator(&defaults).collect::<Vec<_>>();
        assert_eq!(trials[2].value("lr"), Some(&Value::Float(0.001)));
        assert_eq!(trials[2].index(), Some(2));
    }
}
