use rand::{rngs::StdRng, rngs::ThreadRng, thread_rng, Rng, SeedableRng};

use crate::{config::RandomSearchConfig, params::ParameterSet};

use super::TrialGenerator;

/// Independent random samples of a parameter set.
///
/// The rng is cloned for every search. With a seedable rng such as `StdRng`
/// generating twice from the same runner yields the same trials; the default
/// `ThreadRng` shares its state between clones and does not.
pub struct RandomRunner<R: Rng + Clone = ThreadRng> {
    budget: u64,
    rng: R,
}

impl RandomRunner {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            rng: thread_rng(),
        }
    }
}

impl RandomRunner<StdRng> {
    pub fn from_config(config: &RandomSearchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new_with_rng(config.budget, rng)
    }
}

impl<R: Rng + Clone> RandomRunner<R> {
    pub fn new_with_rng(budget: u64, rng: R) -> Self {
        Self { budget, rng }
    }
}

impl<R: Rng + Clone> TrialGenerator for RandomRunner<R> {
    fn generate_iterator<'a>(
        &'a self,
        ranges: &'a ParameterSet,
    ) -> Box<dyn Iterator<Item = ParameterSet> + 'a> {
        let mut rng = self.rng.clone();
        let iterator = (0..self.budget).map(move |index| {
            let mut params = ranges.sample(&mut rng);
            params.set_index(index as i64);
            params
        });
        Box::new(iterator)
    }

    fn budget(&self) -> u64 {
        self.budget
    }
}
