pub mod fixed_runner;
pub mod random_runner;

use crate::params::ParameterSet;

/// Produces the concrete parameter sets a local search evaluates.
pub trait TrialGenerator {
    /// Yields the trials of one search over `ranges`. Each set carries its
    /// position in the search as its index.
    fn generate_iterator<'a>(
        &'a self,
        ranges: &'a ParameterSet,
    ) -> Box<dyn Iterator<Item = ParameterSet> + 'a>;

    fn budget(&self) -> u64;
}
