//! Sampling strategies that stand in for a literal hyperparameter value.
//!
//! Every distribution draws from a random source handed in by the caller, so
//! seeding one `Rng` makes a whole search reproducible.

use std::fmt;

use itertools::Itertools;
use rand::distributions::{Distribution as _, WeightedIndex};
use rand::Rng;

use crate::errors::{Error, Result};
use crate::value::Value;

/// Uniform continuous draw in `[min_value, max_value)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Double {
    min_value: f64,
    max_value: f64,
}

impl Double {
    pub fn new(min_value: f64, max_value: f64) -> Result<Self> {
        if !(min_value < max_value) || !(max_value - min_value).is_finite() {
            return Err(Error::InvalidRange {
                min: min_value,
                max: max_value,
            });
        }
        Ok(Self {
            min_value,
            max_value,
        })
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        rng.gen_range(self.min_value..self.max_value)
    }
}

/// Uniform integer draw in `[min_value, max_value)`.
///
/// The upper bound is exclusive: `Integer::new(1, 3)` only ever yields 1 or 2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Integer {
    min_value: i64,
    max_value: i64,
}

impl Integer {
    pub fn new(min_value: i64, max_value: i64) -> Result<Self> {
        if min_value >= max_value {
            return Err(Error::InvalidRange {
                min: min_value as f64,
                max: max_value as f64,
            });
        }
        Ok(Self {
            min_value,
            max_value,
        })
    }

    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    pub fn sample(&self, rng: &mut impl Rng) -> i64 {
        rng.gen_range(self.min_value..self.max_value)
    }
}

/// Bernoulli draw: `true` with probability `p_true`.
#[derive(Clone, Debug, PartialEq)]
pub struct Boolean {
    p_true: f64,
}

impl Boolean {
    pub fn new(p_true: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p_true) {
            return Err(Error::InvalidProbability(p_true));
        }
        Ok(Self { p_true })
    }

    pub fn p_true(&self) -> f64 {
        self.p_true
    }

    pub fn sample(&self, rng: &mut impl Rng) -> bool {
        rng.gen_bool(self.p_true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceKind {
    /// Numeric candidates.
    Discrete,
    /// String candidates.
    Categorical,
}

/// Weighted draw from a fixed list of candidates.
///
/// The weights are normalized once at construction and always sum to 1.
#[derive(Clone, Debug)]
pub struct Choice {
    kind: ChoiceKind,
    values: Vec<Value>,
    probs: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl Choice {
    /// Builds a choice of the given kind. Without weights every candidate is
    /// equally likely.
    pub fn new(kind: ChoiceKind, values: Vec<Value>, weights: Option<Vec<f64>>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::EmptyChoices);
        }
        if kind == ChoiceKind::Discrete {
            if let Some(value) = values.iter().find(|v| !v.is_numeric()) {
                return Err(Error::NonNumericCandidate(value.to_string()));
            }
        }
        let weights = weights.unwrap_or_else(|| vec![1.0; values.len()]);
        if weights.len() != values.len() {
            return Err(Error::InvalidWeights(format!(
                "expected {} weights, received {}",
                values.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::InvalidWeights(format!(
                "weight {} is negative or not finite",
                w
            )));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(Error::InvalidWeights(format!(
                "weights must sum to a positive number, got {}",
                total
            )));
        }
        let probs = weights.iter().map(|w| w / total).collect::<Vec<_>>();
        let index =
            WeightedIndex::new(&probs).map_err(|e| Error::InvalidWeights(e.to_string()))?;
        Ok(Self {
            kind,
            values,
            probs,
            index,
        })
    }

    pub fn discrete<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Result<Self> {
        Self::new(
            ChoiceKind::Discrete,
            values.into_iter().map(Into::into).collect(),
            None,
        )
    }

    pub fn weighted_discrete<V: Into<Value>>(
        values: impl IntoIterator<Item = V>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        Self::new(
            ChoiceKind::Discrete,
            values.into_iter().map(Into::into).collect(),
            Some(weights),
        )
    }

    pub fn categorical<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Result<Self> {
        Self::new(
            ChoiceKind::Categorical,
            values.into_iter().map(|s| Value::Str(s.into())).collect(),
            None,
        )
    }

    pub fn weighted_categorical<S: Into<String>>(
        values: impl IntoIterator<Item = S>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        Self::new(
            ChoiceKind::Categorical,
            values.into_iter().map(|s| Value::Str(s.into())).collect(),
            Some(weights),
        )
    }

    /// Builds a choice from `(candidate, weight)` pairs.
    pub fn from_weighted_pairs<V: Into<Value>>(
        kind: ChoiceKind,
        pairs: impl IntoIterator<Item = (V, f64)>,
    ) -> Result<Self> {
        let (values, weights): (Vec<Value>, Vec<f64>) =
            pairs.into_iter().map(|(v, w)| (v.into(), w)).unzip();
        Self::new(kind, values, Some(weights))
    }

    pub fn kind(&self) -> ChoiceKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn is_uniform(&self) -> bool {
        let p = 1.0 / self.probs.len() as f64;
        self.probs.iter().all(|x| (x - p).abs() < 1e-12)
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Value {
        self.values[self.index.sample(rng)].clone()
    }
}

impl PartialEq for Choice {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.values == other.values && self.probs == other.probs
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    Double(Double),
    Integer(Integer),
    Boolean(Boolean),
    Choice(Choice),
}

impl Distribution {
    pub fn sample(&self, rng: &mut impl Rng) -> Value {
        match self {
            Self::Double(d) => Value::Float(d.sample(rng)),
            Self::Integer(d) => Value::Integer(d.sample(rng)),
            Self::Boolean(d) => Value::Bool(d.sample(rng)),
            Self::Choice(d) => d.sample(rng),
        }
    }
}

impl From<Double> for Distribution {
    fn from(value: Double) -> Self {
        Self::Double(value)
    }
}

impl From<Integer> for Distribution {
    fn from(value: Integer) -> Self {
        Self::Integer(value)
    }
}

impl From<Boolean> for Distribution {
    fn from(value: Boolean) -> Self {
        Self::Boolean(value)
    }
}

impl From<Choice> for Distribution {
    fn from(value: Choice) -> Self {
        Self::Choice(value)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(d) => write!(f, "Double({}, {})", d.min_value, d.max_value),
            Self::Integer(d) => write!(f, "Integer({}, {})", d.min_value, d.max_value),
            Self::Boolean(d) => write!(f, "Boolean({})", d.p_true),
            Self::Choice(d) => {
                let name = match d.kind {
                    ChoiceKind::Discrete => "Discrete",
                    ChoiceKind::Categorical => "Categorical",
                };
                write!(
                    f,
                    "{}([{}], [{}])",
                    name,
                    d.values.iter().join(", "),
                    d.probs.iter().join(", ")
                )
            }
        }
    }
}
