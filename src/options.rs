//! Run-time settings for likelihood evaluation and simulation.
//!
//! Both can be written by hand or read from YAML:
//!
//! ```
//! let options = momi::LikelihoodOptions::from_yaml_str(
//!     "
//! kind: multinomial
//! ",
//! )
//! .unwrap();
//! assert_eq!(options.kind, momi::LikelihoodKind::Multinomial);
//! assert_eq!(options.mutation_rate, 1.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::MomiError;
use crate::traits::Validate;

/// Which composite likelihood to evaluate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LikelihoodKind {
    /// Site counts are independent Poisson variables with means
    /// proportional to the expected SFS.
    #[default]
    #[serde(rename = "poisson_random_field")]
    PoissonRandomField,
    /// Site counts are a multinomial draw from the normalized SFS.
    #[serde(rename = "multinomial")]
    Multinomial,
}

fn default_mutation_rate() -> f64 {
    1.0
}

fn default_num_replicates() -> usize {
    1
}

/// Settings of a [`LogLikelihood`](crate::LogLikelihood).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LikelihoodOptions {
    #[serde(default = "LikelihoodKind::default")]
    pub kind: LikelihoodKind,
    /// Mutation rate per locus, in the time units of the demography.
    /// Ignored by [`LikelihoodKind::Multinomial`].
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
}

impl Default for LikelihoodOptions {
    fn default() -> Self {
        Self {
            kind: LikelihoodKind::default(),
            mutation_rate: default_mutation_rate(),
        }
    }
}

impl Validate for LikelihoodOptions {
    fn validate<F: FnOnce(String) -> MomiError>(&self, err: F) -> Result<(), MomiError> {
        if !self.mutation_rate.is_finite() || self.mutation_rate <= 0.0 {
            Err(err(format!(
                "mutation rate must be finite and > 0, got {}",
                self.mutation_rate
            )))
        } else {
            Ok(())
        }
    }
}

impl LikelihoodOptions {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MomiError> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate(MomiError::ConfigurationError)?;
        Ok(options)
    }
}

/// Settings of [`simulate_with`](crate::simulate_with).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationOptions {
    /// Number of independent loci.
    #[serde(default = "default_num_replicates")]
    pub num_replicates: usize,
    /// Mutation rate per locus, in the time units of the demography.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            num_replicates: default_num_replicates(),
            mutation_rate: default_mutation_rate(),
            seed: 0,
        }
    }
}

impl Validate for SimulationOptions {
    fn validate<F: FnOnce(String) -> MomiError>(&self, err: F) -> Result<(), MomiError> {
        if !self.mutation_rate.is_finite() || self.mutation_rate < 0.0 {
            Err(err(format!(
                "mutation rate must be finite and >= 0, got {}",
                self.mutation_rate
            )))
        } else {
            Ok(())
        }
    }
}

impl SimulationOptions {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MomiError> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate(MomiError::ConfigurationError)?;
        Ok(options)
    }
}
