//! Composite likelihoods of an observed SFS.

use crate::demography::Demography;
use crate::dual::Differentiable;
use crate::error::MomiError;
use crate::options::{LikelihoodKind, LikelihoodOptions};
use crate::scalar::Scalar;
use crate::sfs::{check_config, is_monomorphic, Sfs};
use crate::sum_product::SumProduct;
use crate::traits::Validate;

// Entries that carry information: polymorphic, with a positive count.
fn informative_entries<'s, T>(
    demo: &Demography<T>,
    sfs: &'s Sfs,
) -> Result<Vec<(&'s [usize], f64)>, MomiError> {
    let n_lineages = demo.leaf_lineages();
    let mut entries = vec![];
    for (config, &count) in sfs {
        check_config(config, &n_lineages)?;
        if is_monomorphic(config, &n_lineages) {
            log::debug!("skipping monomorphic configuration {config:?}");
        } else if count > 0.0 {
            entries.push((config.as_slice(), count));
        }
    }
    Ok(entries)
}

/// Poisson random field log-likelihood of `sfs`:
/// `Σ_x c_x ln(θ p(x)) − θ Σ_x p(x)`, with unnormalized `p`,
/// up to terms that do not depend on the demography.
///
/// The leaf states of `demo` are overwritten.
///
/// # Errors
///
/// * [`MomiError::DegenerateModelError`] if the mutation rate is not
///   finite and positive or the total SFS sum is degenerate.
/// * [`MomiError::SfsError`] if a configuration does not fit the leaves.
pub fn log_likelihood_prf<T: Scalar>(
    demo: &mut Demography<T>,
    mutation_rate: T,
    sfs: &Sfs,
) -> Result<T, MomiError> {
    if !(mutation_rate.is_finite() && mutation_rate.value() > 0.0) {
        return Err(MomiError::DegenerateModelError(format!(
            "mutation rate must be finite and > 0, got {}",
            mutation_rate.value()
        )));
    }
    let entries = informative_entries(demo, sfs)?;
    let total = demo.total_sfs_sum()?;
    let log_rate = mutation_rate.ln();
    let mut ll = -(mutation_rate * total);
    for (config, count) in entries {
        demo.update_derived(config)?;
        let log_p = SumProduct::new(demo).log_p(false)?;
        ll += (log_rate.clone() + log_p) * count;
    }
    Ok(ll)
}

/// Multinomial composite log-likelihood `Σ_x c_x ln p(x)`, with `p`
/// normalized over polymorphic configurations.
///
/// The leaf states of `demo` are overwritten.
pub fn composite_log_likelihood<T: Scalar>(
    demo: &mut Demography<T>,
    sfs: &Sfs,
) -> Result<T, MomiError> {
    let entries = informative_entries(demo, sfs)?;
    let log_total = demo.total_sfs_sum()?.ln();
    let mut ll = T::zero();
    for (config, count) in entries {
        demo.update_derived(config)?;
        let log_p = SumProduct::new(demo).log_p(false)?;
        ll += (log_p - log_total.clone()) * count;
    }
    Ok(ll)
}

/// Builds a [`Demography`] from a parameter vector.
///
/// Implementations are generic over the number type so that the
/// same model serves plain evaluation and differentiation.
pub trait DemographyFn {
    fn demography<T: Scalar>(&self, params: &[T]) -> Result<Demography<T>, MomiError>;
}

/// The likelihood of observed data as a function of model parameters.
///
/// The data are one SFS per independent locus; they are summed
/// on construction.
///
/// [`Differentiable::evaluate`] returns the negative log-likelihood,
/// which is what [`LogLikelihood::objective`] and its derivatives
/// report, ready for a minimizer.
#[derive(Clone, Debug)]
pub struct LogLikelihood<M> {
    model: M,
    data: Sfs,
    num_loci: usize,
    options: LikelihoodOptions,
}

impl<M: DemographyFn> LogLikelihood<M> {
    /// # Errors
    ///
    /// * [`MomiError::ConfigurationError`] if there are no loci or the
    ///   options are invalid.
    /// * [`MomiError::SfsError`] if the loci disagree on the number of leaves.
    pub fn new(model: M, loci: &[Sfs], options: LikelihoodOptions) -> Result<Self, MomiError> {
        if loci.is_empty() {
            return Err(MomiError::ConfigurationError(
                "at least one locus is required".to_string(),
            ));
        }
        options.validate(MomiError::ConfigurationError)?;
        let data = Sfs::aggregate(loci)?;
        log::debug!(
            "{} loci with {} distinct configurations and {} sites",
            loci.len(),
            data.len(),
            data.total()
        );
        Ok(Self {
            model,
            data,
            num_loci: loci.len(),
            options,
        })
    }

    /// The summed data.
    pub fn data(&self) -> &Sfs {
        &self.data
    }

    pub fn num_loci(&self) -> usize {
        self.num_loci
    }

    pub fn options(&self) -> &LikelihoodOptions {
        &self.options
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn log_likelihood<T: Scalar>(&self, params: &[T]) -> Result<T, MomiError> {
        let mut demo = self.model.demography(params)?;
        match self.options.kind {
            LikelihoodKind::PoissonRandomField => {
                let rate = T::constant(self.options.mutation_rate * self.num_loci as f64);
                log_likelihood_prf(&mut demo, rate, &self.data)
            }
            LikelihoodKind::Multinomial => composite_log_likelihood(&mut demo, &self.data),
        }
    }

    /// Negative log-likelihood at `params`.
    pub fn objective(&self, params: &[f64]) -> Result<f64, MomiError> {
        self.evaluate(params)
    }

    /// Gradient of [`LogLikelihood::objective`].
    pub fn gradient(&self, params: &[f64]) -> Result<Vec<f64>, MomiError> {
        crate::dual::gradient(self, params)
    }

    /// Hessian of [`LogLikelihood::objective`] applied to `direction`.
    pub fn hessian_vector_product(
        &self,
        params: &[f64],
        direction: &[f64],
    ) -> Result<Vec<f64>, MomiError> {
        crate::dual::hessian_vector_product(self, params, direction)
    }
}

impl<M: DemographyFn> Differentiable for LogLikelihood<M> {
    fn evaluate<T: Scalar>(&self, x: &[T]) -> Result<T, MomiError> {
        Ok(-self.log_likelihood(x)?)
    }
}
