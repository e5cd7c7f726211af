//! Likelihoods of the site frequency spectrum under tree-shaped
//! demographic models.
//!
//! A [`Demography`] is a rooted tree of demes, each with a
//! [`SizeHistory`]. Given the number of derived alleles observed at
//! each sampled deme, [`SumProduct`] computes the expected length of
//! genealogy branches that would produce exactly that pattern, and
//! [`LogLikelihood`] combines those probabilities over an observed
//! [`Sfs`].
//!
//! Everything is generic over [`Scalar`]. Evaluating with [`Dual`]
//! numbers gives exact gradients and Hessian-vector products for
//! likelihood optimization.
//!
//! # Example
//!
//! ```
//! use momi::{ConstantTruncatedSizeHistory, DemographyBuilder, SumProduct};
//!
//! let mut b = DemographyBuilder::<f64>::from_edges(
//!     &[("ab", "a"), ("ab", "b")],
//!     &[("a", 2), ("b", 2)],
//! )
//! .unwrap();
//! for (name, tau) in [("a", 0.25), ("b", 0.25), ("ab", f64::INFINITY)] {
//!     let n = b.n_lineages(name).unwrap();
//!     b.set_history(name, ConstantTruncatedSizeHistory::new(1.0, tau, n).unwrap())
//!         .unwrap();
//! }
//! let mut demo = b.build().unwrap();
//!
//! let mut total = 0.0;
//! for config in momi::configurations(&demo.leaf_lineages()) {
//!     demo.update_derived(&config).unwrap();
//!     total += SumProduct::new(&demo).p(true).unwrap();
//! }
//! assert!((total - 1.0).abs() < 1e-10);
//! ```

mod macros;

mod builder;
mod combinatorics;
mod demography;
mod dual;
mod error;
mod likelihood;
mod options;
mod scalar;
mod sfs;
mod simulate;
mod size_history;
mod sum_product;
mod traits;

pub use builder::DemographyBuilder;
pub use demography::{Demography, LeafState, Node, NodeId};
pub use dual::{gradient, hessian_vector_product, value_and_gradient, Differentiable, Dual};
pub use error::MomiError;
pub use likelihood::{composite_log_likelihood, log_likelihood_prf, DemographyFn, LogLikelihood};
pub use options::{LikelihoodKind, LikelihoodOptions, SimulationOptions};
pub use scalar::{log_sum_exp, Scalar};
pub use sfs::{configurations, is_monomorphic, Sfs, SfsEntry};
pub use simulate::{simulate, simulate_with};
pub use size_history::{ConstantTruncatedSizeHistory, PiecewiseHistory, SizeHistory};
pub use sum_product::{expected_sfs, SumProduct};
