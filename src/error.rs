use thiserror::Error;

/// Error type for this crate.
///
/// The variants separate failures that the caller must fix
/// (a malformed model or a malformed observation) from failures
/// that are driven by parameter values and that an optimizer
/// should treat as a rejected step.
///
/// # Example
///
/// A leaf cannot be given more derived alleles than it has lineages.
///
/// ```
/// use momi::{ConstantTruncatedSizeHistory, DemographyBuilder, LeafState, MomiError};
///
/// let mut builder = DemographyBuilder::<f64>::new();
/// builder.add_leaf("a", 3).unwrap();
/// builder
///     .set_history("a", ConstantTruncatedSizeHistory::new(1.0, f64::INFINITY, 3).unwrap())
///     .unwrap();
/// let mut demo = builder.build().unwrap();
/// let result = demo.update_state([("a", LeafState::new(0, 4))]);
/// assert!(matches!(result, Err(MomiError::InvalidStateError(_))));
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MomiError {
    /// Malformed topology or lineage assignment.
    #[error("{0:?}")]
    ConfigurationError(String),
    /// Leaf observations inconsistent with lineage counts.
    #[error("{0:?}")]
    InvalidStateError(String),
    /// Parameter values that make the model singular,
    /// such as a zero total branch length.
    #[error("{0:?}")]
    DegenerateModelError(String),
    /// Errors related to site frequency spectra.
    #[error("{0:?}")]
    SfsError(String),
    #[error(transparent)]
    /// Errors coming from `serde_yaml`.
    YamlError(#[from] serde_yaml::Error),
    #[cfg(feature = "json")]
    #[cfg_attr(doc_cfg, doc(cfg(feature = "json")))]
    #[error(transparent)]
    /// Errors coming from `serde_json`.
    JsonError(#[from] serde_json::Error),
}

impl MomiError {
    /// `true` if the error is caused by parameter values rather
    /// than by the structure of the model or the data.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateModelError(_))
    }
}
