/// Error type.
#[derive(Debug)]
#[non_exhaustive]
pub enum MomiDemesError {
    /// Stores a [`demes::DemesError`].
    DemesError(demes::DemesError),
    /// Stores a [`momi::MomiError`] raised while
    /// building the demography.
    MomiError(momi::MomiError),
    /// The graph uses a feature that a tree of
    /// piecewise-constant demes cannot represent.
    UnsupportedModel(String),
    /// Errors related to sample sizes.
    SampleError(String),
}

impl From<demes::DemesError> for MomiDemesError {
    fn from(value: demes::DemesError) -> Self {
        Self::DemesError(value)
    }
}

impl From<momi::MomiError> for MomiDemesError {
    fn from(value: momi::MomiError) -> Self {
        Self::MomiError(value)
    }
}

impl std::fmt::Display for MomiDemesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MomiDemesError::DemesError(e) => write!(f, "{e:?}"),
            MomiDemesError::MomiError(e) => write!(f, "{e}"),
            MomiDemesError::UnsupportedModel(msg) => write!(f, "unsupported model: {msg}"),
            MomiDemesError::SampleError(msg) => write!(f, "sample error: {msg}"),
        }
    }
}

impl std::error::Error for MomiDemesError {}
