use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required per-subject input is absent. Fatal for that subject only.
    #[error("missing data for {subject}: {path}")]
    DataMissing { subject: String, path: PathBuf },

    /// Too few samples for a statistic. The statistic reports NaN; other
    /// statistics for the same subject still compute.
    #[error("{statistic} needs at least {needed} samples, found {found}")]
    InsufficientSamples {
        statistic: &'static str,
        needed: usize,
        found: usize,
    },

    /// The rhythm fit failed to settle on finite parameters.
    #[error("cosinor fit did not converge within {iterations} iterations")]
    FitNonConvergence { iterations: usize },
}
