use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable failure modes surfaced across the crate. Invariant
/// violations that indicate a bug rather than bad input (corrupt map
/// cross-references, malformed factor graphs) still panic via `assert!`
/// at the call site, matching the teacher's use of `expect` for
/// "this can't happen" conditions.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IMU sample at t={t} is not finite")]
    InvalidImuSample { t: f64 },

    #[error("non-monotonic timestamp: {prev} -> {next}")]
    NonMonotonicTime { prev: f64, next: f64 },

    #[error("linear solver failed to converge")]
    SolverDiverged,

    #[error("optimizer exceeded max iterations")]
    MaxIterations,

    #[error("map invariant violated: {0}")]
    MapInvariant(&'static str),

    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(&'static str),
}
