//! Error types for the placement engine.

use berth_pool::HostId;
use thiserror::Error;

/// Result type alias using [`PlacerError`].
pub type PlacerResult<T> = Result<T, PlacerError>;

/// Fatal placement errors surfaced to the caller.
///
/// Everything that can go wrong inside one attempt is transient and
/// handled by the retry loop; the only fatal condition is running out
/// of attempts.
#[derive(Debug, Error)]
pub enum PlacerError {
    /// Retry budget exhausted.
    #[error("could not place workload after {attempts} attempts (last: {last})")]
    Exhausted {
        /// Attempts made before giving up.
        attempts: u32,
        /// Why the final attempt failed.
        last: RetryReason,
    },
}

/// Why an attempt failed transiently and the engine is retrying from a
/// fresh pool enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryReason {
    /// A freshly started host's runtime never became reachable.
    #[error("runtime on {host} unreachable after start")]
    RuntimeNotUp {
        /// Host that was started.
        host: HostId,
    },

    /// No running host had room and nothing was startable; the engine
    /// backed off before signalling this.
    #[error("no capacity available in the pool")]
    NoCapacity,

    /// The launch itself failed; another engine may have taken the
    /// slot first, so this never condemns the host.
    #[error("launch on {host} failed: {reason}")]
    LaunchFailed {
        /// Host the launch targeted.
        host: HostId,
        /// Runtime-reported failure.
        reason: String,
    },

    /// Reconciliation found this attempt's workload surplus and
    /// stopped it.
    #[error("lost placement race on {host}, workload evicted")]
    Evicted {
        /// Over-capacity host.
        host: HostId,
    },

    /// The pool provider failed; treated as transient on the principle
    /// that a spurious infrastructure error should not abort the
    /// caller's request when another attempt might succeed.
    #[error("pool provider error: {0}")]
    Pool(String),

    /// A runtime call outside the launch itself failed mid-attempt.
    #[error("runtime error on {host}: {reason}")]
    Runtime {
        /// Host whose runtime failed.
        host: HostId,
        /// Underlying failure.
        reason: String,
    },
}
