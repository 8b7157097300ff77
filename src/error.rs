//! Domain errors shared across services.

use thiserror::Error;

/// Errors a transfer service may report about the request itself, as opposed
/// to transport failures. The pipeline does not synthesize these today; the
/// ingress maps `Exists` to a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The referenced transfer does not exist.
    #[error("transfer not found")]
    TransferNotFound,

    /// A transfer with this request id was already accepted.
    #[error("transfer already exists")]
    TransferExists,
}
