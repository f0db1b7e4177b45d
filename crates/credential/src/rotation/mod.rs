//! The staged rotation state machine.

mod backend;
mod error;
mod machine;
mod step;

pub use backend::{AlphanumericGenerator, BackendError, CredentialBackend, SecretGenerator};
pub use error::{RotationError, RotationResult};
pub use machine::{RotationMachine, RotationOutcome, RotationRequest};
pub use step::RotationStep;
