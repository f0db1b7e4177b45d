//! Core types shared by the rotation machine and the propagation pipeline.

mod error;
mod id;
mod secret_string;
mod value_set;

pub use error::ValidationError;
pub use id::{CredentialId, RotationToken};
pub use secret_string::SecretString;
pub use value_set::ValueSet;
