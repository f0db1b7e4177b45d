#![forbid(unsafe_code)]

//! # Keyrelay Credential
//!
//! Staged credential rotation against a pluggable secret store.
//!
//! A rotation produces a new credential version without disrupting holders of
//! the old one. The protocol is four sequential steps, each idempotent or
//! resumable under a caller-supplied rotation token:
//!
//! 1. **create pending** — generate a candidate value-set and stage it under
//!    the `pending` label (reused if the same token already staged one);
//! 2. **set pending** — register the candidate as a secondary valid
//!    credential with the authenticating system;
//! 3. **test pending** — probe the candidate with a non-destructive call;
//! 4. **promote** — atomically relabel `pending` → `current` and `current` →
//!    `previous`.
//!
//! Invalidation of the superseded `previous` version is deliberately *not*
//! part of this crate: it belongs to the grace-period deletion workflow,
//! which waits out a configured window first.

/// Core identifier, secret, and value-set types.
pub mod core;
/// Retry policy with jittered exponential backoff.
pub mod retry;
/// The staged rotation state machine and its collaborator traits.
pub mod rotation;
/// The secret store interface and the in-memory provider.
pub mod store;

pub use crate::core::{CredentialId, RotationToken, SecretString, ValidationError, ValueSet};
pub use crate::retry::{Retryable, RetryPolicy, retry_with_backoff};
pub use crate::rotation::{
    AlphanumericGenerator, BackendError, CredentialBackend, RotationError, RotationMachine,
    RotationOutcome, RotationRequest, RotationResult, RotationStep, SecretGenerator,
};
pub use crate::store::{
    InMemorySecretStore, Promotion, SecretStore, SecretVersion, StoreError, VersionId,
    VersionLabel,
};
