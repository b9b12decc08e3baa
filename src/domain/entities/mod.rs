//! # Domain Entities
//!
//! - **Session**: connection state, identity and the current pairing artifact
//! - **Credential**: durable per-key authentication records
//!
//! ## Store Traits
//!
//! `CredentialStore` defines the persistence contract. It is implemented in the
//! infrastructure layer, following the dependency inversion principle.

mod credential;
mod session;

pub use credential::{CredentialRecord, CredentialStore, StoreError};
#[cfg(test)]
pub use credential::MockCredentialStore;
pub use session::{ConnectionState, Identity, PairingArtifact, SessionStatus};
