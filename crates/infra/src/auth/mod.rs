//! Auth context backed by the platform keychain
//!
//! The sign-in collaborator writes credentials; this module only reads them.

pub mod keychain;

pub use keychain::{KeychainAuthContext, KeychainError, KeyringStore, RefreshHook, SecretStore};
