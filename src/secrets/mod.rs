//! Secret providers and the secrets broker.

mod broker;
mod provider;

pub use broker::{ProviderHealth, SecretFailure, SecretFetch, SecretRotation, SecretValue, SecretsBroker};
pub use provider::{default_secret_registry, SecretProvider, SecretRegistry, StubSecretProvider};
