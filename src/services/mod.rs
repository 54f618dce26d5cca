pub mod credential;
pub mod identity_store;
pub mod pipeline;
pub mod provider;

pub use credential::{ApiTokenService, CredentialStore};
pub use identity_store::{IdentityStore, PgIdentityStore};
pub use pipeline::{IdentityPipeline, SocialAuthPipeline};
pub use provider::{ProviderClient, ProviderKind, ProviderRegistry, SocialProfile};
