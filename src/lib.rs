#![doc = include_str!("../README.md")]

pub mod authz;
pub mod catalog;
pub mod error;
pub mod gate;
#[cfg(feature = "http")]
pub mod gateway;
pub mod identity;
#[cfg(feature = "middleware")]
pub mod middleware;
#[cfg(feature = "http")]
pub mod policy;
pub mod profile;
pub mod request_id;
pub mod session;
pub mod types;
pub mod user;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use authz::{
    AuthorizationQuery, DecisionSet, DeniedPair, Effect, PolicyEngine, PolicyError, Principal,
    QueryProfile, Resource, ResourceAction, ResourceDecision, build_query,
};
pub use catalog::{ResourceCatalog, StaticCatalog};
pub use error::Error;
pub use gate::{GateError, Granted, Landing, LinkSent, PolicyFailureMode, RequestGate, Stage};
#[cfg(feature = "http")]
pub use gateway::{GatewayConfig, HttpIdentityGateway};
pub use identity::{AuthenticatedSession, IdentityGateway, LinkRequested};
#[cfg(feature = "http")]
pub use policy::{HttpPolicyEngine, PolicyConfig};
pub use profile::push_role;
pub use request_id::generate_request_id;
pub use session::{MemorySession, SessionStore};
pub use types::{SessionToken, UserId};
pub use user::{TrustedMetadata, User};
