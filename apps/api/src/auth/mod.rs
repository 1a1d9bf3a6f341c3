pub mod entitlement;
pub mod middleware;

pub use entitlement::{EntitlementError, EntitlementGate, SessionClaims};
