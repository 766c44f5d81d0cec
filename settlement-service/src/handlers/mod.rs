pub mod admin;
pub mod health;
pub mod payments;
pub mod proofs;
pub mod recurring;
pub mod wallet;

pub use health::{health_check, metrics_endpoint, readiness_check};
