//! Client-side credential and session library for the Sereno application
//!
//! This crate holds everything the app shell needs to run the human-facing
//! registration and sign-in flow: the token store, the derived password
//! policy, the identity gateway abstraction (with an HTTP implementation
//! against the identity service), and the step-driven flow state machine
//! with its async controller.

pub mod controller;
pub mod flow;
pub mod gateway;
pub mod policy;
pub mod store;

pub use controller::FlowController;
pub use flow::{AuthFlow, FlowEvent, Step};
pub use gateway::IdentityGateway;
pub use store::TokenStore;
