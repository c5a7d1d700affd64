//! Common library for the Sereno application
//!
//! This crate provides the pieces shared between the client library and the
//! backend services: the closed authentication error taxonomy, the session
//! model and its validity rules, and PostgreSQL connectivity.

pub mod database;
pub mod error;
pub mod session;
