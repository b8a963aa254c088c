//! Configuration and policy
//!
//! Probe limits, their validation, and the crate error type.

pub mod types;
pub mod validator;
