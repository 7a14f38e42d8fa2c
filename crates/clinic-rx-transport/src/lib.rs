//! Wire transport for the clinic-rx REST API.
//!
//! This crate knows how to move JSON requests and responses; it does not know
//! what they mean. Status-code policy (401 teardown, error messages) lives in
//! `clinic-rx-core`.
//!
//! The real HTTP transport is behind the `http` feature. [`MockTransport`]
//! replays scripted responses for tests.

pub mod wire;
pub mod mock;
#[cfg(feature = "http")]
pub mod http;

pub use mock::*;
pub use wire::*;
#[cfg(feature = "http")]
pub use http::*;
