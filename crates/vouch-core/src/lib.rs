//! Core types and trait definitions for the vouch reference engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the data model, the pure validation/signing/aggregation logic, and the
//! traits that storage backends and notification transports implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod error;
pub mod notify;
pub mod reference;
pub mod request;
pub mod rubric;
pub mod signature;
pub mod store;
pub mod submission;
pub mod token;

pub use error::{Error, Result};
