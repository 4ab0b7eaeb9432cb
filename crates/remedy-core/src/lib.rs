//! Core types and trait definitions for the Remedy resource exchange.
//!
//! Remedy matches providers offering scarce resources (consumables, devices,
//! personnel) with parties demanding them, ranking and filtering matches by
//! postal-address proximity. Providers stay anonymous behind an opaque
//! capability token issued at offer time.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod address;
pub mod changelog;
pub mod demand;
pub mod error;
pub mod geo;
pub mod geocode;
pub mod identity;
pub mod mail;
pub mod matching;
pub mod notify;
pub mod offer;
pub mod resource;
pub mod service;
pub mod store;
pub mod subscription;
pub mod token;

#[cfg(test)]
mod test_support;

pub use error::{Error, ErrorClass, Result};
