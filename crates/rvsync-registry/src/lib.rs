//! # rvsync-registry
//!
//! Access to the R2R registry (`https://service.rvdata.us/api`).
//!
//! - [`RegistryClient`]: cruise and vocabulary endpoints with timeout and
//!   retry
//! - [`acquire`]: phase-1 concurrent fetch producing
//!   [`rvsync_core::UpstreamData`]

pub mod acquire;
pub mod client;

pub use acquire::acquire;
pub use client::RegistryClient;
