//! Integration tests for stark-kit.
//!
//! These run the whole lifecycle against a scripted channel; no network or
//! `starknet` binary is needed.
//!
//! Run with: `cargo test --test lifecycle`

mod execution_integration;
mod registry_integration;
mod status_integration;
