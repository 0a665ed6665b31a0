//! Shared fixtures for integration tests

pub mod catalog;
pub mod verifier;

pub use catalog::{CatalogFixture, zip_bytes};
pub use verifier::{FakeVerifier, TRUSTED_SIGNATURE};
