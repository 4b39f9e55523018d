//! Shared utilities.
//!
//! Filesystem helpers used by staging and packaging, plus test helpers.

pub mod fs;

#[cfg(test)]
pub mod testutil;
