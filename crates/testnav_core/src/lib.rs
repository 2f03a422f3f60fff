//! Provide the shared, pure vocabulary for the testnav navigator.
//!
//! This crate is intentionally small and dependency-free. It holds the values that both the scanner and the
//! key allocator agree on:
//! - the home-row key alphabet and default key lengths, and
//! - the test-authoring conventions (marker ancestors, name prefixes, file naming, excluded directories).
//!
//! ## Notes
//!
//! - This is a “vocabulary” crate: **no IO**, no global state, and no navigator-specific types.

pub mod alphabet;
pub mod lang;

pub use alphabet::{ALPHABET, CLASS_KEY_LEN, FUNCTION_KEY_LEN, is_valid_key};
