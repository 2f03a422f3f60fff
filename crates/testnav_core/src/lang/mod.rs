//! Test-authoring vocabulary.
//!
//! Callers work with stable ids (e.g. [`markers::MarkerId`]) and look up spellings via the registry tables
//! instead of scattering string comparisons through the scanner.
//!
//! ## Notes
//! - Registries are pure: no source types, no IO.
//! - Recognition rules (indentation, headers) live in the scanner; this module only names things.

pub mod conventions;
pub mod markers;
