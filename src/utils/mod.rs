//! # Utilities Module
//!
//! ## Role
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `workspace`: Pre-allocated buffers for zero-allocation codec paths

pub mod workspace;

pub use workspace::CodecWorkspace;
