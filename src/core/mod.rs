//! Core traits and their implementations for the vector and matrix types used in the crate.

pub mod traits;
pub mod wrappers;

pub use traits::*;
