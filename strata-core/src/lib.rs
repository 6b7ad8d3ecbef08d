//! Shared primitives and capability traits for the Strata HMM crates.
//!
//! `strata-core` provides the foundation that the other Strata crates build on:
//!
//! - **Error types** — [`StrataError`] and [`Result`] for structured error handling
//! - **Traits** — The contracts the estimation engine consumes: [`Observation`],
//!   [`Centroid`], [`Opdf`], [`OpdfFactory`], plus [`Summarizable`]

pub mod error;
pub mod traits;

pub use error::{StrataError, Result};
pub use traits::*;
