//! Constraint-ordered world transforms, clipping and mesh batching for Spine skeletons.
//!
//! This crate is renderer-agnostic: it produces [`MeshBatcher`] output that a host uploads.
//! GPU integrations live in separate crates (e.g. `spinerig-wgpu`).

#![forbid(unsafe_code)]

mod clipping;
mod config;
mod error;
mod model;
mod render;
mod runtime;

pub use clipping::*;
pub use config::*;
pub use error::*;
pub use model::*;
pub use render::*;
pub use runtime::*;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod clipping_tests;
