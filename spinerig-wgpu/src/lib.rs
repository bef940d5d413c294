//! Uploads and draws [`spinerig::MeshBatcher`] output with wgpu.
//!
//! Each batch becomes a contiguous range of one shared vertex/index buffer pair, and each
//! material group becomes one indexed draw.

mod renderer;

pub use renderer::*;

#[cfg(test)]
mod renderer_tests;
