mod batcher;
mod cache;
mod renderer;
mod texture;

pub use batcher::{Material, MaterialGroup, MeshBatcher, Vertex};
pub use cache::AttachmentCacheEntry;
pub use renderer::{Bounds, SkeletonRenderer};
pub use texture::{TextureId, TextureLookup, TextureRegion};

#[cfg(test)]
mod batcher_tests;
