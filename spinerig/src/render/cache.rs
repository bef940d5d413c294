use super::{TextureId, TextureRegion};
use crate::BlendMode;

/// Per-slot, per-attachment render data kept between frames.
///
/// Vertex and UV buffers only grow. UVs are copied from the attachment template once
/// per texture region and reused while the region stays the same.
#[derive(Clone, Debug, Default)]
pub struct AttachmentCacheEntry {
    pub(crate) world_vertices: Vec<f32>,
    pub(crate) uvs: Vec<f32>,
    pub(crate) triangles: Vec<u32>,
    pub(crate) color: [f32; 4],
    pub(crate) dark_color: [f32; 4],
    pub(crate) region: Option<TextureRegion>,
    pub(crate) blend: BlendMode,
    pub(crate) clipped: bool,
    pub(crate) clipped_vertices: Vec<f32>,
    pub(crate) clipped_uvs: Vec<f32>,
    pub(crate) clipped_triangles: Vec<u32>,
    pub(crate) skip_render: bool,
}

impl AttachmentCacheEntry {
    /// World positions as x/y pairs, before clipping.
    pub fn world_vertices(&self) -> &[f32] {
        &self.world_vertices
    }

    /// Page-space UVs as u/v pairs.
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    pub fn triangles(&self) -> &[u32] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.world_vertices.len() / 2
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn dark_color(&self) -> [f32; 4] {
        self.dark_color
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.region.map(|r| r.texture)
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Whether the last pass ran this attachment through an active clip.
    pub fn is_clipped(&self) -> bool {
        self.clipped
    }

    pub fn clipped_vertices(&self) -> &[f32] {
        &self.clipped_vertices
    }

    pub fn clipped_uvs(&self) -> &[f32] {
        &self.clipped_uvs
    }

    pub fn clipped_triangles(&self) -> &[u32] {
        &self.clipped_triangles
    }

    /// Whether the last pass produced no geometry for this attachment.
    pub fn skip_render(&self) -> bool {
        self.skip_render
    }

    /// Geometry that was actually batched: clipped output when clipping, else the full mesh.
    pub fn rendered_geometry(&self) -> (&[f32], &[f32], &[u32]) {
        if self.clipped {
            (&self.clipped_vertices, &self.clipped_uvs, &self.clipped_triangles)
        } else {
            (&self.world_vertices, &self.uvs, &self.triangles)
        }
    }

    /// Points the entry at `region`. Returns true when the UVs must be recopied.
    pub(crate) fn bind_region(&mut self, region: TextureRegion, vertex_count: usize) -> bool {
        let stale = self.region != Some(region) || self.uvs.len() != vertex_count * 2;
        self.region = Some(region);
        stale
    }
}
