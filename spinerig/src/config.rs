use crate::Error;

/// Largest vertex count a single batch may hold (fits 16-bit index ranges per batch).
pub const MAX_BATCH_VERTICES: usize = 10920;

/// What the renderer does when an attachment's texture path has no region.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MissingTexture {
    /// Fail the geometry update with [`Error::UnknownTexture`].
    #[default]
    Error,
    /// Log a warning and leave the attachment out.
    Skip,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RendererConfig {
    /// Vertex capacity of each batch.
    pub max_vertices: usize,
    /// Distinct texture/blend pairs a batch may reference.
    pub max_materials: usize,
    pub two_color_tint: bool,
    pub premultiplied_alpha: bool,
    pub missing_texture: MissingTexture,
    /// Depth added to `Vertex::z` after each slot that produced geometry, so draw order
    /// survives depth testing. `0.0` keeps every vertex at `z = 0`.
    pub z_offset: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_vertices: MAX_BATCH_VERTICES,
            max_materials: 1,
            two_color_tint: true,
            premultiplied_alpha: false,
            missing_texture: MissingTexture::Error,
            z_offset: 0.0,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(3..=MAX_BATCH_VERTICES).contains(&self.max_vertices) {
            return Err(Error::invalid(format!(
                "max_vertices must be within 3..={MAX_BATCH_VERTICES}, got {}",
                self.max_vertices
            )));
        }
        if self.max_materials == 0 {
            return Err(Error::invalid("max_materials must be at least 1"));
        }
        if !self.z_offset.is_finite() {
            return Err(Error::invalid(format!(
                "z_offset must be finite, got {}",
                self.z_offset
            )));
        }
        Ok(())
    }

    /// Index capacity of each batch, derived from the vertex capacity.
    pub fn max_indices(&self) -> usize {
        self.max_vertices * 3
    }
}
