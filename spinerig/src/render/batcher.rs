use super::TextureId;
use crate::{BlendMode, RendererConfig};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 2],
    /// Depth of the slot the vertex was emitted for.
    pub z: f32,
    pub uv: [f32; 2],
    pub color: [f32; 4],
    /// Tint-black color. `(0, 0, 0, 1)` leaves the light color unchanged.
    pub dark_color: [f32; 4],
}

/// A texture and blend pair bound to one material slot of a batch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Material {
    pub texture: TextureId,
    pub blend: BlendMode,
}

/// A contiguous index range drawn with one material slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MaterialGroup {
    pub start: usize,
    pub count: usize,
    pub material: usize,
}

/// One draw batch: a bounded vertex/index buffer plus its material groups.
///
/// Buffers keep their allocation across [`MeshBatcher::begin`] and
/// [`MeshBatcher::clear`].
#[derive(Clone, Debug)]
pub struct MeshBatcher {
    max_vertices: usize,
    max_indices: usize,
    max_materials: usize,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    groups: Vec<MaterialGroup>,
    materials: Vec<Option<Material>>,
}

impl MeshBatcher {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            max_vertices: config.max_vertices,
            max_indices: config.max_indices(),
            max_materials: config.max_materials.max(1),
            vertices: Vec::new(),
            indices: Vec::new(),
            groups: Vec::new(),
            materials: Vec::new(),
        }
    }

    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    pub fn max_indices(&self) -> usize {
        self.max_indices
    }

    /// Resets the write cursors. Material bindings are kept.
    pub fn begin(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.groups.clear();
    }

    /// Whether `vertex_count` more vertices and `index_count` more indices still fit.
    pub fn can_batch(&self, vertex_count: usize, index_count: usize) -> bool {
        if self.vertices.len() + vertex_count > self.max_vertices {
            return false;
        }
        if self.indices.len() + index_count > self.max_indices {
            return false;
        }
        true
    }

    /// Returns the material slot to draw `texture` with `blend`: an unbound slot, a slot
    /// already bound to the same pair, or a newly allocated one. `None` when every slot
    /// is taken by other pairs.
    pub fn find_material_group(&mut self, texture: TextureId, blend: BlendMode) -> Option<usize> {
        let wanted = Material { texture, blend };
        for (i, slot) in self.materials.iter_mut().enumerate() {
            match slot {
                None => {
                    *slot = Some(wanted);
                    return Some(i);
                }
                Some(bound) if *bound == wanted => return Some(i),
                Some(_) => {}
            }
        }
        if self.materials.len() < self.max_materials {
            self.materials.push(Some(wanted));
            return Some(self.materials.len() - 1);
        }
        None
    }

    /// Appends geometry drawn with material slot `material`.
    ///
    /// `positions` and `uvs` are x/y pairs; `indices` are relative to this call's first
    /// vertex and are rebased onto the batch. Every vertex gets depth `z`.
    #[allow(clippy::too_many_arguments)]
    pub fn batch(
        &mut self,
        positions: &[f32],
        uvs: &[f32],
        color: [f32; 4],
        dark_color: [f32; 4],
        indices: &[u32],
        material: usize,
        z: f32,
    ) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(
            positions
                .chunks_exact(2)
                .zip(uvs.chunks_exact(2))
                .map(|(p, uv)| Vertex {
                    position: [p[0], p[1]],
                    z,
                    uv: [uv[0], uv[1]],
                    color,
                    dark_color,
                }),
        );

        let start = self.indices.len();
        self.indices.extend(indices.iter().map(|&i| base + i));

        match self.groups.last_mut() {
            Some(group) if group.material == material && group.start + group.count == start => {
                group.count += indices.len();
            }
            _ => self.groups.push(MaterialGroup {
                start,
                count: indices.len(),
                material,
            }),
        }
    }

    /// Finalizes the batch for upload.
    pub fn end(&mut self) {
        self.groups.retain(|g| g.count > 0);
        log::trace!(
            "batch flushed: {} vertices, {} indices, {} material groups",
            self.vertices.len(),
            self.indices.len(),
            self.groups.len()
        );
    }

    /// Empties the batch and unbinds every material slot.
    pub fn clear(&mut self) {
        self.begin();
        for slot in &mut self.materials {
            *slot = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Index ranges in first-use order.
    pub fn groups(&self) -> &[MaterialGroup] {
        &self.groups
    }

    pub fn material(&self, slot: usize) -> Option<Material> {
        self.materials.get(slot).copied().flatten()
    }

    pub fn materials(&self) -> &[Option<Material>] {
        &self.materials
    }
}
