use std::collections::HashMap;
use std::mem;

use super::{AttachmentCacheEntry, MeshBatcher, TextureId, TextureLookup, TextureRegion};
use crate::clipping::SkeletonClipper;
use crate::{
    AttachmentData, BlendMode, Error, MissingTexture, RendererConfig, Skeleton,
};

const QUAD_TRIANGLES: [u32; 6] = [0, 1, 2, 2, 3, 0];
const NO_DARK_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// World-space axis-aligned box around everything batched in the last pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    fn include(bounds: &mut Option<Bounds>, positions: &[f32]) {
        for p in positions.chunks_exact(2) {
            let b = bounds.get_or_insert(Bounds {
                min_x: p[0],
                min_y: p[1],
                max_x: p[0],
                max_y: p[1],
            });
            b.min_x = b.min_x.min(p[0]);
            b.min_y = b.min_y.min(p[1]);
            b.max_x = b.max_x.max(p[0]);
            b.max_y = b.max_y.max(p[1]);
        }
    }
}

/// Turns a posed [`Skeleton`] into draw batches, one pass per frame.
///
/// Owns the clipper, the batch pool and the attachment render cache of one skeleton
/// instance. Buffers are reused across frames.
#[derive(Debug)]
pub struct SkeletonRenderer {
    config: RendererConfig,
    clipper: SkeletonClipper,
    sink: BatchSink,
    cache: Vec<HashMap<String, AttachmentCacheEntry>>,
    clip_polygon: Vec<f32>,
    textures_dirty: bool,
    disposed: bool,
}

impl SkeletonRenderer {
    pub fn new(config: RendererConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            clipper: SkeletonClipper::new(),
            sink: BatchSink::default(),
            cache: Vec::new(),
            clip_polygon: Vec::new(),
            textures_dirty: false,
            disposed: false,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Walks the draw order once and rebuilds every batch.
    ///
    /// Batches are returned in draw order. A texture miss fails the pass unless the
    /// config says to skip it; the batches of a failed pass are incomplete.
    pub fn update_geometry<T: TextureLookup + ?Sized>(
        &mut self,
        skeleton: &Skeleton,
        textures: &T,
    ) -> Result<&[MeshBatcher], Error> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if self.cache.len() < skeleton.slots.len() {
            self.cache.resize_with(skeleton.slots.len(), HashMap::new);
        }

        self.sink.reset(&self.config);
        let result = self.draw_slots(skeleton, textures);
        self.clipper.clip_end();
        self.sink.finish();
        result?;
        Ok(self.sink.batches())
    }

    fn draw_slots<T: TextureLookup + ?Sized>(
        &mut self,
        skeleton: &Skeleton,
        textures: &T,
    ) -> Result<(), Error> {
        let Self {
            config,
            clipper,
            sink,
            cache,
            clip_polygon,
            textures_dirty,
            ..
        } = self;

        let mut z = 0.0;
        for &slot_index in skeleton.draw_order() {
            let Some(slot) = skeleton.slots.get(slot_index) else {
                continue;
            };
            let bone_active = skeleton.bones.get(slot.bone).is_some_and(|b| b.active);
            if !bone_active {
                clipper.clip_end_with_slot(slot_index);
                continue;
            }
            let Some(attachment) = skeleton.slot_attachment(slot_index) else {
                clipper.clip_end_with_slot(slot_index);
                continue;
            };

            let (path, attachment_color) = match attachment {
                AttachmentData::Clipping(clip) => {
                    skeleton.attachment_world_vertices(slot_index, &clip.vertices, clip_polygon);
                    clipper.clip_start(slot_index, clip_polygon, clip.end_slot);
                    continue;
                }
                AttachmentData::Path(_) => {
                    clipper.clip_end_with_slot(slot_index);
                    continue;
                }
                AttachmentData::Region(region) => (region.path.as_str(), region.color),
                AttachmentData::Mesh(mesh) => (mesh.path.as_str(), mesh.color),
            };
            if slot.color[3] <= 0.0 || attachment_color[3] <= 0.0 {
                clipper.clip_end_with_slot(slot_index);
                continue;
            }

            let path = if path.is_empty() { attachment.name() } else { path };
            let Some(region) = textures.region(path) else {
                match config.missing_texture {
                    MissingTexture::Error => {
                        return Err(Error::UnknownTexture {
                            path: path.to_string(),
                        });
                    }
                    MissingTexture::Skip => {
                        log::warn!("no texture region for '{path}', skipping slot {slot_index}");
                        clipper.clip_end_with_slot(slot_index);
                        continue;
                    }
                }
            };

            let slot_cache = &mut cache[slot_index];
            if !slot_cache.contains_key(attachment.name()) {
                slot_cache.insert(attachment.name().to_string(), AttachmentCacheEntry::default());
            }
            let Some(entry) = slot_cache.get_mut(attachment.name()) else {
                continue;
            };

            let previous_texture = entry.texture();
            fill_entry(entry, skeleton, slot_index, attachment, region);
            if previous_texture != Some(region.texture) {
                *textures_dirty = true;
            }

            let light = multiply_rgba(multiply_rgba(skeleton.color, slot.color), attachment_color);
            entry.color = apply_pma(light, config.premultiplied_alpha);
            entry.dark_color = if config.two_color_tint {
                dark_color_rgba(slot.dark_color, config.premultiplied_alpha, light[3])
            } else {
                NO_DARK_COLOR
            };
            entry.blend = slot.blend;
            entry.clipped = false;
            entry.skip_render = false;

            if entry.uvs.len() != entry.world_vertices.len() {
                log::debug!(
                    "attachment '{}' has {} uv floats for {} vertex floats, skipping",
                    attachment.name(),
                    entry.uvs.len(),
                    entry.world_vertices.len()
                );
                entry.skip_render = true;
                clipper.clip_end_with_slot(slot_index);
                continue;
            }

            if clipper.is_clipping() {
                entry.clipped = true;
                let survived =
                    clipper.clip_triangles(&entry.world_vertices, &entry.triangles, &entry.uvs, 2);
                entry.clipped_vertices.clear();
                entry.clipped_vertices.extend_from_slice(clipper.clipped_vertices());
                entry.clipped_uvs.clear();
                entry.clipped_uvs.extend_from_slice(clipper.clipped_uvs());
                entry.clipped_triangles.clear();
                entry.clipped_triangles.extend_from_slice(clipper.clipped_triangles());
                if !survived {
                    entry.skip_render = true;
                    clipper.clip_end_with_slot(slot_index);
                    continue;
                }
            }

            let (positions, uvs, triangles) = entry.rendered_geometry();
            sink.emit(
                config,
                Geometry {
                    positions,
                    uvs,
                    indices: triangles,
                },
                Style {
                    color: entry.color,
                    dark_color: entry.dark_color,
                    texture: region.texture,
                    blend: slot.blend,
                    z,
                },
            );
            z += config.z_offset;
            clipper.clip_end_with_slot(slot_index);
        }
        Ok(())
    }

    /// Batches produced by the last [`SkeletonRenderer::update_geometry`] call.
    pub fn batches(&self) -> &[MeshBatcher] {
        self.sink.batches()
    }

    /// Render data cached for `attachment` on `slot`, as of the last pass that drew it.
    pub fn cached_render_data(&self, slot: usize, attachment: &str) -> Option<&AttachmentCacheEntry> {
        self.cache.get(slot)?.get(attachment)
    }

    /// Bounds of the geometry batched by the last pass; `None` when nothing was drawn.
    pub fn bounds(&self) -> Option<Bounds> {
        self.sink.bounds
    }

    /// Set when a cached attachment switched to a different texture since the flag was
    /// last cleared.
    pub fn textures_dirty(&self) -> bool {
        self.textures_dirty
    }

    pub fn clear_textures_dirty(&mut self) {
        self.textures_dirty = false;
    }

    /// Drops every buffer. The renderer refuses further updates.
    pub fn dispose(&mut self) {
        self.sink = BatchSink::default();
        self.cache = Vec::new();
        self.clip_polygon = Vec::new();
        self.clipper = SkeletonClipper::new();
        self.disposed = true;
        log::debug!("skeleton renderer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

fn fill_entry(
    entry: &mut AttachmentCacheEntry,
    skeleton: &Skeleton,
    slot_index: usize,
    attachment: &AttachmentData,
    region: TextureRegion,
) {
    match attachment {
        AttachmentData::Region(quad) => {
            let bone = skeleton
                .slots
                .get(slot_index)
                .and_then(|slot| skeleton.bones.get(slot.bone));
            let mut world = [0.0; 8];
            if let Some(bone) = bone {
                quad.compute_world_vertices(bone, &mut world);
            }
            entry.world_vertices.clear();
            entry.world_vertices.extend_from_slice(&world);
            if entry.bind_region(region, 4) {
                entry.uvs.clear();
                entry.uvs.extend(region.quad_uvs().into_iter().flatten());
            }
            if entry.triangles.as_slice() != QUAD_TRIANGLES {
                entry.triangles.clear();
                entry.triangles.extend_from_slice(&QUAD_TRIANGLES);
            }
        }
        AttachmentData::Mesh(mesh) => {
            skeleton.attachment_world_vertices(slot_index, &mesh.vertices, &mut entry.world_vertices);
            if entry.bind_region(region, mesh.uvs.len()) {
                entry.uvs.clear();
                entry.uvs.extend(mesh.uvs.iter().flat_map(|&uv| region.map_uv(uv)));
            }
            if entry.triangles != mesh.triangles {
                entry.triangles.clear();
                entry.triangles.extend_from_slice(&mesh.triangles);
            }
        }
        AttachmentData::Clipping(_) | AttachmentData::Path(_) => {}
    }
}

fn multiply_rgba(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]]
}

fn apply_pma(mut color: [f32; 4], premultiplied_alpha: bool) -> [f32; 4] {
    if premultiplied_alpha {
        let a = color[3];
        color[0] *= a;
        color[1] *= a;
        color[2] *= a;
    }
    color
}

fn dark_color_rgba(dark: Option<[f32; 3]>, premultiplied_alpha: bool, light_alpha: f32) -> [f32; 4] {
    match dark {
        None => NO_DARK_COLOR,
        Some([r, g, b]) if premultiplied_alpha => {
            [r * light_alpha, g * light_alpha, b * light_alpha, 1.0]
        }
        Some([r, g, b]) => [r, g, b, 0.0],
    }
}

struct Geometry<'a> {
    positions: &'a [f32],
    uvs: &'a [f32],
    indices: &'a [u32],
}

#[derive(Copy, Clone)]
struct Style {
    color: [f32; 4],
    dark_color: [f32; 4],
    texture: TextureId,
    blend: BlendMode,
    z: f32,
}

/// The batch pool and the write cursor into it.
#[derive(Debug, Default)]
struct BatchSink {
    batches: Vec<MeshBatcher>,
    active: usize,
    bounds: Option<Bounds>,
    split_positions: Vec<f32>,
    split_uvs: Vec<f32>,
    split_indices: Vec<u32>,
    remap: Vec<u32>,
}

impl BatchSink {
    fn reset(&mut self, config: &RendererConfig) {
        for batch in &mut self.batches {
            batch.clear();
        }
        self.active = 0;
        self.bounds = None;
        self.next_batch(config);
    }

    fn next_batch(&mut self, config: &RendererConfig) {
        if let Some(batch) = self.active.checked_sub(1).and_then(|i| self.batches.get_mut(i)) {
            batch.end();
        }
        if self.active == self.batches.len() {
            self.batches.push(MeshBatcher::new(config));
        }
        self.batches[self.active].begin();
        self.active += 1;
    }

    fn finish(&mut self) {
        if let Some(batch) = self.active.checked_sub(1).and_then(|i| self.batches.get_mut(i)) {
            batch.end();
        }
    }

    fn batches(&self) -> &[MeshBatcher] {
        &self.batches[..self.active.min(self.batches.len())]
    }

    fn current(&mut self) -> &mut MeshBatcher {
        &mut self.batches[self.active - 1]
    }

    fn emit(&mut self, config: &RendererConfig, geometry: Geometry<'_>, style: Style) {
        Bounds::include(&mut self.bounds, geometry.positions);

        let vertex_count = geometry.positions.len() / 2;
        if vertex_count <= config.max_vertices && geometry.indices.len() <= config.max_indices() {
            self.emit_piece(config, geometry, style);
            return;
        }

        log::warn!(
            "slot geometry of {vertex_count} vertices and {} indices exceeds batch capacity, splitting",
            geometry.indices.len()
        );
        self.emit_split(config, geometry, style);
    }

    fn emit_piece(&mut self, config: &RendererConfig, geometry: Geometry<'_>, style: Style) {
        let vertex_count = geometry.positions.len() / 2;
        if !self.current().can_batch(vertex_count, geometry.indices.len()) {
            self.next_batch(config);
        }
        let material = match self.current().find_material_group(style.texture, style.blend) {
            Some(material) => material,
            None => {
                self.next_batch(config);
                match self.current().find_material_group(style.texture, style.blend) {
                    Some(material) => material,
                    None => return,
                }
            }
        };
        self.current().batch(
            geometry.positions,
            geometry.uvs,
            style.color,
            style.dark_color,
            geometry.indices,
            material,
            style.z,
        );
    }

    /// Cuts oversized geometry into batch-sized runs of whole triangles.
    fn emit_split(&mut self, config: &RendererConfig, geometry: Geometry<'_>, style: Style) {
        let mut positions = mem::take(&mut self.split_positions);
        let mut uvs = mem::take(&mut self.split_uvs);
        let mut indices = mem::take(&mut self.split_indices);
        let mut remap = mem::take(&mut self.remap);
        positions.clear();
        uvs.clear();
        indices.clear();

        let vertex_count = geometry.positions.len() / 2;
        remap.clear();
        remap.resize(vertex_count, u32::MAX);

        for triangle in geometry.indices.chunks_exact(3) {
            if triangle.iter().any(|&i| i as usize >= vertex_count) {
                continue;
            }
            let fresh = triangle.iter().filter(|&&i| remap[i as usize] == u32::MAX).count();
            if positions.len() / 2 + fresh > config.max_vertices
                || indices.len() + 3 > config.max_indices()
            {
                self.emit_piece(
                    config,
                    Geometry {
                        positions: &positions,
                        uvs: &uvs,
                        indices: &indices,
                    },
                    style,
                );
                positions.clear();
                uvs.clear();
                indices.clear();
                remap.fill(u32::MAX);
            }
            for &i in triangle {
                let i = i as usize;
                if remap[i] == u32::MAX {
                    remap[i] = (positions.len() / 2) as u32;
                    positions.extend_from_slice(&geometry.positions[i * 2..i * 2 + 2]);
                    uvs.extend_from_slice(&geometry.uvs[i * 2..i * 2 + 2]);
                }
                indices.push(remap[i]);
            }
        }
        if !indices.is_empty() {
            self.emit_piece(
                config,
                Geometry {
                    positions: &positions,
                    uvs: &uvs,
                    indices: &indices,
                },
                style,
            );
        }

        self.split_positions = positions;
        self.split_uvs = uvs;
        self.split_indices = indices;
        self.remap = remap;
    }
}
