use super::bone::Bone;
use crate::{AttachmentData, AttachmentVertices, RegionAttachmentData, Skeleton};

impl Skeleton {
    /// The attachment currently shown by a slot, resolved against the slot's attachment table.
    pub fn slot_attachment(&self, slot_index: usize) -> Option<&AttachmentData> {
        let name = self.slots.get(slot_index)?.attachment.as_deref()?;
        self.data.attachment(slot_index, name)
    }

    /// Writes the world positions of `vertices` (bound to `slot_index`) into `out` as
    /// interleaved x/y pairs.
    pub fn attachment_world_vertices(
        &self,
        slot_index: usize,
        vertices: &AttachmentVertices,
        out: &mut Vec<f32>,
    ) {
        out.clear();
        let count = vertices.len() * 2;
        compute_world_vertices(self, slot_index, vertices, 0, count, out, 0, 2);
    }
}

/// Transforms the vertex range `start..start + count` (in floats) into `out`, starting at
/// `offset` and advancing `stride` floats per vertex.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compute_world_vertices(
    skeleton: &Skeleton,
    slot_index: usize,
    vertices: &AttachmentVertices,
    start: usize,
    count: usize,
    out: &mut Vec<f32>,
    offset: usize,
    stride: usize,
) {
    let Some(slot) = skeleton.slots.get(slot_index) else {
        return;
    };
    let Some(bone) = skeleton.bones.get(slot.bone) else {
        return;
    };

    let start_vertex = start / 2;
    let vertex_count = count / 2;
    let end = offset + vertex_count * stride;
    if out.len() < end {
        out.resize(end, 0.0);
    }

    match vertices {
        AttachmentVertices::Unweighted(points) => {
            for (i, point) in points.iter().skip(start_vertex).take(vertex_count).enumerate() {
                let [x, y] = bone.local_to_world(point[0], point[1]);
                let w = offset + i * stride;
                out[w] = x;
                out[w + 1] = y;
            }
        }
        AttachmentVertices::Weighted(points) => {
            for (i, weights) in points.iter().skip(start_vertex).take(vertex_count).enumerate() {
                let mut wx = 0.0f32;
                let mut wy = 0.0f32;
                for weight in weights {
                    let Some(b) = skeleton.bones.get(weight.bone) else {
                        continue;
                    };
                    let [x, y] = b.local_to_world(weight.x, weight.y);
                    wx += x * weight.weight;
                    wy += y * weight.weight;
                }
                let w = offset + i * stride;
                out[w] = wx;
                out[w + 1] = wy;
            }
        }
    }
}

impl RegionAttachmentData {
    /// Quad corners in attachment space, ordered BR, BL, UL, UR.
    pub fn local_vertices(&self) -> [f32; 8] {
        let local_x = -self.width * 0.5 * self.scale_x;
        let local_y = -self.height * 0.5 * self.scale_y;
        let local_x2 = self.width * 0.5 * self.scale_x;
        let local_y2 = self.height * 0.5 * self.scale_y;

        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let local_x_cos = local_x * cos + self.x;
        let local_x_sin = local_x * sin;
        let local_y_cos = local_y * cos + self.y;
        let local_y_sin = local_y * sin;
        let local_x2_cos = local_x2 * cos + self.x;
        let local_x2_sin = local_x2 * sin;
        let local_y2_cos = local_y2 * cos + self.y;
        let local_y2_sin = local_y2 * sin;

        [
            local_x2_cos - local_y_sin,
            local_y_cos + local_x2_sin,
            local_x_cos - local_y_sin,
            local_y_cos + local_x_sin,
            local_x_cos - local_y2_sin,
            local_y2_cos + local_x_sin,
            local_x2_cos - local_y2_sin,
            local_y2_cos + local_x2_sin,
        ]
    }

    pub fn compute_world_vertices(&self, bone: &Bone, out: &mut [f32; 8]) {
        let local = self.local_vertices();
        for (dst, src) in out.chunks_exact_mut(2).zip(local.chunks_exact(2)) {
            let [x, y] = bone.local_to_world(src[0], src[1]);
            dst[0] = x;
            dst[1] = y;
        }
    }
}
