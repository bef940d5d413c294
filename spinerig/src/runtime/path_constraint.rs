use super::attachment::compute_world_vertices;
use super::bone::wrap_pi;
use crate::{
    AttachmentData, PathAttachmentData, PathConstraintData, PositionMode, RotateMode, Skeleton,
    SpacingMode,
};
use std::sync::Arc;

const EPSILON: f32 = 1.0e-5;

#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot index.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub active: bool,
    scratch: PathScratch,
}

#[derive(Clone, Debug, Default)]
struct PathScratch {
    spaces: Vec<f32>,
    lengths: Vec<f32>,
    positions: Vec<f32>,
    world: Vec<f32>,
    curves: Vec<f32>,
}

impl PathConstraint {
    pub(crate) fn from_data(data_index: usize, data: &PathConstraintData) -> Self {
        let bone_count = data.bones.len();
        let mut scratch = PathScratch::default();
        scratch.spaces.reserve(bone_count + 1);
        scratch.lengths.reserve(bone_count);
        scratch.positions.reserve((bone_count + 1) * 3 + 2);
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            position: data.position,
            spacing: data.spacing,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            active: true,
            scratch,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &PathConstraintData) {
        self.position = data.position;
        self.spacing = data.spacing;
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
    }
}

impl Skeleton {
    /// Places and orients the constrained bones along the target slot's path attachment.
    /// Writes world matrices directly.
    pub(crate) fn apply_path_constraint(&mut self, index: usize) -> bool {
        let Some(constraint) = self.path_constraints.get(index) else {
            return false;
        };
        let (mix_rotate, mix_x, mix_y) = (constraint.mix_rotate, constraint.mix_x, constraint.mix_y);
        if !constraint.active || (mix_rotate == 0.0 && mix_x == 0.0 && mix_y == 0.0) {
            return false;
        }
        let skeleton_data = Arc::clone(&self.data);
        let Some(data) = skeleton_data.path_constraints.get(constraint.data_index) else {
            return false;
        };
        let target = constraint.target;
        let (position, spacing) = (constraint.position, constraint.spacing);
        let Some(AttachmentData::Path(path)) = self
            .slots
            .get(target)
            .and_then(|slot| slot.attachment.as_deref())
            .and_then(|name| skeleton_data.attachment(target, name))
        else {
            return false;
        };

        let bones = std::mem::take(&mut self.path_constraints[index].bones);
        let mut scratch = std::mem::take(&mut self.path_constraints[index].scratch);
        let settings = PathSettings {
            position,
            spacing,
            mix_rotate,
            mix_x,
            mix_y,
        };
        let applied = self.solve_path(&bones, &mut scratch, data, path, target, settings);
        self.path_constraints[index].scratch = scratch;
        self.path_constraints[index].bones = bones;
        applied
    }

    fn solve_path(
        &mut self,
        bones: &[usize],
        scratch: &mut PathScratch,
        data: &PathConstraintData,
        path: &PathAttachmentData,
        target: usize,
        settings: PathSettings,
    ) -> bool {
        let bone_count = bones.len();
        if bone_count == 0 {
            return false;
        }
        let tangents = data.rotate_mode == RotateMode::Tangent;
        let scale = data.rotate_mode == RotateMode::ChainScale;
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };
        let spacing = settings.spacing;

        scratch.spaces.clear();
        scratch.spaces.resize(spaces_count, 0.0);
        scratch.lengths.clear();
        if scale {
            scratch.lengths.resize(bone_count, 0.0);
        }
        let spaces = scratch.spaces.as_mut_slice();
        let lengths = scratch.lengths.as_mut_slice();

        let bone_length = |skeleton: &Skeleton, bone_index: usize| -> (f32, f32) {
            let setup_length = skeleton.data.bones[bone_index].length;
            let bone = &skeleton.bones[bone_index];
            let x = setup_length * bone.a;
            let y = setup_length * bone.c;
            (setup_length, (x * x + y * y).sqrt())
        };

        match data.spacing_mode {
            SpacingMode::Percent => {
                if scale {
                    for i in 0..spaces_count - 1 {
                        lengths[i] = bone_length(self, bones[i]).1;
                    }
                }
                for space in spaces.iter_mut().skip(1) {
                    *space = spacing;
                }
            }
            SpacingMode::Proportional => {
                let mut sum = 0.0f32;
                for i in 0..spaces_count - 1 {
                    let (setup_length, length) = bone_length(self, bones[i]);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                        continue;
                    }
                    if scale {
                        lengths[i] = length;
                    }
                    spaces[i + 1] = length;
                    sum += length;
                }
                if sum > 0.0 {
                    let factor = spaces_count as f32 / sum * spacing;
                    for space in spaces.iter_mut().skip(1) {
                        *space *= factor;
                    }
                }
            }
            mode => {
                let length_spacing = mode == SpacingMode::Length;
                for i in 0..spaces_count - 1 {
                    let (setup_length, length) = bone_length(self, bones[i]);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                        continue;
                    }
                    if scale {
                        lengths[i] = length;
                    }
                    let space = if length_spacing {
                        setup_length + spacing
                    } else {
                        spacing
                    };
                    spaces[i + 1] = space * length / setup_length;
                }
            }
        }

        let request = PathRequest {
            slot_index: target,
            position_mode: data.position_mode,
            spacing_mode: data.spacing_mode,
            spaces_count,
            tangents,
            position: settings.position,
        };
        compute_path_world_positions(
            self,
            &mut scratch.positions,
            &mut scratch.world,
            &mut scratch.curves,
            path,
            &request,
            &scratch.spaces,
        );
        let positions = scratch.positions.as_slice();
        if positions.len() < 2 {
            return false;
        }
        let spaces = scratch.spaces.as_slice();
        let lengths = scratch.lengths.as_slice();

        let mut bone_x = positions[0];
        let mut bone_y = positions[1];
        let mut offset_rotation = data.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            data.rotate_mode == RotateMode::Chain
        } else {
            let slot_bone = &self.bones[self.slots[target].bone];
            let reflect = if slot_bone.a * slot_bone.d - slot_bone.b * slot_bone.c > 0.0 {
                1.0
            } else {
                -1.0
            };
            offset_rotation = offset_rotation.to_radians() * reflect;
            false
        };

        let (mix_rotate, mix_x, mix_y) = (settings.mix_rotate, settings.mix_x, settings.mix_y);
        let mut applied = false;
        let mut p = 3usize;
        for (i, &bone_index) in bones.iter().enumerate() {
            let setup_length = self.data.bones[bone_index].length;
            let bone = &mut self.bones[bone_index];
            if !bone.active {
                p += 3;
                continue;
            }
            bone.world_x += (bone_x - bone.world_x) * mix_x;
            bone.world_y += (bone_y - bone.world_y) * mix_y;

            let x = positions.get(p).copied().unwrap_or(bone_x);
            let y = positions.get(p + 1).copied().unwrap_or(bone_y);
            let dx = x - bone_x;
            let dy = y - bone_y;

            if scale {
                let length = lengths.get(i).copied().unwrap_or(0.0);
                if length >= EPSILON {
                    let s = ((dx * dx + dy * dy).sqrt() / length - 1.0) * mix_rotate + 1.0;
                    bone.a *= s;
                    bone.c *= s;
                }
            }

            bone_x = x;
            bone_y = y;

            if mix_rotate > 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let mut r = if tangents {
                    positions.get(p - 1).copied().unwrap_or(0.0)
                } else if spaces.get(i + 1).copied().unwrap_or(0.0) < EPSILON {
                    positions.get(p + 2).copied().unwrap_or(0.0)
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a);
                if tip {
                    let (sin, cos) = r.sin_cos();
                    bone_x += (setup_length * (cos * a - sin * c) - dx) * mix_rotate;
                    bone_y += (setup_length * (sin * a + cos * c) - dy) * mix_rotate;
                } else {
                    r += offset_rotation;
                }
                let r = wrap_pi(r) * mix_rotate;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }

            applied = true;
            p += 3;
        }
        applied
    }
}

#[derive(Copy, Clone, Debug)]
struct PathSettings {
    position: f32,
    spacing: f32,
    mix_rotate: f32,
    mix_x: f32,
    mix_y: f32,
}

#[derive(Copy, Clone, Debug)]
struct PathRequest {
    slot_index: usize,
    position_mode: PositionMode,
    spacing_mode: SpacingMode,
    spaces_count: usize,
    tangents: bool,
    position: f32,
}

/// Samples `spaces_count` positions along the path. Each output triple is `x, y, rotation`.
fn compute_path_world_positions(
    skeleton: &Skeleton,
    positions: &mut Vec<f32>,
    world: &mut Vec<f32>,
    curves: &mut Vec<f32>,
    path: &PathAttachmentData,
    request: &PathRequest,
    spaces: &[f32],
) {
    const NONE: isize = -1;
    const BEFORE: isize = -2;
    const AFTER: isize = -3;

    let slot_index = request.slot_index;
    let spaces_count = request.spaces_count;
    let closed = path.closed;
    let mut vertices_length = path.vertices.len() * 2;
    positions.clear();
    if vertices_length < 6 || spaces_count == 0 {
        return;
    }
    positions.resize(spaces_count * 3 + 2, 0.0);
    let output = positions.as_mut_slice();
    let mut position = request.position;

    if !path.constant_speed {
        let lengths = path.lengths.as_slice();
        let curve_count = (vertices_length / 6) as isize - if closed { 1 } else { 2 };
        if curve_count < 0 || curve_count as usize >= lengths.len() {
            return;
        }
        let curve_count = curve_count as usize;
        let path_length = lengths[curve_count];
        if request.position_mode == PositionMode::Percent {
            position *= path_length;
        }
        let multiplier = match request.spacing_mode {
            SpacingMode::Percent => path_length,
            SpacingMode::Proportional => path_length / spaces_count as f32,
            _ => 1.0,
        };

        world.clear();
        world.resize(8, 0.0);
        let mut prev_curve = NONE;
        let mut curve = 0usize;
        for (i, &space) in spaces.iter().enumerate().take(spaces_count) {
            let space = space * multiplier;
            position += space;
            let mut p = position;

            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                if prev_curve != BEFORE {
                    prev_curve = BEFORE;
                    compute_world_vertices(skeleton, slot_index, &path.vertices, 2, 4, world, 0, 2);
                }
                add_before_position(p, world, 0, output, i * 3);
                continue;
            } else if p > path_length {
                if prev_curve != AFTER {
                    prev_curve = AFTER;
                    compute_world_vertices(
                        skeleton,
                        slot_index,
                        &path.vertices,
                        vertices_length - 6,
                        4,
                        world,
                        0,
                        2,
                    );
                }
                add_after_position(p - path_length, world, 0, output, i * 3);
                continue;
            }

            p = locate_in_table(lengths, &mut curve, p);

            if curve as isize != prev_curve {
                prev_curve = curve as isize;
                if closed && curve == curve_count {
                    compute_world_vertices(
                        skeleton,
                        slot_index,
                        &path.vertices,
                        vertices_length - 4,
                        4,
                        world,
                        0,
                        2,
                    );
                    compute_world_vertices(skeleton, slot_index, &path.vertices, 0, 4, world, 4, 2);
                } else {
                    compute_world_vertices(
                        skeleton,
                        slot_index,
                        &path.vertices,
                        curve * 6 + 2,
                        8,
                        world,
                        0,
                        2,
                    );
                }
            }

            let curve_points = bezier_at(world, 0);
            add_curve_position(
                p,
                curve_points,
                output,
                i * 3,
                request.tangents || (i > 0 && space.abs() < EPSILON),
            );
        }
        return;
    }

    let mut curve_count = vertices_length / 6;
    world.clear();
    if closed {
        vertices_length += 2;
        world.resize(vertices_length, 0.0);
        compute_world_vertices(
            skeleton,
            slot_index,
            &path.vertices,
            2,
            vertices_length - 4,
            world,
            0,
            2,
        );
        compute_world_vertices(
            skeleton,
            slot_index,
            &path.vertices,
            0,
            2,
            world,
            vertices_length - 4,
            2,
        );
        world[vertices_length - 2] = world[0];
        world[vertices_length - 1] = world[1];
    } else {
        curve_count -= 1;
        vertices_length -= 4;
        world.resize(vertices_length, 0.0);
        compute_world_vertices(
            skeleton,
            slot_index,
            &path.vertices,
            2,
            vertices_length,
            world,
            0,
            2,
        );
    }
    let world = world.as_slice();

    curves.clear();
    curves.resize(curve_count, 0.0);
    let mut path_length = 0.0f32;
    let mut w = 0usize;
    for total in curves.iter_mut() {
        let points = bezier_at(world, w);
        path_length += coarse_curve_length(points);
        *total = path_length;
        w += 6;
    }

    if request.position_mode == PositionMode::Percent {
        position *= path_length;
    }
    let multiplier = match request.spacing_mode {
        SpacingMode::Percent => path_length,
        SpacingMode::Proportional => path_length / spaces_count as f32,
        _ => 1.0,
    };

    let mut segments = [0.0f32; 10];
    let mut points = [0.0f32; 8];
    let mut prev_curve = NONE;
    let mut curve = 0usize;
    let mut segment = 0usize;

    for (i, &space) in spaces.iter().enumerate().take(spaces_count) {
        let space = space * multiplier;
        position += space;
        let mut p = position;

        if closed {
            p = p.rem_euclid(path_length);
            curve = 0;
        } else if p < 0.0 {
            add_before_position(p, world, 0, output, i * 3);
            continue;
        } else if p > path_length {
            add_after_position(p - path_length, world, vertices_length - 4, output, i * 3);
            continue;
        }

        p = locate_in_table(curves, &mut curve, p);

        if curve as isize != prev_curve {
            prev_curve = curve as isize;
            points = bezier_at(world, curve * 6);
            fine_segment_lengths(points, &mut segments);
            segment = 0;
        }

        let curve_length = segments[9];
        p *= curve_length;
        loop {
            let length = segments[segment];
            if p > length {
                segment += 1;
                if segment >= segments.len() {
                    segment = segments.len() - 1;
                    break;
                }
                continue;
            }
            if segment == 0 {
                p /= length.max(EPSILON);
            } else {
                let prev = segments[segment - 1];
                p = segment as f32 + (p - prev) / (length - prev).max(EPSILON);
            }
            break;
        }

        add_curve_position(
            p * 0.1,
            points,
            output,
            i * 3,
            request.tangents || (i > 0 && space.abs() < EPSILON),
        );
    }
}

/// Advances `index` to the first cumulative length `>= p` and returns `p` normalised within it.
fn locate_in_table(table: &[f32], index: &mut usize, mut p: f32) -> f32 {
    while *index < table.len() {
        let length = table[*index];
        if p > length {
            *index += 1;
            continue;
        }
        if *index == 0 {
            p /= length.max(EPSILON);
        } else {
            let prev = table[*index - 1];
            p = (p - prev) / (length - prev).max(EPSILON);
        }
        break;
    }
    p
}

fn bezier_at(world: &[f32], start: usize) -> [f32; 8] {
    let mut out = [0.0f32; 8];
    for (i, value) in out.iter_mut().enumerate() {
        *value = world.get(start + i).copied().unwrap_or(0.0);
    }
    out
}

/// Four-step forward-difference length estimate of one cubic curve.
fn coarse_curve_length([x1, y1, cx1, cy1, cx2, cy2, x2, y2]: [f32; 8]) -> f32 {
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.16666667;
    let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.16666667;

    let mut length = (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx;
    dfy += ddfy;
    ddfx += dddfx;
    ddfy += dddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx;
    dfy += ddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length + (dfx * dfx + dfy * dfy).sqrt()
}

/// Ten-step cumulative lengths of one cubic curve.
fn fine_segment_lengths([x1, y1, cx1, cy1, cx2, cy2, x2, y2]: [f32; 8], out: &mut [f32; 10]) {
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.16666667;
    let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.16666667;

    let mut length = (dfx * dfx + dfy * dfy).sqrt();
    out[0] = length;
    for seg in out.iter_mut().take(8).skip(1) {
        dfx += ddfx;
        dfy += ddfy;
        ddfx += dddfx;
        ddfy += dddfy;
        length += (dfx * dfx + dfy * dfy).sqrt();
        *seg = length;
    }
    dfx += ddfx;
    dfy += ddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    out[8] = length;
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    out[9] = length;
}

fn add_before_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i];
    let y1 = temp[i + 1];
    let r = (temp[i + 3] - y1).atan2(temp[i + 2] - x1);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i + 2];
    let y1 = temp[i + 3];
    let r = (y1 - temp[i + 1]).atan2(x1 - temp[i]);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

fn add_curve_position(
    p: f32,
    [x1, y1, cx1, cy1, cx2, cy2, x2, y2]: [f32; 8],
    output: &mut [f32],
    o: usize,
    tangents: bool,
) {
    if p < EPSILON || p.is_nan() {
        output[o] = x1;
        output[o + 1] = y1;
        output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    output[o] = x;
    output[o + 1] = y;
    if tangents {
        output[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            let ty = y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt);
            let tx = x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt);
            ty.atan2(tx)
        };
    }
}
