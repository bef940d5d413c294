//! Polygon clipping against clipping attachments.
//!
//! A clipping polygon is ear-clipped into triangles, the triangles are merged back into
//! convex pieces, and every triangle drawn while the clip is active is cut against each
//! piece (Sutherland–Hodgman).

/// Ear-clipping triangulation plus convex decomposition of simple polygons.
///
/// Input polygons are flat `[x0, y0, x1, y1, ...]` lists wound clockwise.
#[derive(Clone, Debug, Default)]
pub struct Triangulator {
    indices: Vec<usize>,
    concave: Vec<bool>,
}

impl Triangulator {
    pub fn triangulate(&mut self, vertices: &[f32]) -> Vec<u32> {
        let mut vertex_count = vertices.len() / 2;
        if vertex_count < 3 {
            return Vec::new();
        }

        self.indices.clear();
        self.indices.extend(0..vertex_count);
        self.concave.clear();
        for i in 0..vertex_count {
            let flag = is_concave(i, vertex_count, vertices, &self.indices);
            self.concave.push(flag);
        }
        let indices = &mut self.indices;
        let concave = &mut self.concave;

        let mut triangles = Vec::with_capacity((vertex_count - 2) * 3);
        while vertex_count > 3 {
            // Find an ear tip: a convex vertex whose triangle contains no concave vertex.
            let mut previous = vertex_count - 1;
            let mut i = 0usize;
            let mut next = 1usize;
            loop {
                if !concave[i] && is_ear(vertices, indices, concave, previous, i, next) {
                    break;
                }
                if next == 0 {
                    // No ear; fall back to the last convex vertex (degenerate input).
                    while i > 0 && concave[i] {
                        i -= 1;
                    }
                    break;
                }
                previous = i;
                i = next;
                next = (next + 1) % vertex_count;
            }

            triangles.push(indices[(vertex_count + i - 1) % vertex_count] as u32);
            triangles.push(indices[i] as u32);
            triangles.push(indices[(i + 1) % vertex_count] as u32);

            indices.remove(i);
            concave.remove(i);
            vertex_count -= 1;

            let before = (vertex_count + i - 1) % vertex_count;
            let after = if i == vertex_count { 0 } else { i };
            concave[before] = is_concave(before, vertex_count, vertices, indices);
            concave[after] = is_concave(after, vertex_count, vertices, indices);
        }

        if vertex_count == 3 {
            triangles.extend([indices[2] as u32, indices[0] as u32, indices[1] as u32]);
        }
        triangles
    }

    /// Merges `triangles` (as produced by [`Triangulator::triangulate`]) into convex
    /// polygons.
    pub fn decompose(&mut self, vertices: &[f32], triangles: &[u32]) -> Vec<Vec<f32>> {
        let point = |index: usize| (vertices[index * 2], vertices[index * 2 + 1]);

        // Fan triangles that share their first vertex and keep the winding are merged.
        let mut polygons: Vec<(Vec<f32>, Vec<usize>)> = Vec::new();
        let mut last_winding = 0i32;
        for triangle in triangles.chunks_exact(3) {
            let [t1, t2, t3] = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];
            let (x1, y1) = point(t1);
            let (x2, y2) = point(t2);
            let (x3, y3) = point(t3);

            if let Some((polygon, polygon_indices)) = polygons.last_mut() {
                if polygon_indices[0] == t1 && polygon.len() >= 4 {
                    let o = polygon.len() - 4;
                    let w1 = winding(polygon[o], polygon[o + 1], polygon[o + 2], polygon[o + 3], x3, y3);
                    let w2 = winding(x3, y3, polygon[0], polygon[1], polygon[2], polygon[3]);
                    if w1 == last_winding && w2 == last_winding {
                        polygon.extend([x3, y3]);
                        polygon_indices.push(t3);
                        continue;
                    }
                }
            }
            polygons.push((vec![x1, y1, x2, y2, x3, y3], vec![t1, t2, t3]));
            last_winding = winding(x1, y1, x2, y2, x3, y3);
        }

        // Then lone triangles that continue a polygon's outline are absorbed into it.
        let count = polygons.len();
        for i in 0..count {
            if polygons[i].1.is_empty() {
                continue;
            }
            let first_index = polygons[i].1[0];
            let Some(&last_index) = polygons[i].1.last() else {
                continue;
            };
            let (mut prev_prev_x, mut prev_prev_y, mut prev_x, mut prev_y, first, second) = {
                let polygon = &polygons[i].0;
                let o = polygon.len() - 4;
                (
                    polygon[o],
                    polygon[o + 1],
                    polygon[o + 2],
                    polygon[o + 3],
                    (polygon[0], polygon[1]),
                    (polygon[2], polygon[3]),
                )
            };
            let winding0 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, first.0, first.1);

            let mut ii = 0usize;
            while ii < count {
                let other = &polygons[ii].1;
                if ii == i || other.len() != 3 || other[0] != first_index || other[1] != last_index {
                    ii += 1;
                    continue;
                }
                let other_last = other[2];
                let (x3, y3) = point(other_last);
                let w1 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, x3, y3);
                let w2 = winding(x3, y3, first.0, first.1, second.0, second.1);
                if w1 != winding0 || w2 != winding0 {
                    ii += 1;
                    continue;
                }
                polygons[ii].0.clear();
                polygons[ii].1.clear();
                polygons[i].0.extend([x3, y3]);
                polygons[i].1.push(other_last);
                (prev_prev_x, prev_prev_y, prev_x, prev_y) = (prev_x, prev_y, x3, y3);
                ii = 0;
            }
        }

        polygons
            .into_iter()
            .map(|(polygon, _)| polygon)
            .filter(|polygon| !polygon.is_empty())
            .collect()
    }
}

fn is_ear(
    vertices: &[f32],
    indices: &[usize],
    concave: &[bool],
    previous: usize,
    i: usize,
    next: usize,
) -> bool {
    let count = indices.len();
    let p = |k: usize| (vertices[indices[k] * 2], vertices[indices[k] * 2 + 1]);
    let (p1x, p1y) = p(previous);
    let (p2x, p2y) = p(i);
    let (p3x, p3y) = p(next);

    let mut k = (next + 1) % count;
    while k != previous {
        if concave[k] {
            let (vx, vy) = p(k);
            if positive_area(p3x, p3y, p1x, p1y, vx, vy)
                && positive_area(p1x, p1y, p2x, p2y, vx, vy)
                && positive_area(p2x, p2y, p3x, p3y, vx, vy)
            {
                return false;
            }
        }
        k = (k + 1) % count;
    }
    true
}

fn positive_area(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> bool {
    p1x * (p3y - p2y) + p2x * (p1y - p3y) + p3x * (p2y - p1y) >= 0.0
}

fn is_concave(index: usize, vertex_count: usize, vertices: &[f32], indices: &[usize]) -> bool {
    let previous = indices[(vertex_count + index - 1) % vertex_count] * 2;
    let current = indices[index] * 2;
    let next = indices[(index + 1) % vertex_count] * 2;
    !positive_area(
        vertices[previous],
        vertices[previous + 1],
        vertices[current],
        vertices[current + 1],
        vertices[next],
        vertices[next + 1],
    )
}

fn winding(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> i32 {
    let px = p2x - p1x;
    let py = p2y - p1y;
    if p3x * py - p3y * px + px * p1y - p1x * py >= 0.0 {
        1
    } else {
        -1
    }
}

/// Whether a clip region is open, and which slot closes it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ClipState {
    #[default]
    Idle,
    Clipping {
        /// Slot holding the clipping attachment.
        slot: usize,
        /// Last slot drawn clipped; `None` clips to the end of the draw order.
        end_slot: Option<usize>,
    },
}

/// Clips triangles against the active clipping polygon.
///
/// Clipped output is written into internal buffers that are reused between calls.
#[derive(Clone, Debug, Default)]
pub struct SkeletonClipper {
    state: ClipState,
    triangulator: Triangulator,
    polygons: Vec<Vec<f32>>,
    clip_output: Vec<f32>,
    scratch: Vec<f32>,
    scratch2: Vec<f32>,
    clipped_vertices: Vec<f32>,
    clipped_uvs: Vec<f32>,
    clipped_triangles: Vec<u32>,
}

impl SkeletonClipper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClipState {
        self.state
    }

    pub fn is_clipping(&self) -> bool {
        matches!(self.state, ClipState::Clipping { .. })
    }

    /// Opens a clip region with `world_polygon` (flat x/y pairs). Returns false, and
    /// stays idle, when a clip is already active or the polygon has no area to clip to.
    pub fn clip_start(&mut self, slot: usize, world_polygon: &[f32], end_slot: Option<usize>) -> bool {
        if self.is_clipping() {
            return false;
        }
        if world_polygon.len() < 6 || world_polygon.len() % 2 != 0 {
            return false;
        }

        let mut polygon = world_polygon.to_vec();
        make_clockwise(&mut polygon);
        let triangles = self.triangulator.triangulate(&polygon);
        self.polygons = self.triangulator.decompose(&polygon, &triangles);
        for piece in &mut self.polygons {
            make_clockwise(piece);
            // Close the loop so edges can be walked pairwise.
            let (x, y) = (piece[0], piece[1]);
            piece.extend([x, y]);
        }
        if self.polygons.is_empty() {
            return false;
        }
        self.state = ClipState::Clipping { slot, end_slot };
        true
    }

    /// Closes the clip when `slot` is the active clip's end slot.
    pub fn clip_end_with_slot(&mut self, slot: usize) {
        if let ClipState::Clipping {
            end_slot: Some(end), ..
        } = self.state
        {
            if end == slot {
                self.reset();
            }
        }
    }

    /// Closes any active clip.
    pub fn clip_end(&mut self) {
        if let ClipState::Clipping {
            slot,
            end_slot: Some(end),
        } = self.state
        {
            log::warn!("clip started at slot {slot} never reached its end slot {end}");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = ClipState::Idle;
        self.polygons.clear();
        self.clip_output.clear();
        self.scratch.clear();
        self.scratch2.clear();
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

    /// Clips `triangles` over `vertices`/`uvs` (x/y pairs, `stride` floats per vertex).
    /// Returns true when anything survived; the result is in the `clipped_*` buffers.
    pub fn clip_triangles(
        &mut self,
        vertices: &[f32],
        triangles: &[u32],
        uvs: &[f32],
        stride: usize,
    ) -> bool {
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
        if !self.is_clipping() {
            return false;
        }

        let mut index = 0u32;
        'triangles: for triangle in triangles.chunks_exact(3) {
            let (x1, y1, u1, v1) = read_vertex(vertices, uvs, triangle[0], stride);
            let (x2, y2, u2, v2) = read_vertex(vertices, uvs, triangle[1], stride);
            let (x3, y3, u3, v3) = read_vertex(vertices, uvs, triangle[2], stride);

            for piece in &self.polygons {
                let outcome = clip_triangle(
                    [x1, y1, x2, y2, x3, y3],
                    piece,
                    &mut self.clip_output,
                    &mut self.scratch,
                    &mut self.scratch2,
                );
                match outcome {
                    ClipOutcome::Inside => {
                        self.clipped_vertices.extend([x1, y1, x2, y2, x3, y3]);
                        self.clipped_uvs.extend([u1, v1, u2, v2, u3, v3]);
                        self.clipped_triangles.extend([index, index + 1, index + 2]);
                        index += 3;
                        continue 'triangles;
                    }
                    ClipOutcome::Outside => continue,
                    ClipOutcome::Clipped => {}
                }

                // Barycentric interpolation of the UVs at each output point.
                let d0 = y2 - y3;
                let d1 = x3 - x2;
                let d2 = x1 - x3;
                let d4 = y3 - y1;
                let d = 1.0 / (d0 * d2 + d1 * (y1 - y3));
                for point in self.clip_output.chunks_exact(2) {
                    let (x, y) = (point[0], point[1]);
                    let c0 = x - x3;
                    let c1 = y - y3;
                    let a = (d0 * c0 + d1 * c1) * d;
                    let b = (d4 * c0 + d2 * c1) * d;
                    let c = 1.0 - a - b;
                    self.clipped_vertices.extend([x, y]);
                    self.clipped_uvs
                        .extend([u1 * a + u2 * b + u3 * c, v1 * a + v2 * b + v3 * c]);
                }

                let point_count = (self.clip_output.len() / 2) as u32;
                for k in 1..point_count.saturating_sub(1) {
                    self.clipped_triangles.extend([index, index + k, index + k + 1]);
                }
                index += point_count;
            }
        }
        !self.clipped_triangles.is_empty()
    }
}

fn read_vertex(vertices: &[f32], uvs: &[f32], vertex: u32, stride: usize) -> (f32, f32, f32, f32) {
    let offset = vertex as usize * stride;
    (
        vertices[offset],
        vertices[offset + 1],
        uvs[offset],
        uvs[offset + 1],
    )
}

fn make_clockwise(polygon: &mut [f32]) {
    let len = polygon.len();
    if len < 6 {
        return;
    }
    let mut area = polygon[len - 2] * polygon[1] - polygon[0] * polygon[len - 1];
    for i in (0..len - 3).step_by(2) {
        area += polygon[i] * polygon[i + 3] - polygon[i + 2] * polygon[i + 1];
    }
    if area < 0.0 {
        return;
    }
    let last_x = len - 2;
    for i in (0..len / 2).step_by(2) {
        let other = last_x - i;
        polygon.swap(i, other);
        polygon.swap(i + 1, other + 1);
    }
}

enum ClipOutcome {
    /// The triangle lies entirely within the clipping piece.
    Inside,
    /// Nothing of the triangle survives.
    Outside,
    /// `out` holds the clipped polygon.
    Clipped,
}

/// Clips one triangle against a closed convex polygon.
fn clip_triangle(
    triangle: [f32; 6],
    clip: &[f32],
    out: &mut Vec<f32>,
    scratch: &mut Vec<f32>,
    scratch2: &mut Vec<f32>,
) -> ClipOutcome {
    let [x1, y1, x2, y2, x3, y3] = triangle;
    let mut clipped = false;

    let mut input = scratch;
    let mut output = scratch2;
    input.clear();
    input.extend_from_slice(&[x1, y1, x2, y2, x3, y3, x1, y1]);
    output.clear();

    let last_edge = clip.len() - 4;
    let mut i = 0usize;
    loop {
        let edge_x = clip[i];
        let edge_y = clip[i + 1];
        let ex = edge_x - clip[i + 2];
        let ey = edge_y - clip[i + 3];

        let output_start = output.len();
        for segment in input.windows(4).step_by(2) {
            let (ax, ay, bx, by) = (segment[0], segment[1], segment[2], segment[3]);
            let b_inside = ey * (edge_x - bx) > ex * (edge_y - by);
            let s1 = ey * (edge_x - ax) - ex * (edge_y - ay);

            if s1 > 0.0 {
                if b_inside {
                    output.extend([bx, by]);
                    continue;
                }
                let ix = bx - ax;
                let iy = by - ay;
                let t = s1 / (ix * ey - iy * ex);
                if (0.0..=1.0).contains(&t) {
                    output.extend([ax + ix * t, ay + iy * t]);
                } else {
                    output.extend([bx, by]);
                }
            } else if b_inside {
                let ix = bx - ax;
                let iy = by - ay;
                let t = s1 / (ix * ey - iy * ex);
                if (0.0..=1.0).contains(&t) {
                    output.extend([ax + ix * t, ay + iy * t, bx, by]);
                } else {
                    output.extend([bx, by]);
                    continue;
                }
            }
            clipped = true;
        }

        if output_start == output.len() {
            out.clear();
            return ClipOutcome::Outside;
        }
        let (first_x, first_y) = (output[0], output[1]);
        output.extend([first_x, first_y]);

        if i == last_edge {
            break;
        }
        std::mem::swap(&mut input, &mut output);
        output.clear();
        i += 2;
    }

    out.clear();
    out.extend_from_slice(&output[..output.len() - 2]);
    if clipped {
        ClipOutcome::Clipped
    } else {
        ClipOutcome::Inside
    }
}
