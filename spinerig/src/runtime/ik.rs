use super::bone::shortest_rotation;
use crate::{IkConstraintData, Inherit, Skeleton};

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub bend_direction: i32,
    pub active: bool,
}

impl IkConstraint {
    pub(crate) fn from_data(data_index: usize, data: &IkConstraintData) -> Self {
        let mut out = Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix: 1.0,
            softness: 0.0,
            compress: false,
            stretch: false,
            uniform: false,
            bend_direction: 1,
            active: true,
        };
        out.set_to_setup_pose(data);
        out
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &IkConstraintData) {
        self.mix = data.mix;
        self.softness = data.softness;
        self.compress = data.compress;
        self.stretch = data.stretch;
        self.uniform = data.uniform;
        self.bend_direction = data.bend_direction;
    }
}

impl Skeleton {
    /// Solves one IK constraint by rewriting the applied rotation (and scale) of its bones.
    pub(crate) fn apply_ik_constraint(&mut self, index: usize) -> bool {
        let Some(ik) = self.ik_constraints.get(index) else {
            return false;
        };
        if !ik.active || ik.mix == 0.0 {
            return false;
        }
        let Some(target) = self.bones.get(ik.target) else {
            return false;
        };
        let (target_x, target_y) = (target.world_x, target.world_y);
        let mix = ik.mix;

        match *ik.bones.as_slice() {
            [bone] => {
                let settings = OneBone {
                    compress: ik.compress,
                    stretch: ik.stretch,
                    uniform: ik.uniform,
                };
                self.apply_ik_one(bone, target_x, target_y, settings, mix);
                true
            }
            [parent, child] => {
                let settings = TwoBone {
                    bend_direction: ik.bend_direction,
                    softness: ik.softness,
                    stretch: ik.stretch,
                    uniform: ik.uniform,
                };
                self.apply_ik_two(parent, child, target_x, target_y, settings, mix);
                true
            }
            _ => false,
        }
    }

    fn apply_ik_one(
        &mut self,
        bone_index: usize,
        target_x: f32,
        target_y: f32,
        settings: OneBone,
        alpha: f32,
    ) {
        if !alpha.is_finite() || alpha <= 0.0 || bone_index >= self.bones.len() {
            return;
        }
        let skeleton = self.skeleton_frame();
        let parent = self.parent_frame(bone_index);
        let (pa, mut pb, pc, mut pd) = (parent.a, parent.b, parent.c, parent.d);

        let bone = &self.bones[bone_index];
        let inherit = bone.inherit;
        let (world_x, world_y) = (bone.world_x, bone.world_y);
        let (ax, ay) = (bone.ax, bone.ay);
        let (mut sx, mut sy) = (bone.ascale_x, bone.ascale_y);

        let mut rotation_ik = -bone.ashear_x - bone.arotation;
        let (mut tx, mut ty) = match inherit {
            Inherit::OnlyTranslation => (
                (target_x - world_x) * skeleton.scale_x.signum(),
                (target_y - world_y) * skeleton.scale_y.signum(),
            ),
            _ => {
                if inherit == Inherit::NoRotationOrReflection {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc).max(1.0e-4);
                    let sa = pa / skeleton.scale_x;
                    let sc = pc / skeleton.scale_y;
                    pb = -sc * s * skeleton.scale_x;
                    pd = sa * s * skeleton.scale_y;
                    rotation_ik += sc.atan2(sa).to_degrees();
                }
                let x = target_x - parent.world_x;
                let y = target_y - parent.world_y;
                let det = pa * pd - pb * pc;
                if det.abs() <= 1.0e-4 {
                    (0.0, 0.0)
                } else {
                    ((x * pd - y * pb) / det - ax, (y * pa - x * pc) / det - ay)
                }
            }
        };

        rotation_ik += ty.atan2(tx).to_degrees();
        if sx < 0.0 {
            rotation_ik += 180.0;
        }
        rotation_ik = shortest_rotation(rotation_ik);

        if settings.compress || settings.stretch {
            if matches!(inherit, Inherit::NoScale | Inherit::NoScaleOrReflection) {
                tx = target_x - world_x;
                ty = target_y - world_y;
            }
            let b = self.data.bones[bone_index].length * sx;
            if b > 1.0e-4 {
                let dd = tx * tx + ty * ty;
                if (settings.compress && dd < b * b) || (settings.stretch && dd > b * b) {
                    let s = (dd.sqrt() / b - 1.0) * alpha + 1.0;
                    sx *= s;
                    if settings.uniform {
                        sy *= s;
                    }
                }
            }
        }

        let bone = &mut self.bones[bone_index];
        bone.arotation += rotation_ik * alpha;
        bone.ascale_x = sx;
        bone.ascale_y = sy;
    }

    fn apply_ik_two(
        &mut self,
        parent_index: usize,
        child_index: usize,
        target_x: f32,
        target_y: f32,
        settings: TwoBone,
        alpha: f32,
    ) {
        use std::f32::consts::PI;
        const EPSILON: f32 = 1.0e-4;

        if !alpha.is_finite() || alpha <= 0.0 {
            return;
        }
        if parent_index >= self.bones.len() || child_index >= self.bones.len() {
            return;
        }
        if self.bones[parent_index].inherit != Inherit::Normal
            || self.bones[child_index].inherit != Inherit::Normal
        {
            return;
        }

        let parent = &self.bones[parent_index];
        let (px, py, parent_rotation) = (parent.ax, parent.ay, parent.arotation);
        let (mut sx, mut sy) = (parent.ascale_x, parent.ascale_y);
        let (pa, pb, pc, pd) = (parent.a, parent.b, parent.c, parent.d);
        let (pwx, pwy) = (parent.world_x, parent.world_y);

        let (mut psx, mut psy) = (sx, sy);
        let mut os1 = 0.0f32;
        let mut s2 = 1.0f32;
        if psx < 0.0 {
            psx = -psx;
            os1 = 180.0;
            s2 = -1.0;
        }
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }

        let child = &self.bones[child_index];
        let (cx, child_ay, child_rotation, child_shear_x) =
            (child.ax, child.ay, child.arotation, child.ashear_x);
        let mut csx = child.ascale_x;
        let mut os2 = 0.0f32;
        if csx < 0.0 {
            csx = -csx;
            os2 = 180.0;
        }

        let u = (psx - psy).abs() <= EPSILON;
        let (cy, cwx, cwy) = if !u || settings.stretch {
            (0.0, pa * cx + pwx, pc * cx + pwy)
        } else {
            (
                child_ay,
                pa * cx + pb * child_ay + pwx,
                pc * cx + pd * child_ay + pwy,
            )
        };

        let pp = self.parent_frame(parent_index);
        let mut id = pp.a * pp.d - pp.b * pp.c;
        id = if id.abs() <= EPSILON { 0.0 } else { 1.0 / id };
        let x = cwx - pp.world_x;
        let y = cwy - pp.world_y;
        let dx = (x * pp.d - y * pp.b) * id - px;
        let dy = (y * pp.a - x * pp.c) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();

        if l1 < EPSILON {
            let one = OneBone {
                compress: false,
                stretch: settings.stretch,
                uniform: false,
            };
            self.apply_ik_one(parent_index, target_x, target_y, one, alpha);
            let child = &mut self.bones[child_index];
            child.ay = cy;
            child.arotation = 0.0;
            return;
        }

        let l2 = self.data.bones[child_index].length * csx;
        let x = target_x - pp.world_x;
        let y = target_y - pp.world_y;
        let mut tx = (x * pp.d - y * pp.b) * id - px;
        let mut ty = (y * pp.a - x * pp.c) * id - py;
        let mut dd = tx * tx + ty * ty;

        if settings.softness != 0.0 {
            let softness = settings.softness.max(0.0) * psx * (csx + 1.0) * 0.5;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 {
                let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                p = (sd - softness * (1.0 - p * p)) / td.max(EPSILON);
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let bend = if settings.bend_direction >= 0 { 1.0 } else { -1.0 };
        let (mut a1, a2);

        if u {
            let l2 = l2 * psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            if cos < -1.0 {
                cos = -1.0;
                a2 = PI * bend;
            } else if cos > 1.0 {
                cos = 1.0;
                a2 = 0.0;
                if settings.stretch {
                    let s = (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                    sx *= s;
                    if settings.uniform {
                        sy *= s;
                    }
                }
            } else {
                a2 = cos.acos() * bend;
            }
            let adj = l1 + l2 * cos;
            let opp = l2 * a2.sin();
            a1 = (ty * adj - tx * opp).atan2(tx * adj + ty * opp);
        } else {
            (a1, a2) = solve_non_uniform(l1, l2, psx, psy, tx, ty, dd, bend);
        }

        let os = cy.atan2(cx) * s2;
        a1 = shortest_half_turn((a1 - os).to_degrees() + os1 - parent_rotation);
        let a2 = shortest_half_turn(
            ((a2 + os).to_degrees() - child_shear_x) * s2 + os2 - child_rotation,
        );

        let parent = &mut self.bones[parent_index];
        parent.arotation = parent_rotation + a1 * alpha;
        parent.ascale_x = sx;
        parent.ascale_y = sy;
        parent.ashear_x = 0.0;
        parent.ashear_y = 0.0;

        let child = &mut self.bones[child_index];
        child.ay = cy;
        child.arotation = child_rotation + a2 * alpha;
    }
}

#[derive(Copy, Clone, Debug)]
struct OneBone {
    compress: bool,
    stretch: bool,
    uniform: bool,
}

#[derive(Copy, Clone, Debug)]
struct TwoBone {
    bend_direction: i32,
    softness: f32,
    stretch: bool,
    uniform: bool,
}

fn shortest_half_turn(degrees: f32) -> f32 {
    if degrees > 180.0 {
        degrees - 360.0
    } else if degrees < -180.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Two-bone solve when the parent is scaled non-uniformly: intersect the child's
/// ellipse with the target circle, falling back to the closest reachable point.
#[allow(clippy::too_many_arguments)]
fn solve_non_uniform(
    l1: f32,
    l2: f32,
    psx: f32,
    psy: f32,
    tx: f32,
    ty: f32,
    dd: f32,
    bend: f32,
) -> (f32, f32) {
    use std::f32::consts::PI;

    let a = psx * l2;
    let b = psy * l2;
    let aa = a * a;
    let bb = b * b;
    let ta = ty.atan2(tx);
    let c = bb * l1 * l1 + aa * dd - aa * bb;
    let c1 = -2.0 * bb * l1;
    let c2 = bb - aa;
    let disc = c1 * c1 - 4.0 * c2 * c;

    if disc >= 0.0 {
        let mut q = disc.sqrt();
        if c1 < 0.0 {
            q = -q;
        }
        q = -(c1 + q) * 0.5;
        let r0 = q / c2;
        let r1 = c / q;
        let r = if r0.abs() < r1.abs() { r0 } else { r1 };
        let r0 = dd - r * r;
        if r0 >= 0.0 {
            let y = r0.sqrt() * bend;
            return (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
        }
    }

    let mut min_angle = PI;
    let mut min_x = l1 - a;
    let mut min_dist = min_x * min_x;
    let mut min_y = 0.0f32;
    let mut max_angle = 0.0f32;
    let mut max_x = l1 + a;
    let mut max_dist = max_x * max_x;
    let mut max_y = 0.0f32;
    let c = -a * l1 / (aa - bb);
    if (-1.0..=1.0).contains(&c) {
        let c = c.acos();
        let x = a * c.cos() + l1;
        let y = b * c.sin();
        let d = x * x + y * y;
        if d < min_dist {
            min_angle = c;
            min_dist = d;
            min_x = x;
            min_y = y;
        }
        if d > max_dist {
            max_angle = c;
            max_dist = d;
            max_x = x;
            max_y = y;
        }
    }
    if dd <= (min_dist + max_dist) * 0.5 {
        (ta - (min_y * bend).atan2(min_x), min_angle * bend)
    } else {
        (ta - (max_y * bend).atan2(max_x), max_angle * bend)
    }
}
