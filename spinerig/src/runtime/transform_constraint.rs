use super::bone::wrap_pi;
use crate::{Skeleton, TransformConstraintData};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub(crate) fn from_data(data_index: usize, data: &TransformConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            mix_scale_x: data.mix_scale_x,
            mix_scale_y: data.mix_scale_y,
            mix_shear_y: data.mix_shear_y,
            active: true,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &TransformConstraintData) {
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
        self.mix_scale_x = data.mix_scale_x;
        self.mix_scale_y = data.mix_scale_y;
        self.mix_shear_y = data.mix_shear_y;
    }

    fn mixes(&self) -> Mixes {
        Mixes {
            rotate: self.mix_rotate,
            x: self.mix_x,
            y: self.mix_y,
            scale_x: self.mix_scale_x,
            scale_y: self.mix_scale_y,
            shear_y: self.mix_shear_y,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Mixes {
    rotate: f32,
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    shear_y: f32,
}

impl Mixes {
    fn is_zero(&self) -> bool {
        self.rotate == 0.0
            && self.x == 0.0
            && self.y == 0.0
            && self.scale_x == 0.0
            && self.scale_y == 0.0
            && self.shear_y == 0.0
    }
}

impl Skeleton {
    /// Returns true when the constraint changed its bones. Local mode rewrites
    /// applied values; world mode rewrites world matrices.
    pub(crate) fn apply_transform_constraint(&mut self, index: usize) -> bool {
        let Some(constraint) = self.transform_constraints.get(index) else {
            return false;
        };
        let mix = constraint.mixes();
        if !constraint.active || mix.is_zero() {
            return false;
        }
        let skeleton_data = Arc::clone(&self.data);
        let Some(data) = skeleton_data
            .transform_constraints
            .get(constraint.data_index)
        else {
            return false;
        };

        let bones = std::mem::take(&mut self.transform_constraints[index].bones);
        let applied = match (data.local, data.relative) {
            (true, true) => self.apply_relative_local(&bones, data, mix),
            (true, false) => self.apply_absolute_local(&bones, data, mix),
            (false, relative) => self.apply_world(&bones, data, mix, relative),
        };
        self.transform_constraints[index].bones = bones;
        applied
    }

    fn apply_absolute_local(
        &mut self,
        bones: &[usize],
        data: &TransformConstraintData,
        mix: Mixes,
    ) -> bool {
        let Some(target) = self.bones.get(data.target).cloned() else {
            return false;
        };
        let mut applied = false;
        for &bone_index in bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            if !bone.active {
                continue;
            }
            if mix.rotate != 0.0 {
                let r = target.arotation - bone.arotation + data.offset_rotation;
                bone.arotation += shortest_degrees(r) * mix.rotate;
            }
            bone.ax += (target.ax - bone.ax + data.offset_x) * mix.x;
            bone.ay += (target.ay - bone.ay + data.offset_y) * mix.y;
            if mix.scale_x != 0.0 {
                bone.ascale_x +=
                    (target.ascale_x - bone.ascale_x + data.offset_scale_x) * mix.scale_x;
            }
            if mix.scale_y != 0.0 {
                bone.ascale_y +=
                    (target.ascale_y - bone.ascale_y + data.offset_scale_y) * mix.scale_y;
            }
            if mix.shear_y != 0.0 {
                let r = target.ashear_y - bone.ashear_y + data.offset_shear_y;
                bone.ashear_y += shortest_degrees(r) * mix.shear_y;
            }
            applied = true;
        }
        applied
    }

    fn apply_relative_local(
        &mut self,
        bones: &[usize],
        data: &TransformConstraintData,
        mix: Mixes,
    ) -> bool {
        let Some(target) = self.bones.get(data.target).cloned() else {
            return false;
        };
        let mut applied = false;
        for &bone_index in bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            if !bone.active {
                continue;
            }
            bone.arotation += (target.arotation + data.offset_rotation) * mix.rotate;
            bone.ax += (target.ax + data.offset_x) * mix.x;
            bone.ay += (target.ay + data.offset_y) * mix.y;
            bone.ascale_x *= (target.ascale_x - 1.0 + data.offset_scale_x) * mix.scale_x + 1.0;
            bone.ascale_y *= (target.ascale_y - 1.0 + data.offset_scale_y) * mix.scale_y + 1.0;
            bone.ashear_y += (target.ashear_y + data.offset_shear_y) * mix.shear_y;
            applied = true;
        }
        applied
    }

    fn apply_world(
        &mut self,
        bones: &[usize],
        data: &TransformConstraintData,
        mix: Mixes,
        relative: bool,
    ) -> bool {
        use std::f32::consts::FRAC_PI_2;

        let Some(target) = self.bones.get(data.target) else {
            return false;
        };
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let reflect = if ta * td - tb * tc > 0.0 { 1.0 } else { -1.0 };
        let offset_rotation = data.offset_rotation.to_radians() * reflect;
        let offset_shear_y = data.offset_shear_y.to_radians() * reflect;
        let translate = mix.x != 0.0 || mix.y != 0.0;
        let tx = data.offset_x * ta + data.offset_y * tb + target.world_x;
        let ty = data.offset_x * tc + data.offset_y * td + target.world_y;
        let target_scale_x = (ta * ta + tc * tc).sqrt();
        let target_scale_y = (tb * tb + td * td).sqrt();

        let mut applied = false;
        for &bone_index in bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            if !bone.active {
                continue;
            }
            let (mut a, mut b, mut c, mut d) = (bone.a, bone.b, bone.c, bone.d);

            if mix.rotate != 0.0 {
                let mut r = tc.atan2(ta) + offset_rotation;
                if !relative {
                    r -= c.atan2(a);
                }
                let r = wrap_pi(r) * mix.rotate;
                let (sin, cos) = r.sin_cos();
                (a, b, c, d) = (
                    cos * a - sin * c,
                    cos * b - sin * d,
                    sin * a + cos * c,
                    sin * b + cos * d,
                );
            }

            if translate {
                if relative {
                    bone.world_x += tx * mix.x;
                    bone.world_y += ty * mix.y;
                } else {
                    bone.world_x += (tx - bone.world_x) * mix.x;
                    bone.world_y += (ty - bone.world_y) * mix.y;
                }
            }

            if mix.scale_x != 0.0 {
                let s = if relative {
                    (target_scale_x - 1.0 + data.offset_scale_x) * mix.scale_x + 1.0
                } else {
                    let s = (a * a + c * c).sqrt();
                    if s > 1.0e-6 {
                        (s + (target_scale_x - s + data.offset_scale_x) * mix.scale_x) / s
                    } else {
                        1.0
                    }
                };
                a *= s;
                c *= s;
            }

            if mix.scale_y != 0.0 {
                let s = if relative {
                    (target_scale_y - 1.0 + data.offset_scale_y) * mix.scale_y + 1.0
                } else {
                    let s = (b * b + d * d).sqrt();
                    if s > 1.0e-6 {
                        (s + (target_scale_y - s + data.offset_scale_y) * mix.scale_y) / s
                    } else {
                        1.0
                    }
                };
                b *= s;
                d *= s;
            }

            if mix.shear_y != 0.0 {
                let by = d.atan2(b);
                let r = if relative {
                    let r = wrap_pi(td.atan2(tb) - tc.atan2(ta));
                    by + (r - FRAC_PI_2 + offset_shear_y) * mix.shear_y
                } else {
                    let r = wrap_pi(td.atan2(tb) - tc.atan2(ta) - (by - c.atan2(a)));
                    by + (r + offset_shear_y) * mix.shear_y
                };
                let s = (b * b + d * d).sqrt();
                b = r.cos() * s;
                d = r.sin() * s;
            }

            bone.a = a;
            bone.b = b;
            bone.c = c;
            bone.d = d;
            applied = true;
        }
        applied
    }
}

fn shortest_degrees(degrees: f32) -> f32 {
    degrees - ((degrees / 360.0 - 0.5).ceil()) * 360.0
}
