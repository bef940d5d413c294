use crate::{PhysicsConstraintData, Skeleton};
use std::sync::Arc;

/// Determines how physics constraints are advanced during a world transform update.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Physics {
    /// Physics are not updated or applied.
    #[default]
    None,
    /// Physics are reset to the current pose.
    Reset,
    /// Physics are updated and the pose from physics is applied.
    Update,
    /// Physics are not updated but the pose from physics is applied.
    Pose,
}

#[derive(Clone, Debug)]
pub struct PhysicsConstraint {
    data_index: usize,
    pub bone: usize,

    pub inertia: f32,
    pub strength: f32,
    pub damping: f32,
    pub mass_inverse: f32,
    pub wind: f32,
    pub gravity: f32,
    pub mix: f32,
    pub active: bool,

    state: SpringState,
}

/// Integrator state carried between frames.
#[derive(Clone, Debug, Default)]
struct SpringState {
    reset: bool,
    ux: f32,
    uy: f32,
    cx: f32,
    cy: f32,
    tx: f32,
    ty: f32,
    x_offset: f32,
    x_lag: f32,
    x_velocity: f32,
    y_offset: f32,
    y_lag: f32,
    y_velocity: f32,
    rotate_offset: f32,
    rotate_lag: f32,
    rotate_velocity: f32,
    scale_offset: f32,
    scale_lag: f32,
    scale_velocity: f32,
    remaining: f32,
    last_time: f32,
}

impl PhysicsConstraint {
    pub(crate) fn from_data(data_index: usize, data: &PhysicsConstraintData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            inertia: data.inertia,
            strength: data.strength,
            damping: data.damping,
            mass_inverse: data.mass_inverse,
            wind: data.wind,
            gravity: data.gravity,
            mix: data.mix,
            active: true,
            state: SpringState {
                reset: true,
                ..SpringState::default()
            },
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &PhysicsConstraintData) {
        self.inertia = data.inertia;
        self.strength = data.strength;
        self.damping = data.damping;
        self.mass_inverse = data.mass_inverse;
        self.wind = data.wind;
        self.gravity = data.gravity;
        self.mix = data.mix;
    }

    /// Drops all accumulated motion; the next update re-seeds from the current pose.
    pub fn reset(&mut self, time: f32) {
        self.state = SpringState {
            reset: true,
            last_time: time,
            ..SpringState::default()
        };
    }

    /// Shifts the spring's reference point so the bone reacts as if the skeleton had moved
    /// by `(x, y)`.
    pub fn translate(&mut self, x: f32, y: f32) {
        self.state.ux -= x;
        self.state.uy -= y;
        self.state.cx -= x;
        self.state.cy -= y;
    }

    /// Like [`PhysicsConstraint::translate`], for a rotation about `(x, y)` by `degrees`.
    pub fn rotate(&mut self, x: f32, y: f32, degrees: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.state.cx - x;
        let dy = self.state.cy - y;
        self.translate(dx * cos - dy * sin - dx, dx * sin + dy * cos - dy);
    }
}

impl Skeleton {
    /// Advances and applies one physics constraint. Writes the bone's world matrix.
    pub(crate) fn apply_physics_constraint(&mut self, index: usize, physics: Physics) -> bool {
        const PI_2: f32 = std::f32::consts::PI * 2.0;
        const INV_PI_2: f32 = 1.0 / PI_2;

        let skeleton_data = Arc::clone(&self.data);
        let time = self.time;
        let (wind_x, wind_y, gravity_x, gravity_y) =
            (self.wind_x, self.wind_y, self.gravity_x, self.gravity_y);
        let (skeleton_scale_x, skeleton_scale_y) = (self.scale_x, self.scale_y);

        let Some(constraint) = self.physics_constraints.get_mut(index) else {
            return false;
        };
        let mix = constraint.mix;
        if !constraint.active || mix == 0.0 {
            return false;
        }
        let Some(data) = skeleton_data.physics_constraints.get(constraint.data_index) else {
            return false;
        };
        let bone_index = constraint.bone;
        let Some(bone) = self.bones.get_mut(bone_index) else {
            return false;
        };
        if !bone.active {
            return false;
        }

        let x = data.x > 0.0;
        let y = data.y > 0.0;
        let rotate_or_shear_x = data.rotate > 0.0 || data.shear_x > 0.0;
        let scale_x = data.scale_x > 0.0;
        let l = skeleton_data.bones[bone_index].length;
        let reference_scale = skeleton_data.reference_scale;
        let step = data.step;

        let mut mode = physics;
        if mode == Physics::Reset {
            constraint.reset(time);
            mode = Physics::Update;
        }

        let inertia = constraint.inertia;
        let (strength, damping, mass_inverse) =
            (constraint.strength, constraint.damping, constraint.mass_inverse);
        let (wind, gravity) = (constraint.wind, constraint.gravity);
        let s = &mut constraint.state;
        let mut z = 0.0f32;

        match mode {
            Physics::None | Physics::Reset => return false,
            Physics::Update => {
                let delta = (time - s.last_time).max(0.0);
                let aa = s.remaining;
                s.remaining += delta;
                s.last_time = time;

                let mut bx = bone.world_x;
                let mut by = bone.world_y;
                if s.reset {
                    s.reset = false;
                    s.ux = bx;
                    s.uy = by;
                } else {
                    let mut a = s.remaining;
                    let mut qx = data.limit * delta;
                    let qy = qx * skeleton_scale_y.abs();
                    qx *= skeleton_scale_x.abs();

                    let mut d = -1.0f32;
                    let mut m = 0.0f32;
                    let mut e = 0.0f32;

                    if x || y {
                        if x {
                            let u = (s.ux - bx) * inertia;
                            s.x_offset += u.clamp(-qx, qx);
                            s.ux = bx;
                        }
                        if y {
                            let u = (s.uy - by) * inertia;
                            s.y_offset += u.clamp(-qy, qy);
                            s.uy = by;
                        }
                        if a >= step {
                            let xs = s.x_offset;
                            let ys = s.y_offset;
                            d = damping.powf(60.0 * step);
                            m = step * mass_inverse;
                            e = strength;
                            let w = reference_scale * wind;
                            let g = reference_scale * gravity;
                            let ax = (w * wind_x + g * gravity_x) * skeleton_scale_x;
                            let ay = (w * wind_y + g * gravity_y) * skeleton_scale_y;
                            while a >= step {
                                if x {
                                    s.x_velocity += (ax - s.x_offset * e) * m;
                                    s.x_offset += s.x_velocity * step;
                                    s.x_velocity *= d;
                                }
                                if y {
                                    s.y_velocity -= (ay + s.y_offset * e) * m;
                                    s.y_offset += s.y_velocity * step;
                                    s.y_velocity *= d;
                                }
                                a -= step;
                            }
                            s.x_lag = s.x_offset - xs;
                            s.y_lag = s.y_offset - ys;
                        }
                        z = (1.0 - a / step).max(0.0);
                        if x {
                            bx += (s.x_offset - s.x_lag * z) * mix * data.x;
                        }
                        if y {
                            by += (s.y_offset - s.y_lag * z) * mix * data.y;
                        }
                    }

                    if rotate_or_shear_x || scale_x {
                        let ca = bone.c.atan2(bone.a);
                        let world_scale_x = (bone.a * bone.a + bone.c * bone.c).sqrt();
                        let mut mr = 0.0f32;
                        let dx = (s.cx - bx).clamp(-qx, qx);
                        let dy = (s.cy - by).clamp(-qy, qy);
                        let (mut sin, mut cos);

                        if rotate_or_shear_x {
                            mr = (data.rotate + data.shear_x) * mix;
                            let z0 = s.rotate_lag * (1.0 - aa / step).max(0.0);
                            let r = (dy + s.ty).atan2(dx + s.tx) - ca - (s.rotate_offset - z0) * mr;
                            s.rotate_offset += (r - (r * INV_PI_2 - 0.5).ceil() * PI_2) * inertia;
                            let r = (s.rotate_offset - z0) * mr + ca;
                            (sin, cos) = r.sin_cos();
                            if scale_x {
                                let r = l * world_scale_x;
                                if r > 0.0 {
                                    s.scale_offset += (dx * cos + dy * sin) * inertia / r;
                                }
                            }
                        } else {
                            (sin, cos) = ca.sin_cos();
                            let r = l * world_scale_x - s.scale_lag * (1.0 - aa / step).max(0.0);
                            if r > 0.0 {
                                s.scale_offset += (dx * cos + dy * sin) * inertia / r;
                            }
                        }

                        a = s.remaining;
                        if a >= step {
                            if d < 0.0 {
                                d = damping.powf(60.0 * step);
                                m = step * mass_inverse;
                                e = strength;
                            }
                            let ax = wind * wind_x + gravity * gravity_x;
                            let ay = wind * wind_y + gravity * gravity_y;
                            let h = if reference_scale.abs() > 1.0e-12 {
                                l / reference_scale
                            } else {
                                0.0
                            };
                            let rs = s.rotate_offset;
                            let ss = s.scale_offset;
                            loop {
                                a -= step;
                                if scale_x {
                                    s.scale_velocity += (ax * cos - ay * sin - s.scale_offset * e) * m;
                                    s.scale_offset += s.scale_velocity * step;
                                    s.scale_velocity *= d;
                                }
                                if rotate_or_shear_x {
                                    s.rotate_velocity -=
                                        ((ax * sin + ay * cos) * h + s.rotate_offset * e) * m;
                                    s.rotate_offset += s.rotate_velocity * step;
                                    s.rotate_velocity *= d;
                                    if a < step {
                                        break;
                                    }
                                    let r = s.rotate_offset * mr + ca;
                                    (sin, cos) = r.sin_cos();
                                } else if a < step {
                                    break;
                                }
                            }
                            s.rotate_lag = s.rotate_offset - rs;
                            s.scale_lag = s.scale_offset - ss;
                        }
                        z = (1.0 - a / step).max(0.0);
                    }
                    s.remaining = a;
                    bone.world_x = bx;
                    bone.world_y = by;
                }
                s.cx = bone.world_x;
                s.cy = bone.world_y;
            }
            Physics::Pose => {
                z = (1.0 - s.remaining / step).max(0.0);
                if x {
                    bone.world_x += (s.x_offset - s.x_lag * z) * mix * data.x;
                }
                if y {
                    bone.world_y += (s.y_offset - s.y_lag * z) * mix * data.y;
                }
            }
        }

        if rotate_or_shear_x {
            let mut o = (s.rotate_offset - s.rotate_lag * z) * mix;
            if data.shear_x > 0.0 {
                let mut r = 0.0;
                if data.rotate > 0.0 {
                    r = o * data.rotate;
                    let (sin, cos) = r.sin_cos();
                    let (b, d) = (bone.b, bone.d);
                    bone.b = cos * b - sin * d;
                    bone.d = sin * b + cos * d;
                }
                r += o * data.shear_x;
                let (sin, cos) = r.sin_cos();
                let (a, c) = (bone.a, bone.c);
                bone.a = cos * a - sin * c;
                bone.c = sin * a + cos * c;
            } else {
                o *= data.rotate;
                let (sin, cos) = o.sin_cos();
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }
        }

        if scale_x {
            let scale = 1.0 + (s.scale_offset - s.scale_lag * z) * mix * data.scale_x;
            bone.a *= scale;
            bone.c *= scale;
        }

        if mode != Physics::Pose {
            s.tx = l * bone.a;
            s.ty = l * bone.c;
        }
        true
    }
}
