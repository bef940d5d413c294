use crate::{BoneData, Inherit};

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub inherit: Inherit,
    pub active: bool,

    /// Local transform written by the host each frame.
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    /// Applied transform: the local transform after constraints.
    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,

    pub(crate) world_epoch: u32,
    pub(crate) stamp: u32,
    pub(crate) parent_stamp: u32,
}

impl Bone {
    pub(crate) fn from_data(data_index: usize, data: &BoneData) -> Self {
        Self {
            data_index,
            parent: data.parent,
            inherit: data.inherit,
            active: true,
            x: data.x,
            y: data.y,
            rotation: data.rotation,
            scale_x: data.scale_x,
            scale_y: data.scale_y,
            shear_x: data.shear_x,
            shear_y: data.shear_y,
            ax: data.x,
            ay: data.y,
            arotation: data.rotation,
            ascale_x: data.scale_x,
            ascale_y: data.scale_y,
            ashear_x: data.shear_x,
            ashear_y: data.shear_y,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
            world_epoch: 0,
            stamp: 0,
            parent_stamp: 0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.inherit = data.inherit;
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
        self.shear_x = data.shear_x;
        self.shear_y = data.shear_y;
        self.reset_applied();
    }

    pub(crate) fn reset_applied(&mut self) {
        self.ax = self.x;
        self.ay = self.y;
        self.arotation = self.rotation;
        self.ascale_x = self.scale_x;
        self.ascale_y = self.scale_y;
        self.ashear_x = self.shear_x;
        self.ashear_y = self.shear_y;
    }

    /// World rotation of the bone's x axis, in degrees.
    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    pub fn world_rotation_y(&self) -> f32 {
        self.d.atan2(self.b).to_degrees()
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn local_to_world(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.a * x + self.b * y + self.world_x,
            self.c * x + self.d * y + self.world_y,
        ]
    }

    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> [f32; 2] {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() <= f32::EPSILON {
            return [0.0, 0.0];
        }
        let x = world_x - self.world_x;
        let y = world_y - self.world_y;
        [
            (x * self.d - y * self.b) / det,
            (y * self.a - x * self.c) / det,
        ]
    }

    #[cfg(feature = "glam")]
    pub fn world_affine(&self) -> glam::Affine2 {
        glam::Affine2::from_cols_array(&[
            self.a,
            self.c,
            self.b,
            self.d,
            self.world_x,
            self.world_y,
        ])
    }

    pub(crate) fn frame(&self) -> ParentFrame {
        ParentFrame {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            world_x: self.world_x,
            world_y: self.world_y,
        }
    }
}

/// World matrix a bone composes with. Root bones use the skeleton's own frame.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ParentFrame {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

/// Skeleton-level placement applied to every root bone.
#[derive(Copy, Clone, Debug)]
pub(crate) struct SkeletonFrame {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl SkeletonFrame {
    pub fn as_parent(&self) -> ParentFrame {
        ParentFrame {
            a: self.scale_x,
            b: 0.0,
            c: 0.0,
            d: self.scale_y,
            world_x: self.x,
            world_y: self.y,
        }
    }
}

fn local_matrix(rotation: f32, shear_x: f32, shear_y: f32, scale_x: f32, scale_y: f32) -> [f32; 4] {
    let rx = (rotation + shear_x).to_radians();
    let ry = (rotation + 90.0 + shear_y).to_radians();
    [
        rx.cos() * scale_x,
        ry.cos() * scale_y,
        rx.sin() * scale_x,
        ry.sin() * scale_y,
    ]
}

pub(crate) fn update_world_root(bone: &mut Bone, skeleton: SkeletonFrame) {
    let [la, lb, lc, ld] = local_matrix(
        bone.arotation,
        bone.ashear_x,
        bone.ashear_y,
        bone.ascale_x,
        bone.ascale_y,
    );
    bone.a = la * skeleton.scale_x;
    bone.b = lb * skeleton.scale_x;
    bone.c = lc * skeleton.scale_y;
    bone.d = ld * skeleton.scale_y;
    bone.world_x = bone.ax * skeleton.scale_x + skeleton.x;
    bone.world_y = bone.ay * skeleton.scale_y + skeleton.y;
}

pub(crate) fn update_world_child(bone: &mut Bone, parent: ParentFrame, skeleton: SkeletonFrame) {
    let ParentFrame {
        a: mut pa,
        b: mut pb,
        c: mut pc,
        d: mut pd,
        ..
    } = parent;
    let (sx, sy) = (skeleton.scale_x, skeleton.scale_y);

    bone.world_x = pa * bone.ax + pb * bone.ay + parent.world_x;
    bone.world_y = pc * bone.ax + pd * bone.ay + parent.world_y;

    match bone.inherit {
        Inherit::Normal => {
            let [la, lb, lc, ld] = local_matrix(
                bone.arotation,
                bone.ashear_x,
                bone.ashear_y,
                bone.ascale_x,
                bone.ascale_y,
            );
            bone.a = pa * la + pb * lc;
            bone.b = pa * lb + pb * ld;
            bone.c = pc * la + pd * lc;
            bone.d = pc * lb + pd * ld;
            return;
        }
        Inherit::OnlyTranslation => {
            let [la, lb, lc, ld] = local_matrix(
                bone.arotation,
                bone.ashear_x,
                bone.ashear_y,
                bone.ascale_x,
                bone.ascale_y,
            );
            bone.a = la;
            bone.b = lb;
            bone.c = lc;
            bone.d = ld;
        }
        Inherit::NoRotationOrReflection => {
            let inv_sx = if sx.abs() > 1.0e-12 { 1.0 / sx } else { 0.0 };
            let inv_sy = if sy.abs() > 1.0e-12 { 1.0 / sy } else { 0.0 };
            pa *= inv_sx;
            pc *= inv_sy;
            let mut s = pa * pa + pc * pc;
            let prx;
            if s > 1.0e-4 {
                s = (pa * pd * inv_sy - pb * inv_sx * pc).abs() / s;
                pb = pc * s;
                pd = pa * s;
                prx = pc.atan2(pa).to_degrees();
            } else {
                pa = 0.0;
                pc = 0.0;
                prx = 90.0 - pd.atan2(pb).to_degrees();
            }
            let [la, lb, lc, ld] = local_matrix(
                bone.arotation - prx,
                bone.ashear_x,
                bone.ashear_y,
                bone.ascale_x,
                bone.ascale_y,
            );
            bone.a = pa * la - pb * lc;
            bone.b = pa * lb - pb * ld;
            bone.c = pc * la + pd * lc;
            bone.d = pc * lb + pd * ld;
        }
        Inherit::NoScale | Inherit::NoScaleOrReflection => {
            let rotation = bone.arotation.to_radians();
            let (sin, cos) = rotation.sin_cos();
            let mut za = (pa * cos + pb * sin) / sx;
            let mut zc = (pc * cos + pd * sin) / sy;
            let mut s = (za * za + zc * zc).sqrt();
            if s > 1.0e-5 {
                s = 1.0 / s;
            }
            za *= s;
            zc *= s;
            let mut s = (za * za + zc * zc).sqrt();
            if bone.inherit == Inherit::NoScale
                && ((pa * pd - pb * pc < 0.0) != ((sx < 0.0) != (sy < 0.0)))
            {
                s = -s;
            }
            let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
            let zb = r.cos() * s;
            let zd = r.sin() * s;
            let [la, lb, lc, ld] =
                local_matrix(0.0, bone.ashear_x, bone.ashear_y, bone.ascale_x, bone.ascale_y);
            bone.a = za * la + zb * lc;
            bone.b = za * lb + zb * ld;
            bone.c = zc * la + zd * lc;
            bone.d = zc * lb + zd * ld;
        }
    }

    bone.a *= sx;
    bone.b *= sx;
    bone.c *= sy;
    bone.d *= sy;
}

/// Recomputes the applied transform from the current world matrix, so local-space
/// consumers see the result of world-space constraints.
pub(crate) fn update_applied_from_world(
    bone: &mut Bone,
    parent: Option<ParentFrame>,
    skeleton: SkeletonFrame,
) {
    let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);

    let (sx, sy) = (skeleton.scale_x, skeleton.scale_y);
    let Some(parent) = parent else {
        let isx = if sx != 0.0 { 1.0 / sx } else { 0.0 };
        let isy = if sy != 0.0 { 1.0 / sy } else { 0.0 };
        bone.ax = (bone.world_x - skeleton.x) * isx;
        bone.ay = (bone.world_y - skeleton.y) * isy;
        decompose_applied(bone, a * isx, b * isx, c * isy, d * isy);
        return;
    };

    let ParentFrame {
        a: pa,
        b: mut pb,
        c: pc,
        d: mut pd,
        ..
    } = parent;
    let det = pa * pd - pb * pc;
    let mut pid = 1.0 / det;
    let mut ia = pd * pid;
    let mut ib = pb * pid;
    let mut ic = pc * pid;
    let mut id = pa * pid;

    let dx = bone.world_x - parent.world_x;
    let dy = bone.world_y - parent.world_y;
    bone.ax = dx * ia - dy * ib;
    bone.ay = dy * id - dx * ic;

    let (ra, rb, rc, rd) = if bone.inherit == Inherit::OnlyTranslation {
        (a, b, c, d)
    } else {
        match bone.inherit {
            Inherit::NoRotationOrReflection => {
                let s = det.abs() / (pa * pa + pc * pc);
                pb = -pc * sx * s / sy;
                pd = pa * sy * s / sx;
                pid = 1.0 / (pa * pd - pb * pc);
                ia = pd * pid;
                ib = pb * pid;
            }
            Inherit::NoScale | Inherit::NoScaleOrReflection => {
                let (sin, cos) = bone.arotation.to_radians().sin_cos();
                let mut za = (pa * cos + pb * sin) / sx;
                let mut zc = (pc * cos + pd * sin) / sy;
                let mut s = (za * za + zc * zc).sqrt();
                if s > 1.0e-5 {
                    s = 1.0 / s;
                }
                za *= s;
                zc *= s;
                let mut s = (za * za + zc * zc).sqrt();
                if bone.inherit == Inherit::NoScale && ((det < 0.0) != ((sx < 0.0) != (sy < 0.0)))
                {
                    s = -s;
                }
                let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
                pb = r.cos() * s;
                pd = r.sin() * s;
                pid = 1.0 / (za * pd - pb * zc);
                ia = pd * pid;
                ib = pb * pid;
                ic = zc * pid;
                id = za * pid;
            }
            _ => {}
        }
        (ia * a - ib * c, ia * b - ib * d, id * c - ic * a, id * d - ic * b)
    };

    decompose_applied(bone, ra, rb, rc, rd);
}

fn decompose_applied(bone: &mut Bone, ra: f32, rb: f32, rc: f32, rd: f32) {
    bone.ashear_x = 0.0;
    let scale_x = (ra * ra + rc * rc).sqrt();
    if scale_x > 1.0e-4 {
        let det = ra * rd - rb * rc;
        bone.ascale_x = scale_x;
        bone.ascale_y = det / scale_x;
        bone.ashear_y = -(ra * rb + rc * rd).atan2(det).to_degrees();
        bone.arotation = rc.atan2(ra).to_degrees();
    } else {
        bone.ascale_x = 0.0;
        bone.ascale_y = (rb * rb + rd * rd).sqrt();
        bone.ashear_y = 0.0;
        bone.arotation = 90.0 - rd.atan2(rb).to_degrees();
    }
}

/// Wraps degrees into `(-180, 180]`.
pub(crate) fn shortest_rotation(degrees: f32) -> f32 {
    let degrees = degrees.rem_euclid(360.0);
    if degrees > 180.0 {
        degrees - 360.0
    } else {
        degrees
    }
}

pub(crate) fn wrap_pi(radians: f32) -> f32 {
    use std::f32::consts::PI;
    if radians > PI {
        radians - 2.0 * PI
    } else if radians < -PI {
        radians + 2.0 * PI
    } else {
        radians
    }
}
