use crate::Error;
use std::collections::HashMap;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BoneData {
    pub name: String,
    /// Index of the parent bone. Parents always precede their children.
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub inherit: Inherit,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            ..Self::default()
        }
    }
}

impl Default for BoneData {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: None,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            inherit: Inherit::Normal,
        }
    }
}

/// How a bone composes its parent's world transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Inherit {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub attachment: Option<String>,
    pub color: [f32; 4],
    /// Tint-black color. `None` disables two-color tinting for the slot.
    pub dark_color: Option<[f32; 3]>,
    pub blend: BlendMode,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            ..Self::default()
        }
    }
}

impl Default for SlotData {
    fn default() -> Self {
        Self {
            name: String::new(),
            bone: 0,
            attachment: None,
            color: [1.0; 4],
            dark_color: None,
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IkConstraintData {
    pub name: String,
    pub order: i32,
    /// One bone, or a parent and its direct child.
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
}

impl Default for IkConstraintData {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: 0,
            bones: Vec::new(),
            target: 0,
            mix: 1.0,
            softness: 0.0,
            bend_direction: 1,
            compress: false,
            stretch: false,
            uniform: false,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransformConstraintData {
    pub name: String,
    pub order: i32,
    pub bones: Vec<usize>,
    pub target: usize,
    pub local: bool,
    pub relative: bool,

    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,

    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
}

impl Default for TransformConstraintData {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: 0,
            bones: Vec::new(),
            target: 0,
            local: false,
            relative: false,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
            mix_scale_x: 1.0,
            mix_scale_y: 1.0,
            mix_shear_y: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PositionMode {
    Fixed,
    #[default]
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpacingMode {
    #[default]
    Length,
    Fixed,
    Percent,
    Proportional,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathConstraintData {
    pub name: String,
    pub order: i32,
    pub bones: Vec<usize>,
    /// Slot whose current attachment must be a path.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
}

impl Default for PathConstraintData {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: 0,
            bones: Vec::new(),
            target: 0,
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhysicsConstraintData {
    pub name: String,
    pub order: i32,
    pub bone: usize,

    pub x: f32,
    pub y: f32,
    pub rotate: f32,
    pub scale_x: f32,
    pub shear_x: f32,
    pub limit: f32,
    pub step: f32,

    pub inertia: f32,
    pub strength: f32,
    pub damping: f32,
    pub mass_inverse: f32,
    pub wind: f32,
    pub gravity: f32,
    pub mix: f32,
}

impl Default for PhysicsConstraintData {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: 0,
            bone: 0,
            x: 0.0,
            y: 0.0,
            rotate: 0.0,
            scale_x: 0.0,
            shear_x: 0.0,
            limit: 5000.0,
            step: 1.0 / 60.0,
            inertia: 1.0,
            strength: 100.0,
            damping: 1.0,
            mass_inverse: 1.0,
            wind: 0.0,
            gravity: 0.0,
            mix: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

/// Attachment-local vertex positions, either bound to the slot's bone or
/// weighted across several bones.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttachmentVertices {
    Unweighted(Vec<[f32; 2]>),
    Weighted(Vec<Vec<VertexWeight>>),
}

impl AttachmentVertices {
    pub fn len(&self) -> usize {
        match self {
            Self::Unweighted(v) => v.len(),
            Self::Weighted(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AttachmentVertices {
    fn default() -> Self {
        Self::Unweighted(Vec::new())
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegionAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for RegionAttachmentData {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            color: [1.0; 4],
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeshAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub vertices: AttachmentVertices,
    /// UVs relative to the texture region, one pair per vertex.
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u32>,
}

impl Default for MeshAttachmentData {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            color: [1.0; 4],
            vertices: AttachmentVertices::default(),
            uvs: Vec::new(),
            triangles: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClippingAttachmentData {
    pub name: String,
    pub vertices: AttachmentVertices,
    /// Clipping stops after this slot has been drawn.
    pub end_slot: Option<usize>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathAttachmentData {
    pub name: String,
    /// Bezier control points: `[in, point, out]` per path vertex.
    pub vertices: AttachmentVertices,
    /// Cumulative curve lengths, used when `constant_speed` is false.
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum AttachmentData {
    Region(RegionAttachmentData),
    Mesh(MeshAttachmentData),
    Clipping(ClippingAttachmentData),
    Path(PathAttachmentData),
}

impl AttachmentData {
    pub fn name(&self) -> &str {
        match self {
            AttachmentData::Region(a) => a.name.as_str(),
            AttachmentData::Mesh(a) => a.name.as_str(),
            AttachmentData::Clipping(a) => a.name.as_str(),
            AttachmentData::Path(a) => a.name.as_str(),
        }
    }
}

/// Immutable skeleton template shared by every [`crate::Skeleton`] instance.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SkeletonData {
    pub reference_scale: f32,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    /// Attachments available to each slot, keyed by attachment name.
    pub attachments: Vec<HashMap<String, AttachmentData>>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
    pub physics_constraints: Vec<PhysicsConstraintData>,
}

impl Default for SkeletonData {
    fn default() -> Self {
        Self {
            reference_scale: 100.0,
            bones: Vec::new(),
            slots: Vec::new(),
            attachments: Vec::new(),
            ik_constraints: Vec::new(),
            transform_constraints: Vec::new(),
            path_constraints: Vec::new(),
            physics_constraints: Vec::new(),
        }
    }
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&AttachmentData> {
        self.attachments
            .get(slot_index)
            .and_then(|attachments| attachments.get(name))
    }

    /// Registers `attachment` under its own name for `slot_index`.
    pub fn add_attachment(&mut self, slot_index: usize, attachment: AttachmentData) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(attachment.name().to_string(), attachment);
    }

    pub fn constraint_count(&self) -> usize {
        self.ik_constraints.len()
            + self.transform_constraints.len()
            + self.path_constraints.len()
            + self.physics_constraints.len()
    }

    /// Checks every cross reference and rejects constraints sharing an `order`.
    pub fn validate(&self) -> Result<(), Error> {
        let bone_count = self.bones.len();
        let slot_count = self.slots.len();
        let check_bone = |index: usize, context: &str| -> Result<(), Error> {
            if index < bone_count {
                Ok(())
            } else {
                Err(Error::invalid(format!(
                    "{context} references bone index {index} (bone count {bone_count})"
                )))
            }
        };

        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(Error::invalid(format!(
                        "bone '{}' must come after its parent (parent index {parent})",
                        bone.name
                    )));
                }
            }
        }

        for slot in &self.slots {
            check_bone(slot.bone, &format!("slot '{}'", slot.name))?;
        }
        if self.attachments.len() > slot_count {
            return Err(Error::invalid(format!(
                "attachments declared for {} slots but only {slot_count} slots exist",
                self.attachments.len()
            )));
        }
        for (slot_index, slot) in self.slots.iter().enumerate() {
            if let Some(name) = slot.attachment.as_deref() {
                if self.attachment(slot_index, name).is_none() {
                    return Err(Error::UnknownAttachment {
                        slot: slot.name.clone(),
                        name: name.to_string(),
                    });
                }
            }
        }
        for attachments in &self.attachments {
            for attachment in attachments.values() {
                self.validate_attachment(attachment)?;
            }
        }

        for ik in &self.ik_constraints {
            let context = format!("IK constraint '{}'", ik.name);
            check_bone(ik.target, &context)?;
            for &bone in &ik.bones {
                check_bone(bone, &context)?;
            }
            match ik.bones.as_slice() {
                [_] => {}
                [parent, child] => {
                    if self.bones[*child].parent != Some(*parent) {
                        return Err(Error::invalid(format!(
                            "{context}: second bone must be a child of the first"
                        )));
                    }
                }
                _ => {
                    return Err(Error::invalid(format!(
                        "{context}: expected 1 or 2 bones, got {}",
                        ik.bones.len()
                    )));
                }
            }
            if ik.bones.contains(&ik.target) {
                return Err(Error::invalid(format!(
                    "{context}: target is one of its own bones"
                )));
            }
        }

        for c in &self.transform_constraints {
            let context = format!("transform constraint '{}'", c.name);
            check_bone(c.target, &context)?;
            for &bone in &c.bones {
                check_bone(bone, &context)?;
            }
            if c.bones.contains(&c.target) {
                return Err(Error::invalid(format!(
                    "{context}: target is one of its own bones"
                )));
            }
        }

        for c in &self.path_constraints {
            let context = format!("path constraint '{}'", c.name);
            if c.target >= slot_count {
                return Err(Error::invalid(format!(
                    "{context} references slot index {} (slot count {slot_count})",
                    c.target
                )));
            }
            for &bone in &c.bones {
                check_bone(bone, &context)?;
            }
        }

        for c in &self.physics_constraints {
            let context = format!("physics constraint '{}'", c.name);
            check_bone(c.bone, &context)?;
            if !(c.step.is_finite() && c.step > 0.0) {
                return Err(Error::invalid(format!(
                    "{context}: step must be finite and positive, got {}",
                    c.step
                )));
            }
            if !(c.limit.is_finite() && c.limit >= 0.0) {
                return Err(Error::invalid(format!(
                    "{context}: limit must be finite and non-negative, got {}",
                    c.limit
                )));
            }
        }

        let mut orders: HashMap<i32, &str> = HashMap::new();
        let named_orders = self
            .ik_constraints
            .iter()
            .map(|c| (c.order, c.name.as_str()))
            .chain(
                self.transform_constraints
                    .iter()
                    .map(|c| (c.order, c.name.as_str())),
            )
            .chain(
                self.path_constraints
                    .iter()
                    .map(|c| (c.order, c.name.as_str())),
            )
            .chain(
                self.physics_constraints
                    .iter()
                    .map(|c| (c.order, c.name.as_str())),
            );
        for (order, name) in named_orders {
            if let Some(first) = orders.insert(order, name) {
                return Err(Error::DuplicateConstraintOrder {
                    order,
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_attachment(&self, attachment: &AttachmentData) -> Result<(), Error> {
        let vertices = match attachment {
            AttachmentData::Region(_) => return Ok(()),
            AttachmentData::Mesh(mesh) => {
                if mesh.uvs.len() != mesh.vertices.len() {
                    return Err(Error::invalid(format!(
                        "mesh '{}' has {} uvs for {} vertices",
                        mesh.name,
                        mesh.uvs.len(),
                        mesh.vertices.len()
                    )));
                }
                let vertex_count = mesh.vertices.len();
                if mesh.triangles.len() % 3 != 0
                    || mesh.triangles.iter().any(|&t| t as usize >= vertex_count)
                {
                    return Err(Error::invalid(format!(
                        "mesh '{}' has an invalid triangle list",
                        mesh.name
                    )));
                }
                &mesh.vertices
            }
            AttachmentData::Clipping(clip) => {
                if let Some(end_slot) = clip.end_slot {
                    if end_slot >= self.slots.len() {
                        return Err(Error::invalid(format!(
                            "clipping '{}' ends at unknown slot index {end_slot}",
                            clip.name
                        )));
                    }
                }
                &clip.vertices
            }
            AttachmentData::Path(path) => &path.vertices,
        };

        if let AttachmentVertices::Weighted(vertices) = vertices {
            let bone_count = self.bones.len();
            if vertices.iter().flatten().any(|w| w.bone >= bone_count) {
                return Err(Error::invalid(format!(
                    "attachment '{}' is weighted to an unknown bone",
                    attachment.name()
                )));
            }
        }
        Ok(())
    }
}
