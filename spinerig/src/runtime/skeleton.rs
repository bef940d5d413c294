use super::bone::{
    Bone, ParentFrame, SkeletonFrame, update_applied_from_world, update_world_child,
    update_world_root,
};
use super::update_cache::{UpdateCache, UpdateCacheItem};
use super::{IkConstraint, PathConstraint, Physics, PhysicsConstraint, TransformConstraint};
use crate::{BlendMode, Error, SkeletonData, SlotData};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    /// Name of the attachment shown by this slot, looked up in the slot's attachment table.
    pub attachment: Option<String>,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    pub blend: BlendMode,
}

impl Slot {
    fn from_data(data_index: usize, data: &SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            attachment: data.attachment.clone(),
            color: data.color,
            dark_color: data.dark_color,
            blend: data.blend,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    fn set_to_setup_pose(&mut self, data: &SlotData) {
        self.color = data.color;
        self.dark_color = data.dark_color;
        self.blend = data.blend;
        self.attachment = data.attachment.clone();
    }
}

/// A posed instance of [`SkeletonData`].
///
/// Hosts write local transforms into [`Skeleton::bones`], then call
/// [`Skeleton::update_world_transform`] once per frame.
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    pub physics_constraints: Vec<PhysicsConstraint>,

    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,

    pub(crate) bone_children: Vec<Vec<usize>>,
    draw_order: Vec<usize>,

    pub(crate) wind_x: f32,
    pub(crate) wind_y: f32,
    pub(crate) gravity_x: f32,
    pub(crate) gravity_y: f32,
    pub(crate) time: f32,

    update_epoch: u32,
    world_stamp: u32,
    pub(crate) cache: UpdateCache,
    pub(crate) cache_dirty: bool,
}

impl Skeleton {
    /// Validates `data`, poses the skeleton in its setup pose and builds the update cache.
    pub fn new(data: Arc<SkeletonData>) -> Result<Self, Error> {
        data.validate()?;

        let bones: Vec<Bone> = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| Bone::from_data(i, b))
            .collect();
        let bone_children = build_bone_children(&bones);
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| Slot::from_data(i, s))
            .collect();
        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| IkConstraint::from_data(i, c))
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| TransformConstraint::from_data(i, c))
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| PathConstraint::from_data(i, c))
            .collect();
        let physics_constraints = data
            .physics_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| PhysicsConstraint::from_data(i, c))
            .collect();

        let mut out = Self {
            draw_order: (0..data.slots.len()).collect(),
            data,
            bones,
            slots,
            ik_constraints,
            transform_constraints,
            path_constraints,
            physics_constraints,
            color: [1.0; 4],
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            bone_children,
            wind_x: 1.0,
            wind_y: 0.0,
            gravity_x: 0.0,
            gravity_y: 1.0,
            time: 0.0,
            update_epoch: 0,
            world_stamp: 0,
            cache: UpdateCache::default(),
            cache_dirty: true,
        };
        out.set_to_setup_pose();
        out.update_cache();
        Ok(out)
    }

    pub fn find_bone_index(&self, name: &str) -> Result<usize, Error> {
        self.data.find_bone(name).ok_or_else(|| Error::UnknownBone {
            name: name.to_string(),
        })
    }

    pub fn find_slot_index(&self, name: &str) -> Result<usize, Error> {
        self.data.find_slot(name).ok_or_else(|| Error::UnknownSlot {
            name: name.to_string(),
        })
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(self.data.find_bone(name)?)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        let index = self.data.find_bone(name)?;
        self.bones.get_mut(index)
    }

    /// Activates or deactivates a bone. Deactivating cascades to descendants;
    /// activating also activates every ancestor. The update cache is rebuilt on the
    /// next world transform update.
    pub fn set_bone_active(&mut self, bone_index: usize, active: bool) -> Result<(), Error> {
        if bone_index >= self.bones.len() {
            return Err(Error::invalid(format!(
                "bone index {bone_index} out of range ({} bones)",
                self.bones.len()
            )));
        }
        if active {
            let mut cur = Some(bone_index);
            while let Some(i) = cur {
                self.bones[i].active = true;
                cur = self.bones[i].parent_index();
            }
        } else {
            let mut stack = vec![bone_index];
            while let Some(i) = stack.pop() {
                self.bones[i].active = false;
                stack.extend_from_slice(&self.bone_children[i]);
            }
        }
        self.cache_dirty = true;
        Ok(())
    }

    /// Shows `attachment_name` in the named slot, or clears it with `None`.
    pub fn set_attachment(
        &mut self,
        slot_name: &str,
        attachment_name: Option<&str>,
    ) -> Result<(), Error> {
        let slot_index = self.find_slot_index(slot_name)?;
        if let Some(name) = attachment_name {
            if self.data.attachment(slot_index, name).is_none() {
                return Err(Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    name: name.to_string(),
                });
            }
        }
        self.slots[slot_index].attachment = attachment_name.map(str::to_string);
        if self.path_constraints.iter().any(|c| c.target == slot_index) {
            self.cache_dirty = true;
        }
        Ok(())
    }

    /// Slot indices in the order they are drawn.
    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    /// Replaces the draw order. `order` must be a permutation of all slot indices.
    pub fn set_draw_order(&mut self, order: Vec<usize>) -> Result<(), Error> {
        let slot_count = self.slots.len();
        if order.len() != slot_count {
            return Err(Error::invalid(format!(
                "draw order has {} entries, expected {slot_count}",
                order.len()
            )));
        }
        let mut seen = vec![false; slot_count];
        for &slot in &order {
            if slot >= slot_count || std::mem::replace(&mut seen[slot], true) {
                return Err(Error::invalid(format!(
                    "draw order entry {slot} is out of range or repeated"
                )));
            }
        }
        self.draw_order = order;
        Ok(())
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Restores bone local transforms and constraint mixes.
    pub fn set_bones_to_setup_pose(&mut self) {
        let data = Arc::clone(&self.data);
        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.set_to_setup_pose(bone_data);
        }
        for c in &mut self.ik_constraints {
            if let Some(d) = data.ik_constraints.get(c.data_index()) {
                c.set_to_setup_pose(d);
            }
        }
        for c in &mut self.transform_constraints {
            if let Some(d) = data.transform_constraints.get(c.data_index()) {
                c.set_to_setup_pose(d);
            }
        }
        for c in &mut self.path_constraints {
            if let Some(d) = data.path_constraints.get(c.data_index()) {
                c.set_to_setup_pose(d);
            }
        }
        for c in &mut self.physics_constraints {
            if let Some(d) = data.physics_constraints.get(c.data_index()) {
                c.set_to_setup_pose(d);
            }
        }
    }

    /// Restores slot colors, attachments and the draw order.
    pub fn set_slots_to_setup_pose(&mut self) {
        let data = Arc::clone(&self.data);
        let mut path_slot_changed = false;
        for (i, (slot, slot_data)) in self.slots.iter_mut().zip(&data.slots).enumerate() {
            if slot.attachment != slot_data.attachment
                && self.path_constraints.iter().any(|c| c.target == i)
            {
                path_slot_changed = true;
            }
            slot.set_to_setup_pose(slot_data);
        }
        if path_slot_changed {
            self.cache_dirty = true;
        }
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        if time.is_finite() {
            self.time = time;
        }
    }

    /// Advances the physics clock.
    pub fn update(&mut self, delta: f32) {
        if delta.is_finite() && delta >= 0.0 {
            self.time += delta;
        }
    }

    pub fn set_wind(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.wind_x = x;
            self.wind_y = y;
        }
    }

    pub fn set_gravity(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.gravity_x = x;
            self.gravity_y = y;
        }
    }

    /// Clears the motion of every physics constraint.
    pub fn reset_physics(&mut self) {
        let time = self.time;
        for c in &mut self.physics_constraints {
            c.reset(time);
        }
    }

    /// Makes every physics constraint react as if the skeleton had moved by `(x, y)`.
    pub fn physics_translate(&mut self, x: f32, y: f32) {
        for c in &mut self.physics_constraints {
            c.translate(x, y);
        }
    }

    pub fn physics_rotate(&mut self, x: f32, y: f32, degrees: f32) {
        for c in &mut self.physics_constraints {
            c.rotate(x, y, degrees);
        }
    }

    pub fn update_world_transform(&mut self) {
        self.update_world_transform_with_physics(Physics::None);
    }

    /// Walks the update cache once: bones are composed ancestor-first and every
    /// constraint is applied in `order`.
    pub fn update_world_transform_with_physics(&mut self, physics: Physics) {
        if self.cache_dirty {
            self.update_cache();
        }

        self.update_epoch = self.update_epoch.wrapping_add(1);
        if self.update_epoch == 0 {
            self.update_epoch = 1;
        }
        for bone in &mut self.bones {
            bone.reset_applied();
        }

        let cache = std::mem::take(&mut self.cache);
        for (item, links) in cache.items.iter().zip(&cache.links) {
            let (applied, local) = match *item {
                UpdateCacheItem::Bone(i) => {
                    self.ensure_bone_world(i);
                    continue;
                }
                UpdateCacheItem::Ik(i) => {
                    if !self.ik_constraints[i].active {
                        continue;
                    }
                    self.ensure_bones_world(&links.dependencies);
                    self.ensure_bones_world(&links.affected);
                    (self.apply_ik_constraint(i), true)
                }
                UpdateCacheItem::Transform(i) => {
                    if !self.transform_constraints[i].active {
                        continue;
                    }
                    self.ensure_bones_world(&links.dependencies);
                    self.ensure_bones_world(&links.affected);
                    let local = self
                        .data
                        .transform_constraints
                        .get(self.transform_constraints[i].data_index())
                        .is_some_and(|d| d.local);
                    (self.apply_transform_constraint(i), local)
                }
                UpdateCacheItem::Path(i) => {
                    if !self.path_constraints[i].active {
                        continue;
                    }
                    self.ensure_bones_world(&links.dependencies);
                    self.ensure_bones_world(&links.affected);
                    (self.apply_path_constraint(i), false)
                }
                UpdateCacheItem::Physics(i) => {
                    if !self.physics_constraints[i].active {
                        continue;
                    }
                    self.ensure_bones_world(&links.affected);
                    (self.apply_physics_constraint(i, physics), false)
                }
            };
            if !applied {
                continue;
            }
            if local {
                self.recompute_from_applied(&links.affected);
            } else {
                self.sync_applied_from_world(&links.affected);
            }
            self.ensure_bones_world(&links.refresh);
        }
        self.cache = cache;
    }

    pub(crate) fn skeleton_frame(&self) -> SkeletonFrame {
        SkeletonFrame {
            x: self.x,
            y: self.y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// World matrix of the bone's parent, or the skeleton frame for a root bone.
    pub(crate) fn parent_frame(&self, bone_index: usize) -> ParentFrame {
        self.bones
            .get(bone_index)
            .and_then(Bone::parent_index)
            .and_then(|p| self.bones.get(p))
            .map(Bone::frame)
            .unwrap_or_else(|| self.skeleton_frame().as_parent())
    }

    fn next_stamp(&mut self) -> u32 {
        self.world_stamp = self.world_stamp.wrapping_add(1);
        if self.world_stamp == 0 {
            self.world_stamp = 1;
        }
        self.world_stamp
    }

    fn ensure_bones_world(&mut self, bones: &[usize]) {
        for &bone in bones {
            self.ensure_bone_world(bone);
        }
    }

    /// Computes the bone's world transform unless it is already current for this update
    /// and its parent has not changed since.
    fn ensure_bone_world(&mut self, bone_index: usize) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        if !bone.active {
            return;
        }
        let parent = bone.parent_index();
        let parent_stamp = match parent {
            Some(p) => {
                self.ensure_bone_world(p);
                self.bones[p].stamp
            }
            None => 0,
        };
        let epoch = self.update_epoch;
        let bone = &self.bones[bone_index];
        if bone.world_epoch == epoch && bone.parent_stamp == parent_stamp {
            return;
        }

        let skeleton = self.skeleton_frame();
        let parent_frame = parent.map(|p| self.bones[p].frame());
        let stamp = self.next_stamp();
        let bone = &mut self.bones[bone_index];
        match parent_frame {
            Some(frame) => update_world_child(bone, frame, skeleton),
            None => update_world_root(bone, skeleton),
        }
        bone.world_epoch = epoch;
        bone.stamp = stamp;
        bone.parent_stamp = parent_stamp;
    }

    /// After a constraint rewrote applied values: recompute world ancestor-first.
    fn recompute_from_applied(&mut self, bones: &[usize]) {
        for &bone in bones {
            if let Some(b) = self.bones.get_mut(bone) {
                b.world_epoch = 0;
            }
        }
        self.ensure_bones_world(bones);
    }

    /// After a constraint rewrote world matrices: derive applied values from them so the
    /// bone can be recomposed later without losing the effect.
    fn sync_applied_from_world(&mut self, bones: &[usize]) {
        let skeleton = self.skeleton_frame();
        for &bone_index in bones {
            let Some(bone) = self.bones.get(bone_index) else {
                continue;
            };
            if !bone.active {
                continue;
            }
            let parent = bone
                .parent_index()
                .and_then(|p| self.bones.get(p))
                .map(Bone::frame);
            let stamp = self.next_stamp();
            let bone = &mut self.bones[bone_index];
            update_applied_from_world(bone, parent, skeleton);
            bone.stamp = stamp;
        }
        for &bone_index in bones {
            let Some(parent) = self.bones.get(bone_index).and_then(Bone::parent_index) else {
                continue;
            };
            if bones.contains(&parent) {
                self.bones[bone_index].parent_stamp = self.bones[parent].stamp;
            }
        }
    }
}

fn build_bone_children(bones: &[Bone]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::new(); bones.len()];
    for (i, bone) in bones.iter().enumerate() {
        if let Some(list) = bone.parent_index().and_then(|p| children.get_mut(p)) {
            list.push(i);
        }
    }
    children
}
