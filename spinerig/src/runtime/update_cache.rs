use super::bone::Bone;
use crate::{AttachmentData, AttachmentVertices, Skeleton};

/// One step of a world transform update.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
    Path(usize),
    Physics(usize),
}

/// The flattened update order with the bone sets each item touches, parallel to `items`.
#[derive(Clone, Debug, Default)]
pub(crate) struct UpdateCache {
    pub(crate) items: Vec<UpdateCacheItem>,
    pub(crate) links: Vec<ItemLinks>,
}

/// Empty for bone items.
#[derive(Clone, Debug, Default)]
pub(crate) struct ItemLinks {
    /// Bones read by the constraint.
    pub(crate) dependencies: Vec<usize>,
    /// Bones written by the constraint.
    pub(crate) affected: Vec<usize>,
    /// Already-placed descendants of `affected`, in cache order. They are recomputed
    /// after the constraint ran.
    pub(crate) refresh: Vec<usize>,
}

/// The bones a constraint reads and the bones it writes.
struct ConstraintBones {
    active: bool,
    dependencies: Vec<usize>,
    affected: Vec<usize>,
}

impl Skeleton {
    /// Rebuilds the update order from the current bone `active` flags.
    pub fn update_cache(&mut self) {
        self.refresh_constraint_activity();
        self.rebuild_update_cache();
        self.cache_dirty = false;
        log::debug!(
            "rebuilt update cache: {} items ({} bones, {} constraints)",
            self.cache.items.len(),
            self.bones.len(),
            self.data.constraint_count()
        );
    }

    /// Marks every bone active, then rebuilds the update order.
    pub fn full_update_cache(&mut self) {
        for bone in &mut self.bones {
            bone.active = true;
        }
        self.update_cache();
    }

    pub fn update_cache_items(&self) -> &[UpdateCacheItem] {
        &self.cache.items
    }

    fn refresh_constraint_activity(&mut self) {
        let bones = &self.bones;
        let is_active = |index: usize| bones.get(index).is_some_and(|b| b.active);
        let any_active = |indices: &[usize]| indices.iter().any(|&i| is_active(i));

        for c in &mut self.ik_constraints {
            c.active = is_active(c.target) && any_active(&c.bones);
        }
        for c in &mut self.transform_constraints {
            c.active = is_active(c.target) && any_active(&c.bones);
        }
        for c in &mut self.path_constraints {
            let slot_bone_active = self.slots.get(c.target).is_some_and(|s| is_active(s.bone));
            c.active = slot_bone_active && any_active(&c.bones);
        }
        for c in &mut self.physics_constraints {
            c.active = is_active(c.bone);
        }
    }

    fn constraint_bones(&self, item: UpdateCacheItem) -> ConstraintBones {
        match item {
            UpdateCacheItem::Ik(i) => {
                let c = &self.ik_constraints[i];
                ConstraintBones {
                    active: c.active,
                    dependencies: vec![c.target],
                    affected: c.bones.clone(),
                }
            }
            UpdateCacheItem::Transform(i) => {
                let c = &self.transform_constraints[i];
                ConstraintBones {
                    active: c.active,
                    dependencies: vec![c.target],
                    affected: c.bones.clone(),
                }
            }
            UpdateCacheItem::Path(i) => {
                let c = &self.path_constraints[i];
                let dependencies = match self.slot_attachment(c.target) {
                    Some(AttachmentData::Path(path)) => match &path.vertices {
                        AttachmentVertices::Weighted(vertices) => vertices
                            .iter()
                            .flat_map(|weights| weights.iter().map(|w| w.bone))
                            .collect(),
                        AttachmentVertices::Unweighted(_) => {
                            self.slots.get(c.target).map(|s| s.bone).into_iter().collect()
                        }
                    },
                    _ => self.slots.get(c.target).map(|s| s.bone).into_iter().collect(),
                };
                ConstraintBones {
                    active: c.active,
                    dependencies,
                    affected: c.bones.clone(),
                }
            }
            UpdateCacheItem::Physics(i) => {
                let c = &self.physics_constraints[i];
                ConstraintBones {
                    active: c.active,
                    dependencies: Vec::new(),
                    affected: vec![c.bone],
                }
            }
            UpdateCacheItem::Bone(_) => ConstraintBones {
                active: false,
                dependencies: Vec::new(),
                affected: Vec::new(),
            },
        }
    }

    fn rebuild_update_cache(&mut self) {
        fn sort_bone(
            bones: &[Bone],
            bone_index: usize,
            sorted: &mut [bool],
            position: &mut [Option<usize>],
            cache: &mut UpdateCache,
        ) {
            if bone_index >= sorted.len() || sorted[bone_index] {
                return;
            }
            if let Some(parent) = bones[bone_index].parent_index() {
                sort_bone(bones, parent, sorted, position, cache);
            }
            sorted[bone_index] = true;
            position[bone_index] = Some(cache.items.len());
            cache.items.push(UpdateCacheItem::Bone(bone_index));
            cache.links.push(ItemLinks::default());
        }

        fn collect_placed_descendants(
            children: &[Vec<usize>],
            bone_index: usize,
            affected: &[usize],
            position: &[Option<usize>],
            out: &mut Vec<usize>,
        ) {
            for &child in &children[bone_index] {
                if affected.contains(&child) {
                    continue;
                }
                if position[child].is_some() {
                    out.push(child);
                }
                collect_placed_descendants(children, child, affected, position, out);
            }
        }

        let bone_count = self.bones.len();
        let mut sorted: Vec<bool> = self.bones.iter().map(|b| !b.active).collect();
        let mut position: Vec<Option<usize>> = vec![None; bone_count];
        let mut cache = UpdateCache::default();

        // Constraints run in ascending `order`; ties keep the kind scan order.
        let data = &self.data;
        let mut constraints: Vec<(i32, UpdateCacheItem)> =
            Vec::with_capacity(data.constraint_count());
        constraints.extend(self.ik_constraints.iter().enumerate().map(|(i, c)| {
            (data.ik_constraints[c.data_index()].order, UpdateCacheItem::Ik(i))
        }));
        constraints.extend(self.transform_constraints.iter().enumerate().map(|(i, c)| {
            (
                data.transform_constraints[c.data_index()].order,
                UpdateCacheItem::Transform(i),
            )
        }));
        constraints.extend(self.path_constraints.iter().enumerate().map(|(i, c)| {
            (data.path_constraints[c.data_index()].order, UpdateCacheItem::Path(i))
        }));
        constraints.extend(self.physics_constraints.iter().enumerate().map(|(i, c)| {
            (
                data.physics_constraints[c.data_index()].order,
                UpdateCacheItem::Physics(i),
            )
        }));
        constraints.sort_by_key(|&(order, _)| order);

        for (_, item) in constraints {
            let ConstraintBones {
                active,
                dependencies,
                affected,
            } = self.constraint_bones(item);

            let mut refresh = Vec::new();
            if active {
                for &bone in &dependencies {
                    sort_bone(&self.bones, bone, &mut sorted, &mut position, &mut cache);
                }
                for &bone in &affected {
                    let Some(parent) = self.bones.get(bone).and_then(Bone::parent_index) else {
                        continue;
                    };
                    if !affected.contains(&parent) {
                        sort_bone(&self.bones, parent, &mut sorted, &mut position, &mut cache);
                    }
                }
                for &bone in &affected {
                    if bone < bone_count {
                        collect_placed_descendants(
                            &self.bone_children,
                            bone,
                            &affected,
                            &position,
                            &mut refresh,
                        );
                    }
                }
                refresh.sort_by_key(|&b| position[b]);
                refresh.dedup();
            }
            cache.items.push(item);
            cache.links.push(ItemLinks {
                dependencies,
                affected,
                refresh,
            });
        }

        for bone in 0..bone_count {
            sort_bone(&self.bones, bone, &mut sorted, &mut position, &mut cache);
        }

        self.cache = cache;
    }
}
