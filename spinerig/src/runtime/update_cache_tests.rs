use std::sync::Arc;

use crate::test_support::{arms_data, bone, bone_at, skeleton, slot};
use crate::{
    AttachmentData, AttachmentVertices, Error, IkConstraintData, PathAttachmentData,
    PathConstraintData, PhysicsConstraintData, Skeleton, SkeletonData, TransformConstraintData,
    UpdateCacheItem, VertexWeight,
};

fn bone_position(items: &[UpdateCacheItem], bone: usize) -> Option<usize> {
    items.iter().position(|&item| item == UpdateCacheItem::Bone(bone))
}

/// Every active bone once, after its parent; every active constraint after the bones it
/// reads and after the parents of the bones it writes.
fn assert_well_ordered(skeleton: &Skeleton) {
    let items = skeleton.update_cache_items();

    for (index, bone) in skeleton.bones.iter().enumerate() {
        let count = items
            .iter()
            .filter(|&&item| item == UpdateCacheItem::Bone(index))
            .count();
        assert_eq!(count, usize::from(bone.active), "bone {index} in {items:?}");
        if !bone.active {
            continue;
        }
        if let Some(parent) = bone.parent_index() {
            assert!(
                bone_position(items, parent) < bone_position(items, index),
                "parent {parent} must precede bone {index} in {items:?}"
            );
        }
    }

    for (position, &item) in items.iter().enumerate() {
        let (active, reads, writes): (bool, Vec<usize>, Vec<usize>) = match item {
            UpdateCacheItem::Bone(_) => continue,
            UpdateCacheItem::Ik(i) => {
                let c = &skeleton.ik_constraints[i];
                (c.active, vec![c.target], c.bones.clone())
            }
            UpdateCacheItem::Transform(i) => {
                let c = &skeleton.transform_constraints[i];
                (c.active, vec![c.target], c.bones.clone())
            }
            UpdateCacheItem::Path(i) => {
                let c = &skeleton.path_constraints[i];
                (c.active, vec![skeleton.slots[c.target].bone], c.bones.clone())
            }
            UpdateCacheItem::Physics(i) => {
                let c = &skeleton.physics_constraints[i];
                (c.active, Vec::new(), vec![c.bone])
            }
        };
        if !active {
            continue;
        }
        for bone in reads {
            let placed = bone_position(items, bone).expect("dependency placed");
            assert!(placed < position, "{item:?} reads bone {bone} too early: {items:?}");
        }
        for bone in &writes {
            let Some(parent) = skeleton.bones[*bone].parent_index() else {
                continue;
            };
            if writes.contains(&parent) {
                continue;
            }
            let placed = bone_position(items, parent).expect("parent placed");
            assert!(placed < position, "{item:?} before parent {parent}: {items:?}");
        }
    }
}

#[test]
fn transform_constraint_sits_between_target_and_constrained_bone() {
    let skeleton = skeleton(arms_data());
    assert_eq!(
        skeleton.update_cache_items(),
        &[
            UpdateCacheItem::Bone(0),
            UpdateCacheItem::Bone(1),
            UpdateCacheItem::Transform(0),
            UpdateCacheItem::Bone(2),
        ]
    );
    assert_well_ordered(&skeleton);
}

#[test]
fn bones_without_constraints_follow_index_order() {
    let data = SkeletonData {
        bones: vec![
            bone("root", None),
            bone("a", Some(0)),
            bone("b", Some(1)),
            bone("c", Some(0)),
        ],
        ..SkeletonData::default()
    };
    let skeleton = skeleton(data);
    let expected: Vec<_> = (0..4).map(UpdateCacheItem::Bone).collect();
    assert_eq!(skeleton.update_cache_items(), expected.as_slice());
}

#[test]
fn constraints_run_in_ascending_order_across_kinds() {
    let data = SkeletonData {
        bones: vec![
            bone("root", None),
            bone_at("upper", Some(0), 0.0, 0.0, 0.0),
            bone_at("lower", Some(1), 10.0, 0.0, 0.0),
            bone_at("target", Some(0), 10.0, 10.0, 0.0),
            bone_at("follower", Some(0), -10.0, 0.0, 0.0),
        ],
        ik_constraints: vec![IkConstraintData {
            name: "reach".to_string(),
            order: 2,
            bones: vec![1, 2],
            target: 3,
            ..IkConstraintData::default()
        }],
        transform_constraints: vec![TransformConstraintData {
            name: "follow".to_string(),
            order: 1,
            bones: vec![4],
            target: 2,
            ..TransformConstraintData::default()
        }],
        physics_constraints: vec![PhysicsConstraintData {
            name: "wobble".to_string(),
            order: 0,
            bone: 4,
            ..PhysicsConstraintData::default()
        }],
        ..SkeletonData::default()
    };
    let skeleton = skeleton(data);
    let items = skeleton.update_cache_items();

    let position = |wanted: UpdateCacheItem| {
        items
            .iter()
            .position(|&item| item == wanted)
            .expect("item present")
    };
    assert!(position(UpdateCacheItem::Physics(0)) < position(UpdateCacheItem::Transform(0)));
    assert!(position(UpdateCacheItem::Transform(0)) < position(UpdateCacheItem::Ik(0)));
    assert_well_ordered(&skeleton);
}

#[test]
fn duplicate_orders_are_rejected() {
    let mut data = arms_data();
    data.ik_constraints.push(IkConstraintData {
        name: "clash".to_string(),
        order: 0,
        bones: vec![1],
        target: 2,
        ..IkConstraintData::default()
    });
    let err = Skeleton::new(Arc::new(data)).unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateConstraintOrder { order: 0, .. }
    ));
}

#[test]
fn inactive_bones_drop_out_of_the_cache() {
    let mut skeleton = skeleton(arms_data());
    skeleton.set_bone_active(2, false).expect("bone index");
    skeleton.update_cache();

    assert!(!skeleton.transform_constraints[0].active);
    assert!(bone_position(skeleton.update_cache_items(), 2).is_none());
    assert_well_ordered(&skeleton);

    skeleton.full_update_cache();
    assert!(skeleton.bones.iter().all(|b| b.active));
    assert!(skeleton.transform_constraints[0].active);
    assert_eq!(skeleton.update_cache_items().len(), 4);
}

#[test]
fn deactivating_a_bone_deactivates_its_subtree() {
    let data = SkeletonData {
        bones: vec![bone("root", None), bone("hip", Some(0)), bone("knee", Some(1))],
        ..SkeletonData::default()
    };
    let mut skeleton = skeleton(data);
    skeleton.set_bone_active(1, false).expect("bone index");
    assert!(!skeleton.bones[2].active);

    skeleton.set_bone_active(2, true).expect("bone index");
    assert!(skeleton.bones[1].active);

    assert!(matches!(
        skeleton.set_bone_active(9, true),
        Err(Error::InvalidValue { .. })
    ));
}

#[test]
fn cache_rebuilds_lazily_after_activity_change() {
    let mut skeleton = skeleton(arms_data());
    skeleton.set_bone_active(1, false).expect("bone index");
    assert_eq!(skeleton.update_cache_items().len(), 4);

    skeleton.update_world_transform();
    assert_eq!(
        skeleton.update_cache_items(),
        &[
            UpdateCacheItem::Transform(0),
            UpdateCacheItem::Bone(0),
            UpdateCacheItem::Bone(2),
        ]
    );
}

#[test]
fn weighted_path_depends_on_weight_bones() {
    let mut data = SkeletonData {
        bones: vec![
            bone("root", None),
            bone_at("walker", Some(0), 0.0, 0.0, 0.0),
            bone_at("anchor", Some(0), 5.0, 0.0, 0.0),
            bone_at("spline", Some(0), 10.0, 0.0, 0.0),
        ],
        slots: vec![slot("path", 0, Some("path"))],
        path_constraints: vec![PathConstraintData {
            name: "along".to_string(),
            order: 0,
            bones: vec![1],
            target: 0,
            ..PathConstraintData::default()
        }],
        ..SkeletonData::default()
    };
    let weight = |bone: usize, x: f32| VertexWeight {
        bone,
        x,
        y: 0.0,
        weight: 1.0,
    };
    data.add_attachment(
        0,
        AttachmentData::Path(PathAttachmentData {
            name: "path".to_string(),
            vertices: AttachmentVertices::Weighted(vec![
                vec![weight(3, -1.0)],
                vec![weight(3, 0.0)],
                vec![weight(3, 1.0)],
                vec![weight(2, -1.0)],
                vec![weight(2, 0.0)],
                vec![weight(2, 1.0)],
            ]),
            lengths: vec![10.0],
            ..PathAttachmentData::default()
        }),
    );
    let skeleton = skeleton(data);
    let items = skeleton.update_cache_items();
    let path = items
        .iter()
        .position(|&item| item == UpdateCacheItem::Path(0))
        .expect("path item");
    for bone in [2, 3] {
        assert!(bone_position(items, bone).expect("placed") < path, "{items:?}");
    }
    assert!(bone_position(items, 1).expect("placed") > path);
}
