use std::sync::Arc;

use crate::test_support::{arms_data, bone, bone_at, region, skeleton, slot};
use crate::{
    AttachmentData, AttachmentVertices, BoneData, Error, IkConstraintData, Inherit,
    PathAttachmentData, PathConstraintData, Physics, PhysicsConstraintData, Skeleton,
    SkeletonData,
};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn parent_and_child(child_inherit: Inherit) -> SkeletonData {
    SkeletonData {
        bones: vec![
            BoneData {
                x: 10.0,
                y: 20.0,
                rotation: 90.0,
                scale_x: 2.0,
                ..BoneData::new("root", None)
            },
            BoneData {
                x: 5.0,
                inherit: child_inherit,
                ..BoneData::new("child", Some(0))
            },
        ],
        ..SkeletonData::default()
    }
}

fn world(skeleton: &Skeleton) -> Vec<[f32; 6]> {
    skeleton
        .bones
        .iter()
        .map(|b| [b.a, b.b, b.c, b.d, b.world_x, b.world_y])
        .collect()
}

#[test]
fn update_world_transform_root_and_child() {
    let skeleton = skeleton(SkeletonData {
        bones: vec![
            bone_at("root", None, 10.0, 20.0, 90.0),
            bone_at("child", Some(0), 5.0, 0.0, 0.0),
        ],
        ..SkeletonData::default()
    });

    let root = &skeleton.bones[0];
    assert_approx(root.a, 0.0);
    assert_approx(root.b, -1.0);
    assert_approx(root.c, 1.0);
    assert_approx(root.d, 0.0);
    assert_approx(root.world_x, 10.0);
    assert_approx(root.world_y, 20.0);

    let child = &skeleton.bones[1];
    assert_approx(child.world_x, 10.0);
    assert_approx(child.world_y, 25.0);
    assert_approx(child.world_rotation_x(), 90.0);
}

#[test]
fn skeleton_position_and_scale_apply_to_root() {
    let mut skeleton = skeleton(SkeletonData {
        bones: vec![bone("root", None), bone_at("child", Some(0), 5.0, 0.0, 0.0)],
        ..SkeletonData::default()
    });
    skeleton.x = 100.0;
    skeleton.y = -10.0;
    skeleton.scale_x = 2.0;
    skeleton.update_world_transform();

    assert_approx(skeleton.bones[0].world_x, 100.0);
    assert_approx(skeleton.bones[0].world_y, -10.0);
    assert_approx(skeleton.bones[0].a, 2.0);
    assert_approx(skeleton.bones[1].world_x, 110.0);
}

#[test]
fn only_translation_ignores_parent_rotation_and_scale() {
    let skeleton = skeleton(parent_and_child(Inherit::OnlyTranslation));
    let child = &skeleton.bones[1];
    assert_approx(child.a, 1.0);
    assert_approx(child.c, 0.0);
    assert_approx(child.d, 1.0);
    // Parent x axis points up with length 2.
    assert_approx(child.world_x, 10.0);
    assert_approx(child.world_y, 30.0);
}

#[test]
fn no_scale_keeps_parent_rotation_only() {
    let skeleton = skeleton(parent_and_child(Inherit::NoScale));
    let child = &skeleton.bones[1];
    assert_approx(child.world_scale_x(), 1.0);
    assert_approx(child.world_scale_y(), 1.0);
    assert_approx(child.world_rotation_x(), 90.0);

    let normal = crate::test_support::skeleton(parent_and_child(Inherit::Normal));
    assert_approx(normal.bones[1].world_scale_x(), 2.0);
}

#[test]
fn no_rotation_keeps_parent_scale_only() {
    let skeleton = skeleton(parent_and_child(Inherit::NoRotationOrReflection));
    let child = &skeleton.bones[1];
    assert_approx(child.world_rotation_x(), 0.0);
    assert_approx(child.world_x, 10.0);
    assert_approx(child.world_y, 30.0);
}

#[test]
fn repeated_updates_are_idempotent() {
    let mut skeleton = skeleton(arms_data());
    let first = world(&skeleton);
    skeleton.update_world_transform();
    skeleton.update_world_transform();
    assert_eq!(world(&skeleton), first);
}

/// IK arm, a bone walking a straight path and a physics tail, one of each
/// solver that writes world matrices and resyncs applied values.
fn mixed_constraints_data() -> SkeletonData {
    let limb = |name: &str, parent: usize, x: f32, rotation: f32| BoneData {
        x,
        rotation,
        length: 10.0,
        ..BoneData::new(name, Some(parent))
    };
    let mut data = SkeletonData {
        bones: vec![
            bone("root", None),
            limb("upper", 0, 0.0, 30.0),
            limb("lower", 1, 10.0, -20.0),
            bone_at("ik target", Some(0), 12.0, 8.0, 0.0),
            bone_at("walker", Some(0), 0.0, 20.0, 15.0),
            bone_at("tail", Some(3), 3.0, 0.0, 0.0),
        ],
        slots: vec![slot("path", 0, Some("path"))],
        ik_constraints: vec![IkConstraintData {
            name: "reach".to_string(),
            order: 0,
            bones: vec![1, 2],
            target: 3,
            ..IkConstraintData::default()
        }],
        path_constraints: vec![PathConstraintData {
            name: "walk".to_string(),
            order: 1,
            bones: vec![4],
            target: 0,
            position: 0.25,
            ..PathConstraintData::default()
        }],
        physics_constraints: vec![PhysicsConstraintData {
            name: "sway".to_string(),
            order: 2,
            bone: 5,
            x: 1.0,
            rotate: 1.0,
            ..PhysicsConstraintData::default()
        }],
        ..SkeletonData::default()
    };
    data.add_attachment(
        0,
        AttachmentData::Path(PathAttachmentData {
            name: "path".to_string(),
            vertices: AttachmentVertices::Unweighted(vec![
                [-10.0, 0.0],
                [0.0, 0.0],
                [10.0, 0.0],
                [90.0, 0.0],
                [100.0, 0.0],
                [110.0, 0.0],
            ]),
            lengths: vec![100.0],
            ..PathAttachmentData::default()
        }),
    );
    data
}

#[test]
fn repeated_updates_are_idempotent_with_every_solver() {
    let mut skeleton = skeleton(mixed_constraints_data());
    let first = world(&skeleton);
    let applied: Vec<_> = skeleton
        .bones
        .iter()
        .map(|b| [b.ax, b.ay, b.arotation, b.ascale_x])
        .collect();

    skeleton.update_world_transform();
    skeleton.update_world_transform_with_physics(Physics::None);
    skeleton.update_world_transform();
    assert_eq!(world(&skeleton), first);
    let again: Vec<_> = skeleton
        .bones
        .iter()
        .map(|b| [b.ax, b.ay, b.arotation, b.ascale_x])
        .collect();
    assert_eq!(again, applied);
    // The solvers really moved something.
    assert!((skeleton.bones[4].world_y - 20.0).abs() > 1.0);
}

#[test]
fn transform_constraint_pulls_bone_onto_target() {
    let mut skeleton = skeleton(arms_data());
    assert_approx(skeleton.bones[2].world_x, -50.0);
    assert_approx(skeleton.bones[2].world_y, 0.0);
    // Applied values follow the world result.
    assert_approx(skeleton.bones[2].ax, -50.0);
    // The host's local value is untouched.
    assert_approx(skeleton.bones[2].x, 50.0);

    skeleton.bones[1].x = -80.0;
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[2].world_x, -80.0);

    skeleton.transform_constraints[0].mix_x = 0.5;
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[2].world_x, -15.0);
}

#[test]
fn host_writes_local_transform_each_frame() {
    let mut skeleton = skeleton(SkeletonData {
        bones: vec![bone("root", None), bone_at("arm", Some(0), 10.0, 0.0, 0.0)],
        ..SkeletonData::default()
    });
    skeleton.bone_mut("root").expect("root").rotation = 90.0;
    skeleton.update_world_transform();
    let arm = skeleton.bone("arm").expect("arm");
    assert_approx(arm.world_x, 0.0);
    assert_approx(arm.world_y, 10.0);

    let [x, y] = arm.world_to_local(0.0, 20.0);
    assert_approx(x, 10.0);
    assert_approx(y, 0.0);
}

#[test]
fn setup_pose_restores_bones_constraints_and_draw_order() {
    let mut data = arms_data();
    data.slots = vec![slot("left", 1, None), slot("right", 2, None)];
    let mut skeleton = skeleton(data);

    skeleton.bones[1].x = 3.0;
    skeleton.transform_constraints[0].mix_x = 0.0;
    skeleton.set_draw_order(vec![1, 0]).expect("permutation");
    skeleton.set_to_setup_pose();

    assert_approx(skeleton.bones[1].x, -50.0);
    assert_approx(skeleton.transform_constraints[0].mix_x, 1.0);
    assert_eq!(skeleton.draw_order(), &[0, 1]);
}

#[test]
fn draw_order_must_be_a_permutation() {
    let mut data = arms_data();
    data.slots = vec![slot("left", 1, None), slot("right", 2, None)];
    let mut skeleton = skeleton(data);

    for order in [vec![0], vec![0, 0], vec![0, 2]] {
        assert!(matches!(
            skeleton.set_draw_order(order),
            Err(Error::InvalidValue { .. })
        ));
    }
    skeleton.set_draw_order(vec![1, 0]).expect("permutation");
    assert_eq!(skeleton.draw_order(), &[1, 0]);
}

#[test]
fn attachments_switch_by_name() {
    let mut data = SkeletonData {
        bones: vec![bone("root", None)],
        slots: vec![slot("body", 0, Some("idle"))],
        ..SkeletonData::default()
    };
    data.add_attachment(0, region("idle", "idle", 0.0, 0.0, 1.0, 1.0));
    data.add_attachment(0, region("hurt", "hurt", 0.0, 0.0, 1.0, 1.0));
    let mut skeleton = skeleton(data);

    skeleton.set_attachment("body", Some("hurt")).expect("attachment");
    assert_eq!(skeleton.slot_attachment(0).map(|a| a.name()), Some("hurt"));

    assert!(matches!(
        skeleton.set_attachment("body", Some("missing")),
        Err(Error::UnknownAttachment { .. })
    ));
    assert!(matches!(
        skeleton.set_attachment("tail", None),
        Err(Error::UnknownSlot { .. })
    ));

    skeleton.set_attachment("body", None).expect("clear");
    assert!(skeleton.slot_attachment(0).is_none());

    skeleton.set_slots_to_setup_pose();
    assert_eq!(skeleton.slots[0].attachment.as_deref(), Some("idle"));
}

#[test]
fn lookups_report_unknown_names() {
    let skeleton = skeleton(arms_data());
    assert_eq!(skeleton.find_bone_index("armR").expect("bone"), 2);
    assert!(matches!(
        skeleton.find_bone_index("leg"),
        Err(Error::UnknownBone { ref name }) if name == "leg"
    ));
    assert!(skeleton.bone("leg").is_none());
}

#[test]
fn construction_validates_data() {
    let forward_parent = SkeletonData {
        bones: vec![bone("a", Some(1)), bone("b", None)],
        ..SkeletonData::default()
    };
    assert!(matches!(
        Skeleton::new(Arc::new(forward_parent)),
        Err(Error::InvalidValue { .. })
    ));

    let missing_attachment = SkeletonData {
        bones: vec![bone("root", None)],
        slots: vec![slot("body", 0, Some("nothing"))],
        ..SkeletonData::default()
    };
    assert!(matches!(
        Skeleton::new(Arc::new(missing_attachment)),
        Err(Error::UnknownAttachment { .. })
    ));
}

#[test]
fn time_advances_only_by_finite_deltas() {
    let mut skeleton = skeleton(arms_data());
    skeleton.update(0.5);
    skeleton.update(f32::NAN);
    skeleton.update(-1.0);
    assert_approx(skeleton.time(), 0.5);
    skeleton.set_time(3.0);
    assert_approx(skeleton.time(), 3.0);
}

#[cfg(feature = "glam")]
#[test]
fn world_affine_matches_local_to_world() {
    let mut data = parent_and_child(Inherit::Normal);
    data.bones[1].shear_y = 10.0;
    let skeleton = skeleton(data);

    for bone in &skeleton.bones {
        let affine = bone.world_affine();
        for [x, y] in [[0.0, 0.0], [3.0, -2.0], [-7.5, 4.0]] {
            let expected = bone.local_to_world(x, y);
            let actual = affine.transform_point2(glam::Vec2::new(x, y));
            assert_approx(actual.x, expected[0]);
            assert_approx(actual.y, expected[1]);
        }
        let inverse = affine.inverse().transform_point2(glam::Vec2::new(1.0, 2.0));
        let [lx, ly] = bone.world_to_local(1.0, 2.0);
        assert_approx(inverse.x, lx);
        assert_approx(inverse.y, ly);
    }
}
