use crate::test_support::{bone, bone_at, skeleton, slot};
use crate::{
    AttachmentData, AttachmentVertices, PathAttachmentData, PathConstraintData, SkeletonData,
};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// A two-point open path from the origin to `end`, with handles a tenth of the way in.
fn straight_path(end: [f32; 2]) -> AttachmentData {
    let [x, y] = end;
    let handle = [x * 0.1, y * 0.1];
    AttachmentData::Path(PathAttachmentData {
        name: "path".to_string(),
        vertices: AttachmentVertices::Unweighted(vec![
            [-handle[0], -handle[1]],
            [0.0, 0.0],
            handle,
            [x - handle[0], y - handle[1]],
            [x, y],
            [x + handle[0], y + handle[1]],
        ]),
        lengths: vec![(x * x + y * y).sqrt()],
        ..PathAttachmentData::default()
    })
}

fn rig(end: [f32; 2], constraint: PathConstraintData) -> SkeletonData {
    let mut data = SkeletonData {
        bones: vec![bone("root", None), bone_at("walker", Some(0), 0.0, 20.0, 0.0)],
        slots: vec![slot("path", 0, Some("path"))],
        path_constraints: vec![PathConstraintData {
            name: "along".to_string(),
            bones: vec![1],
            target: 0,
            ..constraint
        }],
        ..SkeletonData::default()
    };
    data.add_attachment(0, straight_path(end));
    data
}

#[test]
fn bone_is_placed_at_percent_position() {
    let mut skeleton = skeleton(rig(
        [100.0, 0.0],
        PathConstraintData {
            position: 0.5,
            ..PathConstraintData::default()
        },
    ));
    let walker = &skeleton.bones[1];
    assert_approx(walker.world_x, 50.0);
    assert_approx(walker.world_y, 0.0);

    skeleton.path_constraints[0].position = 1.0;
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_x, 100.0);
}

#[test]
fn tangent_mode_rotates_along_the_path() {
    let skeleton = skeleton(rig(
        [100.0, 100.0],
        PathConstraintData {
            position: 0.5,
            ..PathConstraintData::default()
        },
    ));
    let walker = &skeleton.bones[1];
    assert_approx(walker.world_x, 50.0);
    assert_approx(walker.world_y, 50.0);
    assert_approx(walker.world_rotation_x(), 45.0);
}

#[test]
fn translate_mix_blends_position() {
    let skeleton = skeleton(rig(
        [100.0, 0.0],
        PathConstraintData {
            position: 0.5,
            mix_rotate: 0.0,
            mix_x: 0.5,
            mix_y: 0.5,
            ..PathConstraintData::default()
        },
    ));
    let walker = &skeleton.bones[1];
    assert_approx(walker.world_x, 25.0);
    assert_approx(walker.world_y, 10.0);
}

#[test]
fn path_without_attachment_leaves_bones_alone() {
    let mut skeleton = skeleton(rig(
        [100.0, 0.0],
        PathConstraintData {
            position: 0.5,
            ..PathConstraintData::default()
        },
    ));
    skeleton.set_attachment("path", None).expect("slot");
    skeleton.update_world_transform();
    let walker = &skeleton.bones[1];
    assert_approx(walker.world_x, 0.0);
    assert_approx(walker.world_y, 20.0);
}

#[test]
fn path_follows_its_slot_bone() {
    let mut skeleton = skeleton(rig(
        [100.0, 0.0],
        PathConstraintData {
            position: 0.5,
            ..PathConstraintData::default()
        },
    ));
    skeleton.bones[0].y = 30.0;
    skeleton.update_world_transform();
    let walker = &skeleton.bones[1];
    assert_approx(walker.world_x, 50.0);
    assert_approx(walker.world_y, 30.0);
}
