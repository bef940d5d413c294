//! Programmatic skeletons for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    AttachmentData, AttachmentVertices, BoneData, ClippingAttachmentData, MeshAttachmentData,
    RegionAttachmentData, Skeleton, SkeletonData, SlotData, TextureId, TextureRegion,
    TransformConstraintData,
};

pub(crate) fn bone(name: &str, parent: Option<usize>) -> BoneData {
    BoneData::new(name, parent)
}

pub(crate) fn bone_at(name: &str, parent: Option<usize>, x: f32, y: f32, rotation: f32) -> BoneData {
    BoneData {
        x,
        y,
        rotation,
        ..BoneData::new(name, parent)
    }
}

pub(crate) fn slot(name: &str, bone: usize, attachment: Option<&str>) -> SlotData {
    SlotData {
        attachment: attachment.map(str::to_string),
        ..SlotData::new(name, bone)
    }
}

/// A `width` x `height` quad centered at (`x`, `y`) of its bone, textured from `path`.
pub(crate) fn region(name: &str, path: &str, x: f32, y: f32, width: f32, height: f32) -> AttachmentData {
    AttachmentData::Region(RegionAttachmentData {
        name: name.to_string(),
        path: path.to_string(),
        x,
        y,
        width,
        height,
        ..RegionAttachmentData::default()
    })
}

/// An unweighted triangle fan over `points` with UVs spanning the region.
pub(crate) fn mesh(name: &str, path: &str, points: &[[f32; 2]], uvs: &[[f32; 2]]) -> AttachmentData {
    let triangles = (1..points.len().saturating_sub(1) as u32)
        .flat_map(|i| [0, i, i + 1])
        .collect();
    AttachmentData::Mesh(MeshAttachmentData {
        name: name.to_string(),
        path: path.to_string(),
        vertices: AttachmentVertices::Unweighted(points.to_vec()),
        uvs: uvs.to_vec(),
        triangles,
        ..MeshAttachmentData::default()
    })
}

pub(crate) fn clipping(name: &str, polygon: &[[f32; 2]], end_slot: Option<usize>) -> AttachmentData {
    AttachmentData::Clipping(ClippingAttachmentData {
        name: name.to_string(),
        vertices: AttachmentVertices::Unweighted(polygon.to_vec()),
        end_slot,
    })
}

pub(crate) fn skeleton(data: SkeletonData) -> Skeleton {
    let mut skeleton = Skeleton::new(Arc::new(data)).expect("valid skeleton data");
    skeleton.update_world_transform();
    skeleton
}

/// Bones `[root, armL, armR]` with one transform constraint moving `armR` toward `armL`.
pub(crate) fn arms_data() -> SkeletonData {
    SkeletonData {
        bones: vec![
            bone("root", None),
            bone_at("armL", Some(0), -50.0, 0.0, 0.0),
            bone_at("armR", Some(0), 50.0, 0.0, 0.0),
        ],
        transform_constraints: vec![TransformConstraintData {
            name: "T".to_string(),
            order: 0,
            bones: vec![2],
            target: 1,
            ..TransformConstraintData::default()
        }],
        ..SkeletonData::default()
    }
}

/// Quad A, a 100x100 clip whose end slot is quad B, quad B, then quad C, all on the root.
///
/// A and B cover `[-50, 50]` square; C sits past the clip.
pub(crate) fn clipped_quads_data() -> SkeletonData {
    let mut data = SkeletonData {
        bones: vec![bone("root", None)],
        slots: vec![
            slot("a", 0, Some("a")),
            slot("clip", 0, Some("clip")),
            slot("b", 0, Some("b")),
            slot("c", 0, Some("c")),
        ],
        ..SkeletonData::default()
    };
    data.add_attachment(0, region("a", "page", 0.0, 0.0, 100.0, 100.0));
    data.add_attachment(
        1,
        clipping(
            "clip",
            &[[0.0, -50.0], [100.0, -50.0], [100.0, 50.0], [0.0, 50.0]],
            Some(2),
        ),
    );
    data.add_attachment(2, region("b", "page", 0.0, 0.0, 100.0, 100.0));
    data.add_attachment(3, region("c", "page", 0.0, 0.0, 100.0, 100.0));
    data
}

pub(crate) fn textures(paths: &[(&str, u32)]) -> HashMap<String, TextureRegion> {
    paths
        .iter()
        .map(|&(path, id)| (path.to_string(), TextureRegion::full(TextureId(id))))
        .collect()
}
