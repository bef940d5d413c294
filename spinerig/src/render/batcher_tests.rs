use crate::{BlendMode, MaterialGroup, MeshBatcher, RendererConfig, TextureId};

const WHITE: [f32; 4] = [1.0; 4];
const NO_DARK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn batcher(max_vertices: usize, max_materials: usize) -> MeshBatcher {
    MeshBatcher::new(&RendererConfig {
        max_vertices,
        max_materials,
        ..RendererConfig::default()
    })
}

fn triangle(batcher: &mut MeshBatcher, material: usize) {
    batcher.batch(
        &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        WHITE,
        NO_DARK,
        &[0, 1, 2],
        material,
        0.0,
    );
}

#[test]
fn capacity_admits_exactly_n_vertices() {
    let mut batcher = batcher(6, 1);
    batcher.begin();
    assert!(batcher.can_batch(6, 6));
    assert!(!batcher.can_batch(7, 6));

    triangle(&mut batcher, 0);
    assert!(batcher.can_batch(3, 3));
    assert!(!batcher.can_batch(4, 3));

    triangle(&mut batcher, 0);
    assert!(!batcher.can_batch(1, 0));
}

#[test]
fn index_capacity_is_three_per_vertex() {
    let batcher = batcher(4, 1);
    assert_eq!(batcher.max_indices(), 12);
    assert!(batcher.can_batch(4, 12));
    assert!(!batcher.can_batch(4, 13));
}

#[test]
fn indices_are_rebased_onto_the_batch() {
    let mut batcher = batcher(100, 1);
    batcher.begin();
    triangle(&mut batcher, 0);
    triangle(&mut batcher, 0);
    batcher.end();

    assert_eq!(batcher.vertices().len(), 6);
    assert_eq!(batcher.indices(), &[0, 1, 2, 3, 4, 5]);
    assert_eq!(batcher.vertices()[4].position, [1.0, 0.0]);
    assert_eq!(batcher.vertices()[4].dark_color, NO_DARK);
}

#[test]
fn consecutive_draws_with_one_material_share_a_group() {
    let mut batcher = batcher(100, 2);
    batcher.begin();
    let a = batcher
        .find_material_group(TextureId(1), BlendMode::Normal)
        .expect("slot");
    triangle(&mut batcher, a);
    triangle(&mut batcher, a);
    let b = batcher
        .find_material_group(TextureId(2), BlendMode::Normal)
        .expect("slot");
    triangle(&mut batcher, b);
    triangle(&mut batcher, a);
    batcher.end();

    assert_eq!((a, b), (0, 1));
    assert_eq!(
        batcher.groups(),
        &[
            MaterialGroup {
                start: 0,
                count: 6,
                material: 0
            },
            MaterialGroup {
                start: 6,
                count: 3,
                material: 1
            },
            MaterialGroup {
                start: 9,
                count: 3,
                material: 0
            },
        ]
    );
}

#[test]
fn material_slots_match_texture_and_blend_exactly() {
    let mut batcher = batcher(100, 2);
    assert_eq!(batcher.find_material_group(TextureId(1), BlendMode::Normal), Some(0));
    assert_eq!(batcher.find_material_group(TextureId(1), BlendMode::Normal), Some(0));
    assert_eq!(batcher.find_material_group(TextureId(1), BlendMode::Additive), Some(1));
    assert_eq!(batcher.find_material_group(TextureId(2), BlendMode::Normal), None);

    let material = batcher.material(1).expect("bound");
    assert_eq!(material.texture, TextureId(1));
    assert_eq!(material.blend, BlendMode::Additive);
}

#[test]
fn clear_unbinds_materials_and_keeps_slots() {
    let mut batcher = batcher(100, 1);
    assert_eq!(batcher.find_material_group(TextureId(1), BlendMode::Normal), Some(0));
    batcher.begin();
    assert_eq!(batcher.find_material_group(TextureId(2), BlendMode::Normal), None);

    batcher.clear();
    assert!(batcher.is_empty());
    assert_eq!(batcher.materials(), &[None]);
    assert_eq!(batcher.find_material_group(TextureId(2), BlendMode::Normal), Some(0));
}
