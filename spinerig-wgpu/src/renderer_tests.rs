use crate::{DrawCall, DrawList, GpuVertex, blend_state, grown_capacity, ortho_centered};
use spinerig::{BlendMode, MeshBatcher, RendererConfig, TextureId, Vertex};
use wgpu::BlendFactor;

const WHITE: [f32; 4] = [1.0; 4];
const NO_DARK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn batch_with(materials: &[(u32, BlendMode)]) -> MeshBatcher {
    let mut batcher = MeshBatcher::new(&RendererConfig {
        max_materials: materials.len(),
        ..RendererConfig::default()
    });
    batcher.begin();
    for &(texture, blend) in materials {
        let slot = batcher
            .find_material_group(TextureId(texture), blend)
            .expect("free material slot");
        batcher.batch(
            &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            WHITE,
            NO_DARK,
            &[0, 1, 2],
            slot,
            0.0,
        );
    }
    batcher.end();
    batcher
}

#[test]
fn gpu_vertex_layout_is_tightly_packed() {
    assert_eq!(std::mem::size_of::<GpuVertex>(), 13 * 4);
}

#[test]
fn gpu_vertex_carries_slot_depth() {
    let vertex = Vertex {
        position: [1.0, 2.0],
        z: 0.5,
        uv: [0.25, 0.75],
        color: WHITE,
        dark_color: NO_DARK,
    };
    let gpu = GpuVertex::from(&vertex);
    assert_eq!(gpu.position, [1.0, 2.0, 0.5]);
    assert_eq!(gpu.uv, [0.25, 0.75]);
}

#[test]
fn one_draw_per_material_group() {
    let batch = batch_with(&[
        (1, BlendMode::Normal),
        (2, BlendMode::Additive),
        (1, BlendMode::Normal),
    ]);
    let list = DrawList::from_batches(std::slice::from_ref(&batch));

    assert_eq!(list.vertices.len(), 9);
    assert_eq!(
        list.draws,
        vec![
            DrawCall {
                texture: TextureId(1),
                blend: BlendMode::Normal,
                first_index: 0,
                index_count: 3,
            },
            DrawCall {
                texture: TextureId(2),
                blend: BlendMode::Additive,
                first_index: 3,
                index_count: 3,
            },
            DrawCall {
                texture: TextureId(1),
                blend: BlendMode::Normal,
                first_index: 6,
                index_count: 3,
            },
        ]
    );
}

#[test]
fn later_batches_are_rebased_onto_the_shared_stream() {
    let first = batch_with(&[(1, BlendMode::Normal)]);
    let second = batch_with(&[(2, BlendMode::Screen)]);
    let list = DrawList::from_batches(&[first, second]);

    assert_eq!(list.indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(list.draws.len(), 2);
    assert_eq!(list.draws[1].first_index, 3);
    assert_eq!(list.draws[1].texture, TextureId(2));
    assert_eq!(list.vertices[3].color, WHITE);
    assert_eq!(list.vertices[3].dark_color, NO_DARK);
}

#[test]
fn empty_batches_produce_no_draws() {
    let mut batcher = MeshBatcher::new(&RendererConfig::default());
    batcher.begin();
    batcher.end();
    let list = DrawList::from_batches(&[batcher]);
    assert!(list.draws.is_empty());
    assert!(list.indices.is_empty());
}

#[test]
fn straight_alpha_scales_source_color_by_alpha() {
    let normal = blend_state(BlendMode::Normal, false);
    assert_eq!(normal.color.src_factor, BlendFactor::SrcAlpha);
    assert_eq!(normal.color.dst_factor, BlendFactor::OneMinusSrcAlpha);
    assert_eq!(normal.alpha.src_factor, BlendFactor::One);

    let additive = blend_state(BlendMode::Additive, false);
    assert_eq!(additive.color.src_factor, BlendFactor::SrcAlpha);
    assert_eq!(additive.color.dst_factor, BlendFactor::One);
}

#[test]
fn premultiplied_alpha_uses_one_as_source_factor() {
    for blend in [BlendMode::Normal, BlendMode::Additive] {
        assert_eq!(blend_state(blend, true).color.src_factor, BlendFactor::One);
    }
    // Multiply and screen ignore the alpha convention.
    assert_eq!(
        blend_state(BlendMode::Multiply, true),
        blend_state(BlendMode::Multiply, false)
    );
    let screen = blend_state(BlendMode::Screen, true);
    assert_eq!(screen.color.src_factor, BlendFactor::One);
    assert_eq!(screen.color.dst_factor, BlendFactor::OneMinusSrc);
    assert_eq!(screen.alpha.dst_factor, BlendFactor::OneMinusSrc);
}

#[test]
fn buffers_grow_by_doubling() {
    assert_eq!(grown_capacity(1024, 1000), 1024);
    assert_eq!(grown_capacity(1024, 1025), 2048);
    assert_eq!(grown_capacity(1024, 5000), 8192);
}

#[test]
fn ortho_maps_half_extent_to_clip_edge() {
    let m = ortho_centered(200.0, 100.0);
    assert!((m[0][0] * 100.0 - 1.0).abs() < 1.0e-6);
    assert!((m[1][1] * 50.0 - 1.0).abs() < 1.0e-6);
    assert_eq!(m[3][3], 1.0);
    assert_eq!(m[2][2], 0.0);
    assert_eq!(ortho_centered(0.0, 0.0)[0][0], 2.0);
}
