use crate::clipping::{ClipState, SkeletonClipper, Triangulator};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 0.001,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_all_approx(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (&a, &e) in actual.iter().zip(expected) {
        assert_approx(a, e);
    }
}

const UNIT_SQUARE: [f32; 8] = [0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];

#[test]
fn triangulates_and_decomposes_rectangle() {
    let mut triangulator = Triangulator::default();

    let triangles = triangulator.triangulate(&UNIT_SQUARE);
    assert_eq!(triangles, vec![3, 0, 1, 3, 1, 2]);

    let polygons = triangulator.decompose(&UNIT_SQUARE, &triangles);
    assert_eq!(polygons.len(), 1);
    assert_all_approx(&polygons[0], &[0.0, 100.0, 0.0, 0.0, 100.0, 0.0, 100.0, 100.0]);
}

#[test]
fn triangulate_rejects_fewer_than_three_points() {
    let mut triangulator = Triangulator::default();
    assert!(triangulator.triangulate(&[0.0, 0.0, 1.0, 1.0]).is_empty());
}

#[test]
fn half_overlapping_triangle_is_cut_with_interpolated_uvs() {
    let mut clipper = SkeletonClipper::new();
    assert!(clipper.clip_start(0, &[0.0, 50.0, 100.0, 50.0, 100.0, 70.0, 0.0, 70.0], None));
    assert!(clipper.is_clipping());

    let vertices = [0.0, 0.0, 100.0, 0.0, 50.0, 150.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    assert!(clipper.clip_triangles(&vertices, &[0, 1, 2], &uvs, 2));

    assert_all_approx(
        clipper.clipped_vertices(),
        &[83.333_33, 50.0, 76.666_67, 70.0, 23.333_33, 70.0, 16.666_67, 50.0],
    );
    assert_all_approx(
        clipper.clipped_uvs(),
        &[0.833_333, 0.333_333, 0.766_667, 0.466_667, 0.233_333, 0.466_667, 0.166_667, 0.333_333],
    );
    assert_eq!(clipper.clipped_triangles(), &[0, 1, 2, 0, 2, 3]);
}

#[test]
fn triangle_inside_passes_through_unchanged() {
    let mut clipper = SkeletonClipper::new();
    assert!(clipper.clip_start(3, &UNIT_SQUARE, None));

    let vertices = [10.0, 10.0, 20.0, 10.0, 15.0, 20.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    assert!(clipper.clip_triangles(&vertices, &[0, 1, 2], &uvs, 2));
    assert_all_approx(clipper.clipped_vertices(), &vertices);
    assert_all_approx(clipper.clipped_uvs(), &uvs);
    assert_eq!(clipper.clipped_triangles(), &[0, 1, 2]);
}

#[test]
fn triangle_outside_produces_nothing() {
    let mut clipper = SkeletonClipper::new();
    assert!(clipper.clip_start(3, &UNIT_SQUARE, None));

    let vertices = [200.0, 200.0, 220.0, 200.0, 210.0, 220.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    assert!(!clipper.clip_triangles(&vertices, &[0, 1, 2], &uvs, 2));
    assert!(clipper.clipped_vertices().is_empty());
    assert!(clipper.clipped_triangles().is_empty());
}

#[test]
fn quad_half_over_the_edge_keeps_the_inside_half() {
    let mut clipper = SkeletonClipper::new();
    assert!(clipper.clip_start(0, &UNIT_SQUARE, None));

    let vertices = [50.0, 0.0, 150.0, 0.0, 150.0, 100.0, 50.0, 100.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    assert!(clipper.clip_triangles(&vertices, &[0, 1, 2, 2, 3, 0], &uvs, 2));

    for x in clipper.clipped_vertices().chunks_exact(2).map(|p| p[0]) {
        assert!((50.0..=100.0 + 1.0e-3).contains(&x), "x = {x}");
    }
    for u in clipper.clipped_uvs().chunks_exact(2).map(|p| p[0]) {
        assert!((0.0..=0.5 + 1.0e-4).contains(&u), "u = {u}");
    }
    assert_eq!(
        clipper.clipped_triangles(),
        &[0, 1, 2, 3, 4, 5, 3, 5, 6, 3, 6, 7]
    );
}

#[test]
fn counter_clockwise_polygon_clips_like_clockwise() {
    let mut clipper = SkeletonClipper::new();
    let clockwise = [0.0, 100.0, 100.0, 100.0, 100.0, 0.0, 0.0, 0.0];
    assert!(clipper.clip_start(0, &clockwise, None));

    let vertices = [-50.0, 0.0, 150.0, 0.0, 50.0, 150.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    assert!(clipper.clip_triangles(&vertices, &[0, 1, 2], &uvs, 2));
    let expected = clipper.clipped_vertices().to_vec();
    clipper.clip_end();

    assert!(clipper.clip_start(0, &UNIT_SQUARE, None));
    assert!(clipper.clip_triangles(&vertices, &[0, 1, 2], &uvs, 2));
    assert_all_approx(clipper.clipped_vertices(), &expected);
    assert_eq!(clipper.clipped_triangles().len(), 12);
}

#[test]
fn clip_start_is_ignored_while_clipping() {
    let mut clipper = SkeletonClipper::new();
    assert!(clipper.clip_start(1, &UNIT_SQUARE, Some(4)));
    assert!(!clipper.clip_start(2, &UNIT_SQUARE, None));
    assert_eq!(
        clipper.state(),
        ClipState::Clipping {
            slot: 1,
            end_slot: Some(4)
        }
    );
}

#[test]
fn clip_ends_at_end_slot_only() {
    let mut clipper = SkeletonClipper::new();
    assert!(clipper.clip_start(1, &UNIT_SQUARE, Some(4)));

    clipper.clip_end_with_slot(2);
    assert!(clipper.is_clipping());
    clipper.clip_end_with_slot(4);
    assert_eq!(clipper.state(), ClipState::Idle);

    assert!(clipper.clip_start(5, &UNIT_SQUARE, None));
    clipper.clip_end_with_slot(5);
    assert!(clipper.is_clipping());
    clipper.clip_end();
    assert!(!clipper.is_clipping());
}

#[test]
fn clip_triangles_without_clip_is_empty() {
    let mut clipper = SkeletonClipper::new();
    let vertices = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    assert!(!clipper.clip_triangles(&vertices, &[0, 1, 2], &vertices, 2));
}

#[test]
fn degenerate_polygon_does_not_start_clip() {
    let mut clipper = SkeletonClipper::new();
    assert!(!clipper.clip_start(0, &[0.0, 0.0, 1.0, 1.0], None));
    assert!(!clipper.is_clipping());
}
