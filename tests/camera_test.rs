use cgmath::{Deg, Matrix, Matrix4, Point3, SquareMatrix, Vector4};
use flow_scene::{
    camera::{Camera, Projection},
    config::ContextConfig,
};

use crate::common::test_utils::{assert_matrix_eq, matrix_approx_eq};

mod common;

#[test]
fn should_derive_aspect_from_config_size() {
    let config = ContextConfig::default().with_size(300, 200);
    assert_eq!(config.aspect(), 1.5);
    // a zero height must not divide by zero
    assert_eq!(ContextConfig::default().with_size(10, 0).aspect(), 10.0);
}

#[test]
fn should_follow_new_aspect_after_resize() {
    let mut projection = Projection::new(100, 100, Deg(60.0), 0.1, 50.0);
    let square = projection.matrix();

    projection.resize(200, 100);

    assert!(!matrix_approx_eq(projection.matrix(), square));
    assert_matrix_eq(
        projection.matrix(),
        Projection::new(200, 100, Deg(60.0), 0.1, 50.0).matrix(),
    );
}

#[test]
fn should_map_near_and_far_plane_to_wgpu_depth_range() {
    let projection = Projection::new(100, 100, Deg(60.0), 1.0, 10.0);
    let near = projection.matrix() * Vector4::new(0.0, 0.0, -1.0, 1.0);
    let far = projection.matrix() * Vector4::new(0.0, 0.0, -10.0, 1.0);
    assert!((near.z / near.w).abs() < 1e-5);
    assert!((far.z / far.w - 1.0).abs() < 1e-4);
}

#[test]
fn should_build_root_matrices_from_view_and_projection() {
    let camera = Camera::new(Point3::new(1.0, 2.0, 5.0), Point3::new(0.0, 0.0, 0.0));
    let projection = Projection::new(160, 90, Deg(45.0), 0.1, 100.0);

    let root = camera.root_matrices(&projection);

    assert_matrix_eq(root.mvp, projection.matrix() * camera.view_matrix());
    assert_matrix_eq(root.model_view, camera.view_matrix());
    assert_matrix_eq(root.model, Matrix4::identity());
}

#[test]
fn should_keep_only_view_rotation_in_normal_matrix() {
    let camera = Camera::new(Point3::new(1.0, 2.0, 5.0), Point3::new(0.0, 0.0, 0.0));
    let projection = Projection::new(160, 90, Deg(45.0), 0.1, 100.0);
    let view = camera.view_matrix();

    let normal = camera.root_matrices(&projection).normal;

    assert_eq!(normal.w, Vector4::unit_w());
    assert_eq!(normal.x, view.x);
    assert_eq!(normal.y, view.y);
    assert_eq!(normal.z, view.z);
    assert_matrix_eq(normal * normal.transpose(), Matrix4::identity());
    // the view translation is not empty for this camera
    assert_ne!(view.w, Vector4::unit_w());
}
