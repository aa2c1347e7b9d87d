use cgmath::{Deg, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3};
use flow_scene::{
    context::recording::RecordingContext,
    data_structures::{
        scene_graph::{NodeId, SceneGraph},
        transform::{NodeMatrices, Trs},
    },
    error::RenderError,
};

use crate::common::test_utils::{
    assert_matrix_eq, drawn_names, matrix_approx_eq, new_log, DrawLog, Marker,
};

mod common;

fn translated_rotated_scaled() -> Trs {
    Trs::from_translation(Vector3::new(1.0, 2.0, 3.0))
        .with_rotation(Quaternion::from_angle_z(Deg(90.0)))
        .with_scale(Vector3::new(2.0, 1.0, 0.5))
}

fn parent_matrices() -> NodeMatrices {
    let rotation = Matrix4::from(Quaternion::from_angle_y(Deg(30.0)));
    let view = Matrix4::from_translation(Vector3::new(0.0, 0.0, -5.0)) * rotation;
    NodeMatrices {
        mvp: cgmath::perspective(Deg(45.0), 1.5, 0.1, 100.0) * view,
        model_view: view,
        normal: rotation,
        model: Matrix4::from_translation(Vector3::new(-1.0, 0.0, 0.0)),
    }
}

#[test]
fn should_compose_parent_matrices_with_local_transform() {
    let log = new_log();
    let mut graph = SceneGraph::new();
    let trs = translated_rotated_scaled();
    graph.add_root(Some(Marker::new("node", &log)), trs);

    let parent = parent_matrices();
    let mut ctx = RecordingContext::new();
    graph.draw_all(&mut ctx, &parent).unwrap();

    let received = log.borrow()[0].1;
    let transform = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0))
        * Matrix4::from(Quaternion::from_angle_z(Deg(90.0)))
        * Matrix4::from_nonuniform_scale(2.0, 1.0, 0.5);
    assert_matrix_eq(received.mvp, parent.mvp * transform);
    assert_matrix_eq(received.model_view, parent.model_view * transform);
    assert_matrix_eq(received.model, parent.model * transform);
    assert_matrix_eq(
        received.normal,
        parent.normal * Matrix4::from(Quaternion::from_angle_z(Deg(90.0))),
    );
}

#[test]
fn should_not_commute_parent_and_local_transform() {
    let log = new_log();
    let mut graph = SceneGraph::new();
    graph.add_root(Some(Marker::new("node", &log)), translated_rotated_scaled());

    let parent = parent_matrices();
    let mut ctx = RecordingContext::new();
    graph.draw_all(&mut ctx, &parent).unwrap();

    let received = log.borrow()[0].1;
    let reversed = translated_rotated_scaled().transformation_matrix() * parent.model;
    assert!(!matrix_approx_eq(received.model, reversed));
}

#[test]
fn should_register_child_as_last_child_of_parent() {
    let mut graph: SceneGraph<Marker> = SceneGraph::new();
    let root = graph.add_root(None, Trs::new());
    let first = graph.add_child(root, None, Trs::new()).unwrap();
    let second = graph.add_child(root, None, Trs::new()).unwrap();

    assert_eq!(graph.children(root), &[first, second]);
    assert_eq!(graph.parent(second), Some(root));
    assert_eq!(
        graph.children(root).iter().filter(|&&id| id == second).count(),
        1
    );
    assert_eq!(graph.roots(), &[root]);
}

#[test]
fn should_reject_out_of_range_parent() {
    let mut other: SceneGraph<Marker> = SceneGraph::new();
    let foreign = other.add_root(None, Trs::new());
    let _ = other.add_child(foreign, None, Trs::new()).unwrap();
    let dangling = other.add_child(foreign, None, Trs::new()).unwrap();

    let mut graph: SceneGraph<Marker> = SceneGraph::new();
    graph.add_root(None, Trs::new());
    let result = graph.add_node(None, Trs::new(), Some(dangling));

    assert!(matches!(result, Err(RenderError::PreconditionViolation(_))));
    assert_eq!(graph.len(), 1);
}

#[test]
fn should_reject_parent_from_another_graph() {
    let mut other: SceneGraph<Marker> = SceneGraph::new();
    let foreign = other.add_root(None, Trs::new());

    let mut graph: SceneGraph<Marker> = SceneGraph::new();
    let root = graph.add_root(None, Trs::new());
    assert_eq!(foreign.index(), root.index());

    let result = graph.add_child(foreign, None, Trs::new());

    assert!(matches!(result, Err(RenderError::PreconditionViolation(_))));
    assert_eq!(graph.len(), 1);
    assert!(graph.children(root).is_empty());
    assert!(graph.node(foreign).is_none());
    assert!(graph.set_trs(foreign, Trs::new()).is_err());
}

#[test]
fn should_number_nodes_in_insertion_order() {
    let mut graph: SceneGraph<Marker> = SceneGraph::new();
    let root = graph.add_root(None, Trs::new());
    let child = graph.add_child(root, None, Trs::new()).unwrap();
    let second_root = graph.add_root(None, Trs::new());

    assert_eq!(
        [root.index(), child.index(), second_root.index()],
        [0, 1, 2]
    );
    assert_eq!(graph.roots(), &[root, second_root]);
}

#[test]
fn should_scale_uniformly() {
    let mut graph = SceneGraph::new();
    let log = new_log();
    graph.add_root(
        Some(Marker::new("scaled", &log)),
        Trs::new().with_uniform_scale(3.0),
    );

    let mut ctx = RecordingContext::new();
    graph
        .draw_all(&mut ctx, &NodeMatrices::identity())
        .unwrap();

    let received = log.borrow()[0].1;
    assert_matrix_eq(received.model, Matrix4::from_scale(3.0));
    // scale never reaches the normal matrix
    assert_matrix_eq(received.normal, Matrix4::identity());
}

/// Adds a binary tree of `depth` levels below `parent`, naming nodes by path.
fn add_subtree(
    graph: &mut SceneGraph<Marker>,
    log: &DrawLog,
    parent: NodeId,
    name: &str,
    depth: u32,
) {
    if depth == 0 {
        return;
    }
    for branch in ["a", "b"] {
        let child_name = format!("{name}{branch}");
        let child = graph
            .add_child(parent, Some(Marker::new(child_name.clone(), log)), Trs::new())
            .unwrap();
        add_subtree(graph, log, child, &child_name, depth - 1);
    }
}

#[test]
fn should_draw_self_before_children_in_insertion_order() {
    let log = new_log();
    let mut graph = SceneGraph::new();
    let root = graph.add_root(Some(Marker::new("r", &log)), Trs::new());
    add_subtree(&mut graph, &log, root, "r", 2);

    let mut ctx = RecordingContext::new();
    let visited = graph.draw(&mut ctx, root, &NodeMatrices::identity()).unwrap();

    assert_eq!(visited, 7);
    assert_eq!(
        drawn_names(&log),
        ["r", "ra", "raa", "rab", "rb", "rba", "rbb"]
    );
}

#[test]
fn should_propagate_identity() {
    let log = new_log();
    let mut graph = SceneGraph::new();
    let root = graph.add_root(None, Trs::new());
    graph
        .add_child(root, Some(Marker::new("child", &log)), Trs::new())
        .unwrap();

    let mut ctx = RecordingContext::new();
    graph
        .draw_all(&mut ctx, &NodeMatrices::identity())
        .unwrap();

    let received = log.borrow()[0].1;
    assert_matrix_eq(received.model, Matrix4::identity());
    assert_matrix_eq(received.mvp, Matrix4::identity());
}

#[test]
fn should_visit_every_node_once() {
    let log = new_log();
    let mut graph = SceneGraph::new();
    let root = graph.add_root(Some(Marker::new("0", &log)), Trs::new());
    let mut tip = root;
    for i in 1..10 {
        tip = graph
            .add_child(tip, Some(Marker::new(i.to_string(), &log)), Trs::new())
            .unwrap();
        if i % 3 == 0 {
            graph
                .add_child(root, Some(Marker::new(format!("side{i}"), &log)), Trs::new())
                .unwrap();
        }
    }

    let mut ctx = RecordingContext::new();
    let visited = graph.draw_all(&mut ctx, &NodeMatrices::identity()).unwrap();

    assert_eq!(visited, graph.len());
    assert_eq!(log.borrow().len(), 13);
}

#[test]
fn should_count_nodes_without_mesh() {
    let mut graph: SceneGraph<Marker> = SceneGraph::new();
    let root = graph.add_root(None, Trs::new());
    graph.add_child(root, None, Trs::new()).unwrap();

    let mut ctx = RecordingContext::new();
    assert_eq!(
        graph.draw_all(&mut ctx, &NodeMatrices::identity()).unwrap(),
        2
    );
}
