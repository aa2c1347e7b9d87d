//! Local transforms and the matrices accumulated while walking a scene.
//!
//! A [`Trs`] is the position, rotation and scale of a node relative to its
//! parent. [`NodeMatrices`] carries the four matrices a mesh needs to be drawn
//! and knows how to descend one level into the scene graph.

use cgmath::{Matrix4, One, SquareMatrix};

/// Translation, rotation (as quaternion) and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trs {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Trs {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_translation(position: cgmath::Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    pub fn with_rotation(mut self, rotation: cgmath::Quaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: cgmath::Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(cgmath::Vector3::new(scale, scale, scale))
    }

    /// Full `T * R * S` matrix.
    pub fn transformation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Rotation only, used to carry normals into the parent's space.
    pub fn rotation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.rotation)
    }
}

impl Default for Trs {
    fn default() -> Self {
        Self::new()
    }
}

impl From<cgmath::Vector3<f32>> for Trs {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Self::from_translation(position)
    }
}

/// The four matrices accumulated from the scene root down to a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeMatrices {
    pub mvp: Matrix4<f32>,
    pub model_view: Matrix4<f32>,
    pub normal: Matrix4<f32>,
    pub model: Matrix4<f32>,
}

impl NodeMatrices {
    pub fn identity() -> Self {
        Self {
            mvp: Matrix4::identity(),
            model_view: Matrix4::identity(),
            normal: Matrix4::identity(),
            model: Matrix4::identity(),
        }
    }

    /// Applies a child's local transform on the right of every matrix.
    ///
    /// The local transform is expressed in the parent's space, so it is the
    /// last transform applied to a vertex before the parent's own.
    pub fn then(&self, local: &Trs) -> Self {
        let transform = local.transformation_matrix();
        Self {
            mvp: self.mvp * transform,
            model_view: self.model_view * transform,
            normal: self.normal * local.rotation_matrix(),
            model: self.model * transform,
        }
    }
}

impl Default for NodeMatrices {
    fn default() -> Self {
        Self::identity()
    }
}
