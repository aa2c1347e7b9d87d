//! flow-scene
//!
//! A small hierarchical scene graph for textured, lit triangle meshes on top
//! of WGPU, running natively and in the browser. Every GPU operation goes
//! through an explicit [`context::RenderContext`], so the graph and the meshes
//! can be driven by a recording context in tests.
//!
//! High-level modules
//! - `camera`: view/projection matrices for the scene roots
//! - `config`: settings of the GPU context
//! - `context`: the render context capability set and its implementations
//! - `data_structures`: meshes, transforms, textures and the scene graph
//! - `error`: errors surfaced by meshes and the scene graph
//! - `logging`: logger setup for native and web builds
//! - `pipelines`: the mesh shader and its render pipeline
//! - `resources`: helpers to load images and generate mesh data
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod logging;
pub mod pipelines;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use image;
pub use wgpu;
