//! Scene data structures: meshes, transforms, textures and the scene graph.
//!
//! - `mesh` contains the drawable textured mesh
//! - `scene_graph` enables hierarchical scene organization
//! - `texture` contains the GPU texture wrapper and mip/sampler utilities
//! - `transform` holds per-node transformations and the matrices passed down the graph

pub mod mesh;
pub mod scene_graph;
pub mod texture;
pub mod transform;
