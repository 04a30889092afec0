//! Engine data structures: meshes, transforms, bounds and scene graphs.
//!
//! - `model` contains mesh and material definitions and the GPU vertex layout
//! - `instance` holds node transformation data
//! - `bounds` is the axis-aligned bounding box used for centring and framing
//! - `scene_graph` organises converted meshes under one model root

pub mod bounds;
pub mod instance;
pub mod model;
pub mod scene_graph;
