//! Scene graph of a converted model.
//!
//! A loaded model is a [`ContainerNode`] root owning one [`MeshNode`] per
//! converted solid. Nodes are trait objects so callers can attach their own
//! node kinds under a model root. Each node keeps its local transform together
//! with the world transform last propagated from its parents.

use std::fmt::Debug;

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::{bounds::BoundingBox, instance::Instance, model::Mesh};

pub trait SceneNode {
    fn get_local_transform(&self) -> &Instance;

    fn set_local_transform(&mut self, instance: Instance);

    fn get_world_transform(&self) -> &Instance;

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /// The geometry owned by this node, if it is a mesh node.
    fn get_mesh(&self) -> Option<&Mesh>;

    /// Deep copy of the whole subtree: geometry, material and transforms.
    /// The returned graph shares no state with `self`.
    fn clone_node(&self) -> Box<dyn SceneNode>;

    /// Recomputes the world transform of this node from `parent` and pushes
    /// it down to all children.
    fn update_world_transforms(&mut self, parent: &Instance);

    fn update_world_transform_all(&mut self) {
        self.update_world_transforms(&Instance::default());
    }

    /// World-space bounds of the subtree, treating `self` as the top of the
    /// hierarchy. Does not rely on previously propagated world transforms.
    fn bounding_box(&self) -> BoundingBox {
        self.bounding_box_in(&Matrix4::identity())
    }

    fn bounding_box_in(&self, parent: &Matrix4<f32>) -> BoundingBox {
        let matrix = parent * self.get_local_transform().to_matrix();
        let own = self
            .get_mesh()
            .map(|mesh| mesh.bounding_box().transformed(&matrix))
            .unwrap_or_default();
        self.get_children()
            .iter()
            .fold(own, |bbox, child| bbox.union(&child.bounding_box_in(&matrix)))
    }

    /// Calls `f` with every mesh in the subtree and its accumulated matrix.
    fn visit_meshes(&self, parent: &Matrix4<f32>, f: &mut dyn FnMut(&Mesh, &Matrix4<f32>)) {
        let matrix = parent * self.get_local_transform().to_matrix();
        if let Some(mesh) = self.get_mesh() {
            f(mesh, &matrix);
        }
        for child in self.get_children() {
            child.visit_meshes(&matrix, f);
        }
    }

    fn mesh_count(&self) -> usize {
        let own = usize::from(self.get_mesh().is_some());
        own + self
            .get_children()
            .iter()
            .map(|child| child.mesh_count())
            .sum::<usize>()
    }
}

impl Debug for dyn SceneNode + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("local", self.get_local_transform())
            .field("mesh", &self.get_mesh().map(|mesh| &mesh.name))
            .field("children", &self.get_children().len())
            .finish()
    }
}

/// A node without geometry that groups its children, e.g. a model root.
pub struct ContainerNode {
    pub name: String,
    pub children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Instance,
}

impl ContainerNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            local: Instance::default(),
            world: Instance::default(),
        }
    }
}

impl SceneNode for ContainerNode {
    fn get_local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> &Instance {
        &self.world
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn get_mesh(&self) -> Option<&Mesh> {
        None
    }

    fn clone_node(&self) -> Box<dyn SceneNode> {
        Box::new(Self {
            name: self.name.clone(),
            children: self.children.iter().map(|child| child.clone_node()).collect(),
            local: self.local,
            world: self.world,
        })
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }
}

/// A node owning the geometry and material of one converted solid.
pub struct MeshNode {
    mesh: Mesh,
    children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Instance,
}

impl MeshNode {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            children: Vec::new(),
            local: Instance::default(),
            world: Instance::default(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

impl SceneNode for MeshNode {
    fn get_local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> &Instance {
        &self.world
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn get_mesh(&self) -> Option<&Mesh> {
        Some(&self.mesh)
    }

    fn clone_node(&self) -> Box<dyn SceneNode> {
        Box::new(Self {
            mesh: self.mesh.clone(),
            children: self.children.iter().map(|child| child.clone_node()).collect(),
            local: self.local,
            world: self.world,
        })
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }
}
