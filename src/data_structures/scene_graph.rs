//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneGraph`] owns every node of one or more trees. Each node holds an
//! optional drawable, a transform relative to its parent, a non-owning handle
//! to that parent and its children in draw order. The shape of a tree is fixed
//! when a node is added: a node is registered with its parent in the same call
//! that creates it and can never be moved or detached afterwards.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    context::RenderContext,
    data_structures::{
        mesh::MeshDrawer,
        transform::{NodeMatrices, Trs},
    },
    error::{RenderError, RenderResult},
};

/// Anything a scene node can draw with fully resolved matrices.
pub trait Drawable {
    fn draw(&self, ctx: &mut dyn RenderContext, matrices: &NodeMatrices) -> RenderResult<()>;
}

static NEXT_GRAPH: AtomicU32 = AtomicU32::new(0);

/// Handle of a node inside the [`SceneGraph`] that created it.
///
/// Ids carry the graph they belong to, so an id handed to a different graph
/// never resolves, even if its index is in range there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    graph: u32,
    index: usize,
}

impl NodeId {
    /// Position of the node in its graph's insertion order.
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug)]
pub struct SceneNode<D = MeshDrawer> {
    mesh: Option<D>,
    trs: Trs,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<D> SceneNode<D> {
    pub fn mesh(&self) -> Option<&D> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut D> {
        self.mesh.as_mut()
    }

    pub fn trs(&self) -> &Trs {
        &self.trs
    }

    /// Local transforms may change between frames, the tree shape may not.
    pub fn trs_mut(&mut self) -> &mut Trs {
        &mut self.trs
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order, which is also the order they are drawn in.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena owning all nodes of a scene.
#[derive(Debug)]
pub struct SceneGraph<D = MeshDrawer> {
    id: u32,
    nodes: Vec<SceneNode<D>>,
    roots: Vec<NodeId>,
}

impl<D> Default for SceneGraph<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> SceneGraph<D> {
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Adds a node and registers it as the last child of `parent`.
    ///
    /// Without a parent the node becomes a new root. A parent that was not
    /// created by this graph is rejected before anything is inserted.
    pub fn add_node(
        &mut self,
        mesh: Option<D>,
        trs: Trs,
        parent: Option<NodeId>,
    ) -> RenderResult<NodeId> {
        if let Some(parent) = parent {
            if self.slot(parent).is_none() {
                return Err(RenderError::PreconditionViolation(format!(
                    "parent {:?} does not belong to graph {} of {} nodes",
                    parent,
                    self.id,
                    self.nodes.len()
                )));
            }
        }

        Ok(self.insert(mesh, trs, parent))
    }

    pub fn add_root(&mut self, mesh: Option<D>, trs: Trs) -> NodeId {
        self.insert(mesh, trs, None)
    }

    pub fn add_child(
        &mut self,
        parent: NodeId,
        mesh: Option<D>,
        trs: Trs,
    ) -> RenderResult<NodeId> {
        self.add_node(mesh, trs, Some(parent))
    }

    fn insert(&mut self, mesh: Option<D>, trs: Trs, parent: Option<NodeId>) -> NodeId {
        let id = NodeId {
            graph: self.id,
            index: self.nodes.len(),
        };
        self.nodes.push(SceneNode {
            mesh,
            trs,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.index].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn slot(&self, id: NodeId) -> Option<usize> {
        (id.graph == self.id && id.index < self.nodes.len()).then_some(id.index)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode<D>> {
        self.slot(id).map(|index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode<D>> {
        let index = self.slot(id)?;
        self.nodes.get_mut(index)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(SceneNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn trs(&self, id: NodeId) -> Option<&Trs> {
        self.node(id).map(SceneNode::trs)
    }

    pub fn set_trs(&mut self, id: NodeId, trs: Trs) -> RenderResult<()> {
        let node = self.node_mut(id).ok_or_else(|| {
            RenderError::PreconditionViolation(format!("node {:?} does not exist", id))
        })?;
        node.trs = trs;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<D: Drawable> SceneGraph<D> {
    /// Draws `id` and its subtree.
    ///
    /// `parent` holds the matrices accumulated from the root down to, but not
    /// including, `id`. The node draws its own mesh first, then each child in
    /// insertion order. Returns the number of nodes visited.
    pub fn draw(
        &self,
        ctx: &mut dyn RenderContext,
        id: NodeId,
        parent: &NodeMatrices,
    ) -> RenderResult<usize> {
        let node = self.node(id).ok_or_else(|| {
            RenderError::PreconditionViolation(format!("node {:?} does not exist", id))
        })?;
        let local = parent.then(&node.trs);

        if let Some(mesh) = &node.mesh {
            log::trace!("drawing mesh of node {:?}", id);
            mesh.draw(ctx, &local)?;
        }

        let mut visited = 1;
        for &child in &node.children {
            visited += self.draw(ctx, child, &local)?;
        }
        Ok(visited)
    }

    /// Draws every root in insertion order.
    pub fn draw_all(
        &self,
        ctx: &mut dyn RenderContext,
        root: &NodeMatrices,
    ) -> RenderResult<usize> {
        let mut visited = 0;
        for &id in &self.roots {
            visited += self.draw(ctx, id, root)?;
        }
        if visited > 0 {
            log::trace!("scene traversal visited {} nodes", visited);
        }
        Ok(visited)
    }
}
