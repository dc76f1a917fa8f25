//! Explicit geometry sources and the per-call editing session.

use super::custom_data::CustomData;
use super::edit::EditMesh;
use super::{Edge, Face, Mesh, Vertex};

/// Read access to vertex/edge/face streams and their attribute layers.
///
/// Implemented by both [`Mesh`] and [`EditMesh`], converting editor state to
/// base-mesh flags on the fly.
pub trait GeometrySource {
    /// Number of vertices.
    fn num_vertices(&self) -> usize;
    /// Number of edges.
    fn num_edges(&self) -> usize;
    /// Number of faces.
    fn num_faces(&self) -> usize;
    /// Vertex `i` with base-mesh flags.
    fn vertex(&self, i: usize) -> Vertex;
    /// Edge `i` with base-mesh flags and crease.
    fn edge(&self, i: usize) -> Edge;
    /// Face `i` with base-mesh flags.
    fn face(&self, i: usize) -> Face;
    /// Per-vertex attribute layers.
    fn vdata(&self) -> &CustomData;
    /// Per-face attribute layers.
    fn fdata(&self) -> &CustomData;
}

impl GeometrySource for Mesh {
    fn num_vertices(&self) -> usize {
        self.verts.len()
    }
    fn num_edges(&self) -> usize {
        self.edges.len()
    }
    fn num_faces(&self) -> usize {
        self.faces.len()
    }
    fn vertex(&self, i: usize) -> Vertex {
        self.verts[i]
    }
    fn edge(&self, i: usize) -> Edge {
        self.edges[i]
    }
    fn face(&self, i: usize) -> Face {
        self.faces[i]
    }
    fn vdata(&self) -> &CustomData {
        &self.vdata
    }
    fn fdata(&self) -> &CustomData {
        &self.fdata
    }
}

impl GeometrySource for EditMesh {
    fn num_vertices(&self) -> usize {
        self.verts.len()
    }
    fn num_edges(&self) -> usize {
        self.edges.len()
    }
    fn num_faces(&self) -> usize {
        self.faces.len()
    }
    fn vertex(&self, i: usize) -> Vertex {
        self.verts[i].to_vertex()
    }
    fn edge(&self, i: usize) -> Edge {
        self.edges[i].to_edge()
    }
    fn face(&self, i: usize) -> Face {
        self.faces[i].to_face()
    }
    fn vdata(&self) -> &CustomData {
        &self.vdata
    }
    fn fdata(&self) -> &CustomData {
        &self.fdata
    }
}

/// Which mesh feeds the hierarchy for one call.
#[derive(Debug, Clone, Copy)]
pub enum EditSource<'a> {
    /// The stored base mesh.
    Mesh(&'a Mesh),
    /// The live edit mesh.
    EditMesh(&'a EditMesh),
}

impl EditSource<'_> {
    /// True if the edit mesh is the source.
    pub fn is_edit_mesh(&self) -> bool {
        matches!(self, EditSource::EditMesh(_))
    }
}

macro_rules! delegate {
    ($self:ident, $m:ident($($arg:expr),*)) => {
        match $self {
            EditSource::Mesh(me) => me.$m($($arg),*),
            EditSource::EditMesh(em) => em.$m($($arg),*),
        }
    };
}

impl GeometrySource for EditSource<'_> {
    fn num_vertices(&self) -> usize {
        delegate!(self, num_vertices())
    }
    fn num_edges(&self) -> usize {
        delegate!(self, num_edges())
    }
    fn num_faces(&self) -> usize {
        delegate!(self, num_faces())
    }
    fn vertex(&self, i: usize) -> Vertex {
        delegate!(self, vertex(i))
    }
    fn edge(&self, i: usize) -> Edge {
        delegate!(self, edge(i))
    }
    fn face(&self, i: usize) -> Face {
        delegate!(self, face(i))
    }
    fn vdata(&self) -> &CustomData {
        delegate!(self, vdata())
    }
    fn fdata(&self) -> &CustomData {
        delegate!(self, fdata())
    }
}

/// Receives "this mesh's evaluated data is stale" announcements.
pub trait Notifier {
    /// Called after any geometry mutation.
    fn geometry_changed(&self);
}

/// A notifier that drops every announcement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn geometry_changed(&self) {}
}

/// Context for one multires call: the optional live edit mesh, whether the
/// call is made for rendering, and where to announce geometry changes.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    /// The active edit mesh, if an editing session is open.
    pub edit: Option<&'a EditMesh>,
    /// Rendering bypasses the edit mesh.
    pub render: bool,
    /// Change notification sink.
    pub notifier: &'a dyn Notifier,
}

impl Default for Session<'static> {
    fn default() -> Self {
        Session {
            edit: None,
            render: false,
            notifier: &NullNotifier,
        }
    }
}

impl<'a> Session<'a> {
    /// Creates a session announcing changes to `notifier`.
    pub fn new(notifier: &'a dyn Notifier) -> Self {
        Self {
            edit: None,
            render: false,
            notifier,
        }
    }

    /// Marks an editing session as active on `em`.
    pub fn with_edit_mesh(mut self, em: &'a EditMesh) -> Self {
        self.edit = Some(em);
        self
    }

    /// Sets whether the call is made for rendering.
    pub fn with_render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// True if edits currently happen in the edit mesh rather than the base mesh.
    pub fn editing(&self) -> bool {
        self.edit.is_some() && !self.render
    }

    /// The source used to load data: the edit mesh whenever one is open.
    pub fn source<'s>(&'s self, mesh: &'s Mesh) -> EditSource<'s> {
        match self.edit {
            Some(em) => EditSource::EditMesh(em),
            None => EditSource::Mesh(mesh),
        }
    }

    /// The source used to read edits: the edit mesh unless rendering.
    pub fn update_source<'s>(&'s self, mesh: &'s Mesh) -> EditSource<'s> {
        match self.edit {
            Some(em) if !self.render => EditSource::EditMesh(em),
            _ => EditSource::Mesh(mesh),
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("editing", &self.edit.is_some())
            .field("render", &self.render)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_selection() {
        let mesh = Mesh::new();
        let em = EditMesh::default();

        let plain = Session::default();
        assert!(!plain.source(&mesh).is_edit_mesh());
        assert!(!plain.editing());

        let editing = Session::default().with_edit_mesh(&em);
        assert!(editing.source(&mesh).is_edit_mesh());
        assert!(editing.update_source(&mesh).is_edit_mesh());
        assert!(editing.editing());

        let render = editing.with_render(true);
        assert!(render.source(&mesh).is_edit_mesh());
        assert!(!render.update_source(&mesh).is_edit_mesh());
        assert!(!render.editing());
    }
}
