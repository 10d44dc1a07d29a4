//! Frame and variable introspection.
//!
//! A [`VariableTree`] is rebuilt every time a frame is inspected. Each node
//! is classified once (mapping, sequence, structured object, text or scalar)
//! and its children are computed lazily, at most once.

pub mod geometry;
pub mod handlers;
pub mod render;
pub mod tree;

pub use geometry::register_geometry_handlers;
pub use handlers::{ChildSink, ExtensionHandler, HandlerRegistry};
pub use render::render;
pub use tree::{NodeId, NodeKind, VariableNode, VariableTree, LEN_CHILD, TEXT_CHILD};
