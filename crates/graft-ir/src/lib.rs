//! # graft IR surface
//!
//! The node vocabulary and builder interface that intrinsic rewrite rules use to
//! replace a call site with hand-built IR. The translator that walks bytecode owns
//! the real implementation of [`GraphBuilderContext`]; [`Graph`] is a recording
//! implementation used by tests and developer tooling.

pub mod builder;
pub mod graph;
pub mod kind;
pub mod node;

pub use builder::GraphBuilderContext;
pub use graph::{CallSite, Graph};
pub use kind::{JavaKind, UnknownKind};
pub use node::{
    BytecodeSource, ForeignCallTarget, InvokeKind, LocationIdentity, MethodRef, Node, NodeId,
};
