//! icbrick-lib: compiles nested bricks into deployment templates.
//!
//! A brick declares resources and nested bricks through a [`BuildContext`].
//! Values flowing between resources are deferred references; one compile pass
//! collects them into a dependency graph, resolves them into native template
//! expressions and emits a deterministic set of documents, splitting into
//! nested documents when a provider limit would be exceeded.
//!
//! - `builder`: the build context and the [`Brick`] trait
//! - `registry`: identifiers, scope paths and declared records
//! - `resolver`: references to native expressions, in dependency order
//! - `emit`: linking, splitting and rendering of template documents
//! - `lua`: bricks written in Lua
//!
//! [`BuildContext`]: builder::BuildContext
//! [`Brick`]: builder::Brick

pub mod builder;
pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod lua;
pub mod native;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod stdlib;
pub mod value;

pub use compiler::{CompileOutput, Compiler};
pub use error::CompileError;
