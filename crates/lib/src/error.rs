//! Errors produced by a compile pass.
//!
//! Every error is terminal for the pass that raised it: nothing is retried,
//! and no document is emitted once an error has been returned.

use std::fmt;

use thiserror::Error;

use crate::registry::LogicalId;

/// A dependency cycle, listed in "depends on" order with the first
/// identifier repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<LogicalId>);

impl CyclePath {
  /// Whether the cycle passes through `id`.
  pub fn contains(&self, id: &LogicalId) -> bool {
    self.0.contains(id)
  }
}

impl fmt::Display for CyclePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<&str> = self.0.iter().map(|id| id.as_str()).collect();
    write!(f, "{}", parts.join(" -> "))
  }
}

/// Errors that can occur while compiling a brick into templates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
  /// The same short name was declared twice under one scope path, or two
  /// different lineages derived the same logical identifier.
  #[error("duplicate identifier {id}: '{lineage}' {reason}")]
  DuplicateIdentifier {
    id: LogicalId,
    lineage: String,
    reason: String,
  },

  /// A short name does not match `[a-z][a-z0-9_]*`.
  #[error("malformed name '{name}' in scope '{scope}': {reason}")]
  InvalidShortName { scope: String, name: String, reason: String },

  /// The dependency graph contains a cycle.
  #[error("cyclic dependency: {cycle}")]
  CyclicDependency { cycle: CyclePath },

  /// A reference points at an identifier that was never declared.
  #[error("dangling reference from {from} to undeclared {target}")]
  DanglingReference { from: String, target: LogicalId },

  /// An expression needs a capability the target format does not offer.
  #[error("unsupported intrinsic {intrinsic} in {location}: {reason}")]
  UnsupportedIntrinsic {
    intrinsic: String,
    location: String,
    reason: String,
  },

  /// A document exceeds a provider ceiling and cannot be split further.
  #[error("template '{document}' exceeds {limit} ({actual} > {max})")]
  TemplateSizeExceeded {
    document: String,
    limit: String,
    actual: usize,
    max: usize,
  },

  /// A resource's property bag references the resource itself.
  #[error("resource {id} references its own attribute at '{path}'")]
  UnresolvedSelfReference { id: LogicalId, path: String },

  /// Brick code read a deferred value as if it were a literal.
  #[error("deferred value read as literal: {what}")]
  DeferredValueRead { what: String },

  /// A literal value does not have the expected shape.
  #[error("expected {expected}, found {found}")]
  ValueType { expected: String, found: String },

  /// The brick library has no brick with this name.
  #[error("unknown brick '{name}'")]
  UnknownBrick { name: String },

  /// A brick body failed with an error of its own.
  #[error("brick '{scope}' failed: {message}")]
  BrickFailed { scope: String, message: String },

  /// The compiler configuration is invalid.
  #[error("invalid configuration: {0}")]
  Config(String),

  /// A document could not be serialized.
  #[error("serialization failed for '{document}': {message}")]
  Serialize { document: String, message: String },
}

impl CompileError {
  /// Short, stable name of the error kind.
  pub fn kind(&self) -> &'static str {
    match self {
      CompileError::DuplicateIdentifier { .. } => "DuplicateIdentifier",
      CompileError::InvalidShortName { .. } => "InvalidShortName",
      CompileError::CyclicDependency { .. } => "CyclicDependency",
      CompileError::DanglingReference { .. } => "DanglingReference",
      CompileError::UnsupportedIntrinsic { .. } => "UnsupportedIntrinsic",
      CompileError::TemplateSizeExceeded { .. } => "TemplateSizeExceeded",
      CompileError::UnresolvedSelfReference { .. } => "UnresolvedSelfReference",
      CompileError::DeferredValueRead { .. } => "DeferredValueRead",
      CompileError::ValueType { .. } => "ValueType",
      CompileError::UnknownBrick { .. } => "UnknownBrick",
      CompileError::BrickFailed { .. } => "BrickFailed",
      CompileError::Config(_) => "Config",
      CompileError::Serialize { .. } => "Serialize",
    }
  }

  pub(crate) fn value_type(expected: impl Into<String>, found: impl Into<String>) -> Self {
    CompileError::ValueType {
      expected: expected.into(),
      found: found.into(),
    }
  }
}
