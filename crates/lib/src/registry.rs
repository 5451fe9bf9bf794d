//! The pass-local arena of declared resources and brick invocations.
//!
//! Every declaration carries a scope path (the chain of brick invocation
//! names from the root brick down) and a short name. The pair is encoded
//! into a [`LogicalId`] that is stable across runs and valid as a native
//! logical identifier.
//!
//! # Identifier format
//!
//! `PascalCase(short_name)` followed by the first 10 hex characters of a
//! SHA-256 over the length-prefixed lineage:
//!
//! ```
//! use icbrick_lib::registry::{LogicalId, ScopePath};
//!
//! let scope = ScopePath::root("app").child("network");
//! let id = LogicalId::derive(&scope, "web_sg");
//! assert!(id.as_str().starts_with("WebSg"));
//! assert_eq!(id.as_str().len(), "WebSg".len() + 10);
//! ```
//!
//! Edges are stored as identifier pairs; the [`graph`](crate::graph) module
//! turns them into an arena graph once the pass is done building.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::CompileError;
use crate::reference::Reference;
use crate::value::Value;

/// Number of hash characters appended to a logical identifier.
const ID_HASH_LEN: usize = 10;

/// Longest accepted short name.
pub const MAX_NAME_LEN: usize = 64;

/// Longest accepted sensitive parameter name.
const MAX_PARAMETER_LEN: usize = 255;

/// A stable, scope-derived identifier for a resource or brick invocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LogicalId(String);

impl LogicalId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// Derive the identifier of `short_name` declared under `scope`.
  pub fn derive(scope: &ScopePath, short_name: &str) -> Self {
    let mut parts: Vec<&str> = scope.segments().iter().map(String::as_str).collect();
    parts.push(short_name);
    let digest = lineage_digest(&parts);
    Self(format!("{}{}", pascal_case(short_name), &digest[..ID_HASH_LEN]))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for LogicalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The chain of brick invocation names leading to a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
  /// Scope of the root brick.
  pub fn root(name: impl Into<String>) -> Self {
    Self(vec![name.into()])
  }

  pub fn from_segments<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(segments.into_iter().map(Into::into).collect())
  }

  pub fn child(&self, name: &str) -> Self {
    let mut next = self.0.clone();
    next.push(name.to_string());
    Self(next)
  }

  /// Scope one level up, `None` at the root.
  pub fn parent(&self) -> Option<Self> {
    if self.0.len() <= 1 {
      return None;
    }
    Some(Self(self.0[..self.0.len() - 1].to_vec()))
  }

  pub fn segments(&self) -> &[String] {
    &self.0
  }

  pub fn depth(&self) -> usize {
    self.0.len()
  }

  /// Whether `self` equals `ancestor` or lies beneath it.
  pub fn starts_with(&self, ancestor: &ScopePath) -> bool {
    self.0.starts_with(&ancestor.0)
  }
}

impl fmt::Display for ScopePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.join("."))
  }
}

/// Full hex SHA-256 over length-prefixed parts.
///
/// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` apart.
pub(crate) fn lineage_digest(parts: &[&str]) -> String {
  let mut hasher = Sha256::new();
  for part in parts {
    hasher.update((part.len() as u64).to_le_bytes());
    hasher.update(part.as_bytes());
  }
  hex::encode(hasher.finalize())
}

fn pascal_case(name: &str) -> String {
  name
    .split('_')
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
      }
    })
    .collect()
}

/// Validate a short name against `[a-z][a-z0-9_]*`.
///
/// # Errors
///
/// Returns `InvalidShortName` with the first rule the name breaks.
pub fn check_name(scope: &ScopePath, name: &str) -> Result<(), CompileError> {
  let reason = if name.is_empty() {
    Some("name is empty".to_string())
  } else if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
    Some("must start with a lowercase letter".to_string())
  } else if name.chars().any(|c| c.is_ascii_uppercase()) {
    Some("must not mix upper and lower case".to_string())
  } else if let Some(c) = name
    .chars()
    .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
  {
    Some(format!("invalid character '{}'", c))
  } else if name.len() > MAX_NAME_LEN {
    Some(format!("longer than {} characters", MAX_NAME_LEN))
  } else {
    None
  };

  match reason {
    Some(reason) => Err(CompileError::InvalidShortName {
      scope: scope.to_string(),
      name: name.to_string(),
      reason,
    }),
    None => Ok(()),
  }
}

/// What happens to a resource when it leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionPolicy {
  Delete,
  Retain,
  Snapshot,
}

impl DeletionPolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      DeletionPolicy::Delete => "Delete",
      DeletionPolicy::Retain => "Retain",
      DeletionPolicy::Snapshot => "Snapshot",
    }
  }
}

impl std::str::FromStr for DeletionPolicy {
  type Err = CompileError;

  /// Parses case-insensitively (`retain`, `Retain`, `RETAIN`).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "delete" => Ok(DeletionPolicy::Delete),
      "retain" => Ok(DeletionPolicy::Retain),
      "snapshot" => Ok(DeletionPolicy::Snapshot),
      _ => Err(CompileError::value_type("Delete, Retain or Snapshot", s)),
    }
  }
}

/// How an edge came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
  /// The dependent's properties reference the dependency.
  Implicit,
  /// The dependent was declared with an ordering hint.
  Explicit,
}

/// A "dependent depends on dependency" pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
  pub dependency: LogicalId,
  pub dependent: LogicalId,
  pub kind: EdgeKind,
}

/// A declared provider resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
  pub id: LogicalId,
  pub scope: ScopePath,
  pub short_name: String,
  pub type_tag: String,
  pub properties: BTreeMap<String, Value>,
  /// Explicit ordering hints, in declaration order without repeats.
  pub depends_on: Vec<LogicalId>,
  pub deletion_policy: Option<DeletionPolicy>,
  /// Declaration index within the pass, shared with brick invocations.
  pub order: usize,
}

impl ResourceRecord {
  pub fn lineage(&self) -> String {
    format!("{}.{}", self.scope, self.short_name)
  }
}

/// A brick invocation, kept for the scope tree and for document splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct BrickRecord {
  pub id: LogicalId,
  /// The scope the invocation opens (its parent scope plus its short name).
  pub scope: ScopePath,
  pub short_name: String,
  /// Library name for imported bricks, e.g. `acme.network`.
  pub brick_name: Option<String>,
  pub order: usize,
}

/// A secret declared by a brick; the template only sees its name.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Clone)]
struct Claim {
  lineage: String,
}

/// Pass-local store of everything declared while building.
#[derive(Debug, Default)]
pub struct Registry {
  resources: Vec<ResourceRecord>,
  resource_index: HashMap<LogicalId, usize>,
  bricks: Vec<BrickRecord>,
  claims: HashMap<LogicalId, Claim>,
  edges: Vec<Edge>,
  parameters: Vec<Parameter>,
  sequence: usize,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_order(&mut self) -> usize {
    let order = self.sequence;
    self.sequence += 1;
    order
  }

  /// Reserve `id` for `lineage`.
  fn claim(&mut self, id: &LogicalId, lineage: String) -> Result<(), CompileError> {
    if let Some(existing) = self.claims.get(id) {
      let reason = if existing.lineage == lineage {
        "is declared twice in the same scope".to_string()
      } else {
        format!("collides with '{}'", existing.lineage)
      };
      return Err(CompileError::DuplicateIdentifier {
        id: id.clone(),
        lineage,
        reason,
      });
    }
    if self.parameters.iter().any(|p| p.name == id.as_str()) {
      return Err(CompileError::DuplicateIdentifier {
        id: id.clone(),
        lineage,
        reason: "collides with a sensitive parameter".to_string(),
      });
    }
    self.claims.insert(id.clone(), Claim { lineage });
    Ok(())
  }

  /// Register a resource declaration.
  ///
  /// # Errors
  ///
  /// - `InvalidShortName` if `short_name` is malformed
  /// - `UnresolvedSelfReference` if `properties` reference the resource itself
  /// - `DuplicateIdentifier` if the identifier is already taken in this pass
  pub fn register(
    &mut self,
    scope: &ScopePath,
    short_name: &str,
    type_tag: &str,
    properties: BTreeMap<String, Value>,
    depends_on: &[LogicalId],
    deletion_policy: Option<DeletionPolicy>,
  ) -> Result<&ResourceRecord, CompileError> {
    check_name(scope, short_name)?;
    let id = LogicalId::derive(scope, short_name);

    let mut references: Vec<&Reference> = Vec::new();
    for value in properties.values() {
      value.collect_references(&mut references);
    }
    if let Some(own) = references.iter().find(|r| r.target == id) {
      return Err(CompileError::UnresolvedSelfReference {
        id: id.clone(),
        path: own.to_string(),
      });
    }

    let mut implicit: Vec<LogicalId> = Vec::new();
    for reference in references {
      if !implicit.contains(&reference.target) {
        implicit.push(reference.target.clone());
      }
    }
    let mut explicit: Vec<LogicalId> = Vec::new();
    for dep in depends_on {
      if !explicit.contains(dep) {
        explicit.push(dep.clone());
      }
    }

    self.claim(&id, format!("{}.{}", scope, short_name))?;

    for dependency in &implicit {
      self.edges.push(Edge {
        dependency: dependency.clone(),
        dependent: id.clone(),
        kind: EdgeKind::Implicit,
      });
    }
    for dependency in &explicit {
      self.edges.push(Edge {
        dependency: dependency.clone(),
        dependent: id.clone(),
        kind: EdgeKind::Explicit,
      });
    }

    debug!(
      id = %id,
      type_tag,
      implicit = implicit.len(),
      explicit = explicit.len(),
      "registered resource"
    );

    let order = self.next_order();
    let slot = self.resources.len();
    self.resource_index.insert(id.clone(), slot);
    self.resources.push(ResourceRecord {
      id,
      scope: scope.clone(),
      short_name: short_name.to_string(),
      type_tag: type_tag.to_string(),
      properties,
      depends_on: explicit,
      deletion_policy,
      order,
    });
    Ok(&self.resources[slot])
  }

  /// Register a brick invocation and return the scope it opens.
  ///
  /// # Errors
  ///
  /// `InvalidShortName` or `DuplicateIdentifier`, as for resources.
  pub fn register_brick(
    &mut self,
    parent: &ScopePath,
    short_name: &str,
    brick_name: Option<String>,
  ) -> Result<&BrickRecord, CompileError> {
    check_name(parent, short_name)?;
    let id = LogicalId::derive(parent, short_name);
    self.claim(&id, format!("{}.{}", parent, short_name))?;

    debug!(id = %id, scope = %parent, short_name, "entered brick");

    let order = self.next_order();
    let slot = self.bricks.len();
    self.bricks.push(BrickRecord {
      id,
      scope: parent.child(short_name),
      short_name: short_name.to_string(),
      brick_name,
      order,
    });
    Ok(&self.bricks[slot])
  }

  /// Declare a sensitive template parameter.
  ///
  /// # Errors
  ///
  /// - `InvalidShortName` if the name is not alphanumeric
  /// - `DuplicateIdentifier` if the name is already declared
  pub fn declare_parameter(&mut self, scope: &ScopePath, name: &str, value: String) -> Result<(), CompileError> {
    if name.is_empty() || name.len() > MAX_PARAMETER_LEN || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(CompileError::InvalidShortName {
        scope: scope.to_string(),
        name: name.to_string(),
        reason: "parameter names must be alphanumeric".to_string(),
      });
    }
    let id = LogicalId::new(name);
    if self.parameters.iter().any(|p| p.name == name) || self.claims.contains_key(&id) {
      return Err(CompileError::DuplicateIdentifier {
        id,
        lineage: format!("{}.{}", scope, name),
        reason: "is already declared".to_string(),
      });
    }
    debug!(name, scope = %scope, "declared sensitive parameter");
    self.parameters.push(Parameter {
      name: name.to_string(),
      value,
    });
    Ok(())
  }

  pub fn resources(&self) -> &[ResourceRecord] {
    &self.resources
  }

  pub fn resource(&self, id: &LogicalId) -> Option<&ResourceRecord> {
    self.resource_index.get(id).map(|&i| &self.resources[i])
  }

  pub fn bricks(&self) -> &[BrickRecord] {
    &self.bricks
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn parameters(&self) -> &[Parameter] {
    &self.parameters
  }

  pub fn is_parameter(&self, name: &str) -> bool {
    self.parameters.iter().any(|p| p.name == name)
  }
}
