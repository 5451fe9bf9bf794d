//! Deferred handles to resource attributes.
//!
//! A [`Reference`] stands for "attribute A of resource X once deployed". It
//! is produced when brick code reads an attribute of a resource, and only
//! becomes a concrete expression when the resolver rewrites it into native
//! syntax.
//!
//! # Attribute paths
//!
//! Attributes can be structured, so a reference carries a path of
//! [`Accessor`]s on top of the attribute itself:
//!
//! - `Field("Address")` on `GetAtt(db, "Endpoint")` is `Endpoint.Address`
//! - `Index(0)` on any reference selects a list element
//!
//! ```
//! use icbrick_lib::reference::{Accessor, Attribute, Reference};
//! use icbrick_lib::registry::LogicalId;
//!
//! let db = Reference::attribute(LogicalId::new("Database0a1b2c3d4e"), "Endpoint");
//! let address = db.with(Accessor::Field("Address".to_string()));
//! assert_eq!(address.to_string(), "Database0a1b2c3d4e.Endpoint.Address");
//! ```

use std::fmt;

use crate::registry::LogicalId;

/// Which attribute of the target a reference reads.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
  /// The resource's primary reference value (`{"Ref": id}`).
  Ref,
  /// A named attribute computed at deployment time (`Fn::GetAtt`).
  Named(String),
}

impl fmt::Display for Attribute {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Attribute::Ref => write!(f, "Ref"),
      Attribute::Named(name) => write!(f, "{}", name),
    }
  }
}

/// One step into a structured attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Accessor {
  Field(String),
  Index(usize),
}

impl fmt::Display for Accessor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Accessor::Field(name) => write!(f, ".{}", name),
      Accessor::Index(index) => write!(f, "[{}]", index),
    }
  }
}

/// A forward handle to an attribute of a resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
  pub target: LogicalId,
  pub attribute: Attribute,
  pub path: Vec<Accessor>,
}

impl Reference {
  /// Reference to the primary value of `target`.
  pub fn to_ref(target: LogicalId) -> Self {
    Self {
      target,
      attribute: Attribute::Ref,
      path: Vec::new(),
    }
  }

  /// Reference to a named deploy-time attribute of `target`.
  pub fn attribute(target: LogicalId, name: impl Into<String>) -> Self {
    Self {
      target,
      attribute: Attribute::Named(name.into()),
      path: Vec::new(),
    }
  }

  /// A new reference one accessor deeper.
  pub fn with(&self, accessor: Accessor) -> Self {
    let mut next = self.clone();
    next.path.push(accessor);
    next
  }
}

impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.target, self.attribute)?;
    for accessor in &self.path {
      write!(f, "{}", accessor)?;
    }
    Ok(())
  }
}
