//! Reference resolution.
//!
//! Turns a finished [`Registry`] into a [`ResolvedGraph`]: resources in
//! dependency order, with every value rewritten into [`Native`] syntax.
//! Resolution is a pure function of the registry and the root output.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::CompileError;
use crate::graph::DependencyGraph;
use crate::native::Native;
use crate::reference::{Accessor, Attribute, Reference};
use crate::registry::{BrickRecord, DeletionPolicy, LogicalId, Parameter, Registry, ScopePath};
use crate::value::{Intrinsic, Value};

/// A resource with resolved properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResource {
  pub id: LogicalId,
  pub scope: ScopePath,
  pub short_name: String,
  pub type_tag: String,
  pub properties: BTreeMap<String, Native>,
  /// Explicit ordering hints only.
  pub depends_on: Vec<LogicalId>,
  pub deletion_policy: Option<DeletionPolicy>,
  pub order: usize,
}

/// The ordered, reference-resolved output of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
  pub root: ScopePath,
  /// Resources in resolution order.
  pub resources: Vec<ResolvedResource>,
  pub output: Native,
  pub bricks: Vec<BrickRecord>,
  pub parameters: Vec<Parameter>,
}

impl ResolvedGraph {
  pub fn order(&self) -> Vec<LogicalId> {
    self.resources.iter().map(|r| r.id.clone()).collect()
  }

  pub fn resource(&self, id: &LogicalId) -> Option<&ResolvedResource> {
    self.resources.iter().find(|r| &r.id == id)
  }
}

/// Resolve every declaration of `registry` and the root `output`.
///
/// # Errors
///
/// - `DanglingReference` for references to undeclared resources
/// - `CyclicDependency` if the graph has a cycle
/// - `UnsupportedIntrinsic` for attribute paths with no native form
pub fn resolve(registry: &Registry, root: &ScopePath, output: &Value) -> Result<ResolvedGraph, CompileError> {
  let graph = DependencyGraph::from_registry(registry)?;
  let order = graph.topological_order()?;
  let lowering = Lowering { registry };

  let mut resources = Vec::with_capacity(order.len());
  for id in &order {
    let Some(record) = registry.resource(id) else {
      continue;
    };
    let location = record.lineage();
    let mut properties = BTreeMap::new();
    for (key, value) in &record.properties {
      if matches!(value, Value::Null) {
        continue;
      }
      properties.insert(key.clone(), lowering.lower(value, &location)?);
    }
    resources.push(ResolvedResource {
      id: record.id.clone(),
      scope: record.scope.clone(),
      short_name: record.short_name.clone(),
      type_tag: record.type_tag.clone(),
      properties,
      depends_on: record.depends_on.clone(),
      deletion_policy: record.deletion_policy,
      order: record.order,
    });
  }

  let output = lowering.lower(output, "output")?;
  debug!(resources = resources.len(), "resolved references");
  info!(root = %root, resources = resources.len(), "resolved dependency order");

  Ok(ResolvedGraph {
    root: root.clone(),
    resources,
    output,
    bricks: registry.bricks().to_vec(),
    parameters: registry.parameters().to_vec(),
  })
}

struct Lowering<'a> {
  registry: &'a Registry,
}

impl Lowering<'_> {
  fn lower(&self, value: &Value, location: &str) -> Result<Native, CompileError> {
    Ok(match value {
      Value::Null => Native::Null,
      Value::Bool(b) => Native::Bool(*b),
      Value::Number(n) => Native::Number(n.clone()),
      Value::String(s) => Native::String(s.clone()),
      Value::List(items) => Native::List(
        items
          .iter()
          .map(|v| self.lower(v, location))
          .collect::<Result<_, _>>()?,
      ),
      Value::Map(map) => {
        let mut out = BTreeMap::new();
        for (key, value) in map {
          if matches!(value, Value::Null) {
            continue;
          }
          out.insert(key.clone(), self.lower(value, location)?);
        }
        Native::Map(out)
      }
      Value::Reference(reference) => self.reference(reference, location)?,
      Value::Concat(parts) if parts.len() == 1 => self.lower(&parts[0], location)?,
      Value::Concat(parts) => Native::Join {
        delimiter: String::new(),
        list: Box::new(Native::List(
          parts
            .iter()
            .map(|v| self.lower(v, location))
            .collect::<Result<_, _>>()?,
        )),
      },
      Value::Intrinsic(intrinsic) => self.intrinsic(intrinsic, location)?,
    })
  }

  fn reference(&self, reference: &Reference, location: &str) -> Result<Native, CompileError> {
    if self.registry.resource(&reference.target).is_none() {
      return Err(CompileError::DanglingReference {
        from: location.to_string(),
        target: reference.target.clone(),
      });
    }

    let id = reference.target.to_string();
    let mut accessors = reference.path.iter().peekable();
    let mut native = match &reference.attribute {
      Attribute::Ref => Native::Ref(id),
      Attribute::Named(name) => {
        let mut attribute = name.clone();
        while let Some(Accessor::Field(field)) = accessors.peek() {
          attribute.push('.');
          attribute.push_str(field);
          accessors.next();
        }
        Native::GetAtt { id, attribute }
      }
    };

    for accessor in accessors {
      match accessor {
        Accessor::Index(index) => {
          native = Native::Select {
            index: *index,
            list: Box::new(native),
          };
        }
        Accessor::Field(field) => {
          return Err(CompileError::UnsupportedIntrinsic {
            intrinsic: "Fn::GetAtt".to_string(),
            location: location.to_string(),
            reason: format!("field '{}' of {} has no native form", field, reference),
          });
        }
      }
    }
    Ok(native)
  }

  fn intrinsic(&self, intrinsic: &Intrinsic, location: &str) -> Result<Native, CompileError> {
    let lower = |v: &Value| self.lower(v, location).map(Box::new);
    Ok(match intrinsic {
      Intrinsic::Join { delimiter, list } => Native::Join {
        delimiter: delimiter.clone(),
        list: lower(list)?,
      },
      Intrinsic::Split { delimiter, source } => Native::Split {
        delimiter: delimiter.clone(),
        source: lower(source)?,
      },
      Intrinsic::Select { index, list } => Native::Select {
        index: *index,
        list: lower(list)?,
      },
      Intrinsic::Base64(value) => Native::Base64(lower(value)?),
      Intrinsic::Sub { format, variables } => {
        let mut out = BTreeMap::new();
        for (name, value) in variables {
          out.insert(name.clone(), self.lower(value, location)?);
        }
        Native::Sub {
          format: format.clone(),
          variables: out,
        }
      }
      Intrinsic::Cidr { block, count, bits } => Native::Cidr {
        block: lower(block)?,
        count: *count,
        bits: *bits,
      },
      Intrinsic::GetAzs { region } => Native::GetAzs(lower(region)?),
      Intrinsic::Pseudo(pseudo) => Native::Ref(pseudo.name().to_string()),
      Intrinsic::Parameter(name) => {
        if !self.registry.is_parameter(name) {
          return Err(CompileError::DanglingReference {
            from: location.to_string(),
            target: LogicalId::new(name.clone()),
          });
        }
        Native::Ref(name.clone())
      }
    })
  }
}
