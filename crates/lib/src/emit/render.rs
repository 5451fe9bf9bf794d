//! JSON rendering of linked documents.

use serde_json::{Map, Value as Json, json};

use crate::config::TemplateProfile;
use crate::error::CompileError;
use crate::graph::DependencyGraph;
use crate::native::Native;
use crate::registry::ScopePath;
use crate::resolver::ResolvedGraph;

use super::link::{DocContent, Entry, STACK_TYPE};
use super::partition::DocPlan;

const FORMAT_VERSION: &str = "2010-09-09";

/// A serialized document and the counts its limits apply to.
#[derive(Debug, Clone)]
pub(super) struct Rendered {
  pub body: String,
  pub resources: usize,
  pub outputs: usize,
  pub parameters: usize,
}

pub(super) struct Renderer<'a> {
  pub graph: &'a ResolvedGraph,
  pub plans: &'a [DocPlan],
  pub profile: TemplateProfile,
  pub description: &'a str,
  pub pretty: bool,
}

impl Renderer<'_> {
  /// Render document `doc`; `output` is the linked root output for the root
  /// document.
  ///
  /// # Errors
  ///
  /// - `CyclicDependency` if the document's entries form a cycle
  /// - `UnsupportedIntrinsic` if an expression is outside the profile
  /// - `Serialize` if the body cannot be serialized
  pub fn render(&self, doc: usize, content: &DocContent, output: Option<&Native>) -> Result<Rendered, CompileError> {
    let plan = &self.plans[doc];
    let name = plan.name();
    let ordered = order(content)?;

    let encoded_output = output.map(Native::encode_json);
    for entry in &ordered {
      for value in entry.properties.values() {
        self.check_profile(value, &format!("{}.{}", name, entry.id))?;
      }
    }
    for (key, decl) in &content.outputs {
      self.check_profile(&decl.value, &format!("{}.Outputs.{}", name, key))?;
    }
    if let Some(value) = &encoded_output {
      self.check_profile(value, &format!("{}.Outputs.value", name))?;
    }

    let mut root = Map::new();
    root.insert("AWSTemplateFormatVersion".to_string(), json!(FORMAT_VERSION));
    let description = match &plan.brick {
      None => self.description.to_string(),
      Some(_) => name.clone(),
    };
    root.insert("Description".to_string(), json!(description));
    root.insert(
      "Metadata".to_string(),
      json!({
        "bricks": self.tree(doc),
        "order": ordered.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
      }),
    );

    if !content.parameters.is_empty() {
      let mut parameters = Map::new();
      for (key, no_echo) in &content.parameters {
        let mut decl = Map::new();
        decl.insert("Type".to_string(), json!("String"));
        if *no_echo {
          decl.insert("NoEcho".to_string(), json!(true));
        }
        parameters.insert(key.clone(), Json::Object(decl));
      }
      root.insert("Parameters".to_string(), Json::Object(parameters));
    }

    let mut resources = Map::new();
    for entry in &ordered {
      resources.insert(entry.id.to_string(), render_entry(entry));
    }
    root.insert("Resources".to_string(), Json::Object(resources));

    let mut outputs = Map::new();
    if let Some(value) = &encoded_output {
      outputs.insert("value".to_string(), json!({ "Value": value.to_json() }));
    }
    for (key, decl) in &content.outputs {
      outputs.insert(
        key.clone(),
        json!({ "Value": decl.value.to_json(), "Export": { "Name": decl.export } }),
      );
    }
    let output_count = outputs.len();
    if !outputs.is_empty() {
      root.insert("Outputs".to_string(), Json::Object(outputs));
    }

    let document = Json::Object(root);
    let body = if self.pretty {
      serde_json::to_string_pretty(&document)
    } else {
      serde_json::to_string(&document)
    }
    .map_err(|e| CompileError::Serialize {
      document: name.clone(),
      message: e.to_string(),
    })?;

    Ok(Rendered {
      body,
      resources: ordered.len(),
      outputs: output_count,
      parameters: content.parameters.len(),
    })
  }

  fn check_profile(&self, value: &Native, location: &str) -> Result<(), CompileError> {
    let mut unsupported = None;
    value.walk(&mut |n| {
      if unsupported.is_none()
        && let Some(intrinsic) = n.intrinsic()
        && !self.profile.supports(intrinsic)
      {
        unsupported = Some(intrinsic);
      }
    });
    match unsupported {
      Some(intrinsic) => Err(CompileError::UnsupportedIntrinsic {
        intrinsic: intrinsic.to_string(),
        location: location.to_string(),
        reason: "not available in the legacy template profile".to_string(),
      }),
      None => Ok(()),
    }
  }

  /// Scope tree of the declarations in document `doc`.
  fn tree(&self, doc: usize) -> Json {
    let plan = &self.plans[doc];
    let mut node = Map::new();
    match &plan.brick {
      Some(brick) => {
        node.insert("id".to_string(), json!(brick.id.as_str()));
        node.insert("name".to_string(), json!(brick.short_name));
        if let Some(brick_name) = &brick.brick_name {
          node.insert("brick".to_string(), json!(brick_name));
        }
      }
      None => {
        let name = plan.root.segments().last().cloned().unwrap_or_default();
        node.insert("name".to_string(), json!(name));
      }
    }
    node.insert("children".to_string(), Json::Array(self.children(&plan.root)));
    Json::Object(node)
  }

  fn children(&self, scope: &ScopePath) -> Vec<Json> {
    let mut items: Vec<(usize, Json)> = Vec::new();

    for resource in self.graph.resources.iter().filter(|r| &r.scope == scope) {
      items.push((
        resource.order,
        json!({ "id": resource.id.as_str(), "name": resource.short_name, "type": resource.type_tag }),
      ));
    }

    for brick in self.graph.bricks.iter().filter(|b| b.scope.parent().as_ref() == Some(scope)) {
      let nested = self
        .plans
        .iter()
        .find(|p| p.brick.as_ref().is_some_and(|b| b.id == brick.id));
      let mut node = Map::new();
      node.insert("id".to_string(), json!(brick.id.as_str()));
      node.insert("name".to_string(), json!(brick.short_name));
      if let Some(brick_name) = &brick.brick_name {
        node.insert("brick".to_string(), json!(brick_name));
      }
      match nested {
        Some(plan) => {
          node.insert("type".to_string(), json!(STACK_TYPE));
          node.insert("template".to_string(), json!(plan.file_name()));
        }
        None => {
          node.insert("children".to_string(), Json::Array(self.children(&brick.scope)));
        }
      }
      items.push((brick.order, Json::Object(node)));
    }

    items.sort_by_key(|(order, _)| *order);
    items.into_iter().map(|(_, node)| node).collect()
  }
}

/// Entries of one document in dependency order.
///
/// # Errors
///
/// `CyclicDependency` if the entries' local edges form a cycle.
pub(super) fn order(content: &DocContent) -> Result<Vec<&Entry>, CompileError> {
  let mut edges = Vec::new();
  for entry in &content.entries {
    for dep in entry.implicit.iter().chain(entry.depends_on.iter()) {
      edges.push((dep.clone(), entry.id.clone()));
    }
  }
  let graph = DependencyGraph::from_edges(content.entries.iter().map(|e| e.id.clone()), edges)?;
  let order = graph.topological_order()?;
  Ok(
    order
      .iter()
      .filter_map(|id| content.entries.iter().find(|e| &e.id == id))
      .collect(),
  )
}

fn render_entry(entry: &Entry) -> Json {
  let mut out = Map::new();
  out.insert("Type".to_string(), json!(entry.type_tag));
  if !entry.depends_on.is_empty() {
    out.insert(
      "DependsOn".to_string(),
      json!(entry.depends_on.iter().map(|id| id.as_str()).collect::<Vec<_>>()),
    );
  }
  if let Some(policy) = entry.deletion_policy {
    out.insert("DeletionPolicy".to_string(), json!(policy.as_str()));
  }
  let mut properties = Map::new();
  for (key, value) in &entry.properties {
    properties.insert(key.clone(), value.to_json());
  }
  out.insert("Properties".to_string(), Json::Object(properties));
  Json::Object(out)
}
