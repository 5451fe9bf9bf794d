//! Cross-document linking.
//!
//! Once resources are assigned to documents, every reference that crosses a
//! document boundary is rewritten:
//!
//! - a referent in an ancestor document is passed down through nested stack
//!   `Parameters`, one hop per level
//! - any other referent is exported from its document and read with
//!   `Fn::ImportValue`; the consumer's side of the lowest common ancestor
//!   gets a `DependsOn` on the producer's side
//!
//! Sensitive parameters are declared `NoEcho` in every document that needs
//! them and passed down the same way.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::native::Native;
use crate::registry::{DeletionPolicy, LogicalId};
use crate::resolver::ResolvedGraph;

use super::partition::{DocPlan, Layout};

pub(super) const STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// A resource or nested stack declared in a document.
#[derive(Debug, Clone)]
pub(super) struct Entry {
  pub id: LogicalId,
  pub order: usize,
  pub type_tag: String,
  pub properties: BTreeMap<String, Native>,
  pub depends_on: Vec<LogicalId>,
  pub deletion_policy: Option<DeletionPolicy>,
  /// Local entries this one's properties reference.
  pub implicit: Vec<LogicalId>,
}

#[derive(Debug, Clone)]
pub(super) struct OutputDecl {
  pub value: Native,
  pub export: String,
}

/// Linked content of one document, ready for rendering.
#[derive(Debug, Clone, Default)]
pub(super) struct DocContent {
  /// Entries in declaration order.
  pub entries: Vec<Entry>,
  /// Parameter name to `NoEcho`.
  pub parameters: BTreeMap<String, bool>,
  pub outputs: BTreeMap<String, OutputDecl>,
}

pub(super) struct Linker<'a> {
  graph: &'a ResolvedGraph,
  plans: &'a [DocPlan],
  layout: &'a Layout,
  export_prefix: &'a str,
  docs: Vec<DocContent>,
  index: Vec<HashMap<LogicalId, usize>>,
  sensitive: HashSet<String>,
}

fn label_key(label: &str) -> String {
  label.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

impl<'a> Linker<'a> {
  pub fn new(graph: &'a ResolvedGraph, plans: &'a [DocPlan], layout: &'a Layout, export_prefix: &'a str) -> Self {
    let mut docs = vec![DocContent::default(); plans.len()];

    for (doc, plan) in plans.iter().enumerate() {
      let (Some(brick), Some(parent)) = (&plan.brick, layout.parent(doc)) else {
        continue;
      };
      docs[parent].entries.push(Entry {
        id: brick.id.clone(),
        order: brick.order,
        type_tag: STACK_TYPE.to_string(),
        properties: BTreeMap::from([("TemplateURL".to_string(), Native::String(plan.file_name()))]),
        depends_on: Vec::new(),
        deletion_policy: None,
        implicit: Vec::new(),
      });
    }

    for resource in &graph.resources {
      let doc = layout.owner(&resource.id).unwrap_or(0);
      docs[doc].entries.push(Entry {
        id: resource.id.clone(),
        order: resource.order,
        type_tag: resource.type_tag.clone(),
        properties: resource.properties.clone(),
        depends_on: Vec::new(),
        deletion_policy: resource.deletion_policy,
        implicit: Vec::new(),
      });
    }

    let mut index = Vec::with_capacity(docs.len());
    for content in &mut docs {
      content.entries.sort_by_key(|e| e.order);
      index.push(content.entries.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect());
    }

    for parameter in &graph.parameters {
      docs[0].parameters.insert(parameter.name.clone(), true);
    }

    Self {
      graph,
      plans,
      layout,
      export_prefix,
      docs,
      index,
      sensitive: graph.parameters.iter().map(|p| p.name.clone()).collect(),
    }
  }

  /// Link every document and the root output.
  pub fn run(mut self) -> (Vec<DocContent>, Native) {
    let graph = self.graph;

    for resource in &graph.resources {
      for dep in &resource.depends_on {
        self.link_ordering(&resource.id, dep);
      }
    }

    for resource in &graph.resources {
      let doc = self.layout.owner(&resource.id).unwrap_or(0);
      let Some(slot) = self.index[doc].get(&resource.id).copied() else {
        continue;
      };
      let properties = std::mem::take(&mut self.docs[doc].entries[slot].properties);
      let linked = properties
        .iter()
        .map(|(key, value)| (key.clone(), self.link(doc, Some(&resource.id), value)))
        .collect();
      self.docs[doc].entries[slot].properties = linked;
    }

    let output = self.link(0, None, &graph.output);

    for doc in 0..self.docs.len() {
      let local = &self.index[doc];
      for entry in &mut self.docs[doc].entries {
        let mut implicit = Vec::new();
        for value in entry.properties.values() {
          value.walk(&mut |n| {
            let target = match n {
              Native::Ref(name) => name,
              Native::GetAtt { id, .. } => id,
              _ => return,
            };
            let target = LogicalId::new(target.clone());
            if target != entry.id && local.contains_key(&target) && !implicit.contains(&target) {
              implicit.push(target);
            }
          });
        }
        entry.implicit = implicit;
      }
    }

    (self.docs, output)
  }

  fn stack_id(&self, doc: usize) -> LogicalId {
    match &self.plans[doc].brick {
      Some(brick) => brick.id.clone(),
      None => LogicalId::new(self.plans[doc].name()),
    }
  }

  fn entry_mut(&mut self, doc: usize, id: &LogicalId) -> Option<&mut Entry> {
    let slot = self.index[doc].get(id).copied()?;
    self.docs[doc].entries.get_mut(slot)
  }

  fn add_depends_on(&mut self, doc: usize, dependent: &LogicalId, dependency: LogicalId) {
    if let Some(entry) = self.entry_mut(doc, dependent)
      && !entry.depends_on.contains(&dependency)
    {
      entry.depends_on.push(dependency);
    }
  }

  /// Set a parameter on the stack entry deploying `child` inside its parent.
  fn stack_parameter(&mut self, child: usize, name: &str, value: Native) {
    let Some(parent) = self.layout.parent(child) else {
      return;
    };
    let id = self.stack_id(child);
    if let Some(entry) = self.entry_mut(parent, &id) {
      let parameters = entry
        .properties
        .entry("Parameters".to_string())
        .or_insert_with(|| Native::Map(BTreeMap::new()));
      if let Native::Map(map) = parameters {
        map.entry(name.to_string()).or_insert(value);
      }
    }
  }

  /// Translate an explicit "dependent depends on dependency" hint into the
  /// documents both live in.
  fn link_ordering(&mut self, dependent: &LogicalId, dependency: &LogicalId) {
    let (Some(consumer), Some(producer)) = (self.layout.owner(dependent), self.layout.owner(dependency)) else {
      return;
    };
    if consumer == producer {
      self.add_depends_on(consumer, dependent, dependency.clone());
      return;
    }
    let lca = self.layout.lca(producer, consumer);
    let dependency_entry = if producer == lca {
      dependency.clone()
    } else {
      self.stack_id(self.layout.child_toward(lca, producer))
    };
    let dependent_entry = if consumer == lca {
      dependent.clone()
    } else {
      self.stack_id(self.layout.child_toward(lca, consumer))
    };
    self.add_depends_on(lca, &dependent_entry, dependency_entry);
  }

  fn link(&mut self, doc: usize, consumer: Option<&LogicalId>, value: &Native) -> Native {
    value.rewrite(&mut |n| match n {
      Native::Ref(name) => {
        let id = LogicalId::new(name.clone());
        if self.layout.owner(&id).is_some() {
          self.link_reference(doc, consumer, &id, n, "Ref")
        } else {
          if self.sensitive.contains(name) {
            self.pass_parameter(doc, name);
          }
          None
        }
      }
      Native::GetAtt { id, attribute } => self.link_reference(doc, consumer, &LogicalId::new(id.clone()), n, attribute),
      _ => None,
    })
  }

  fn link_reference(
    &mut self,
    doc: usize,
    consumer: Option<&LogicalId>,
    id: &LogicalId,
    expr: &Native,
    label: &str,
  ) -> Option<Native> {
    let producer = self.layout.owner(id)?;
    if producer == doc {
      return None;
    }
    let key = label_key(label);

    if self.layout.is_ancestor(producer, doc) {
      let name = format!("P{}{}", id, key);
      let mut current = doc;
      while current != producer {
        let Some(parent) = self.layout.parent(current) else {
          break;
        };
        self.docs[current].parameters.entry(name.clone()).or_insert(false);
        let value = if parent == producer {
          expr.clone()
        } else {
          Native::Ref(name.clone())
        };
        self.stack_parameter(current, &name, value);
        current = parent;
      }
      return Some(Native::Ref(name));
    }

    let export = format!("{}-{}-{}", self.export_prefix, id, label.replace('.', "-"));
    self.docs[producer]
      .outputs
      .entry(format!("E{}{}", id, key))
      .or_insert_with(|| OutputDecl {
        value: expr.clone(),
        export: export.clone(),
      });

    let lca = self.layout.lca(producer, doc);
    let dependency = self.stack_id(self.layout.child_toward(lca, producer));
    let dependent = if doc == lca {
      consumer.cloned()
    } else {
      Some(self.stack_id(self.layout.child_toward(lca, doc)))
    };
    if let Some(dependent) = dependent {
      self.add_depends_on(lca, &dependent, dependency);
    }
    Some(Native::ImportValue(export))
  }

  fn pass_parameter(&mut self, doc: usize, name: &str) {
    let mut current = doc;
    while let Some(parent) = self.layout.parent(current) {
      self.docs[current].parameters.insert(name.to_string(), true);
      self.stack_parameter(current, name, Native::Ref(name.to_string()));
      current = parent;
    }
  }
}
