//! Assignment of resources to documents.
//!
//! A document is rooted at a scope. Every resource belongs to the document
//! whose root is the longest prefix of the resource's scope, and every
//! nested document's parent is found the same way from its root's parent
//! scope.

use std::collections::HashMap;

use crate::registry::{BrickRecord, LogicalId, ScopePath};
use crate::resolver::ResolvedGraph;

/// A planned document.
#[derive(Debug, Clone)]
pub(super) struct DocPlan {
  pub root: ScopePath,
  /// The brick invocation factored out into this document; `None` for the
  /// root document.
  pub brick: Option<BrickRecord>,
}

impl DocPlan {
  pub fn name(&self) -> String {
    self.root.to_string()
  }

  pub fn file_name(&self) -> String {
    match &self.brick {
      Some(brick) => format!("{}.template.json", brick.id),
      None => format!("{}.template.json", self.root),
    }
  }
}

/// Document tree and resource ownership derived from a list of plans.
#[derive(Debug)]
pub(super) struct Layout {
  parents: Vec<Option<usize>>,
  owners: HashMap<LogicalId, usize>,
}

impl Layout {
  pub fn new(plans: &[DocPlan], graph: &ResolvedGraph) -> Self {
    let parents = plans
      .iter()
      .enumerate()
      .map(|(i, plan)| match i {
        0 => None,
        _ => plan.root.parent().map(|scope| doc_of(plans, &scope)),
      })
      .collect();

    let owners = graph
      .resources
      .iter()
      .map(|r| (r.id.clone(), doc_of(plans, &r.scope)))
      .collect();
    Self { parents, owners }
  }

  pub fn owner(&self, id: &LogicalId) -> Option<usize> {
    self.owners.get(id).copied()
  }

  pub fn parent(&self, doc: usize) -> Option<usize> {
    self.parents.get(doc).copied().flatten()
  }

  /// Whether `ancestor` lies strictly above `doc`.
  pub fn is_ancestor(&self, ancestor: usize, doc: usize) -> bool {
    let mut current = self.parent(doc);
    while let Some(d) = current {
      if d == ancestor {
        return true;
      }
      current = self.parent(d);
    }
    false
  }

  pub fn lca(&self, a: usize, b: usize) -> usize {
    let mut chain = vec![a];
    let mut current = self.parent(a);
    while let Some(d) = current {
      chain.push(d);
      current = self.parent(d);
    }
    let mut candidate = b;
    loop {
      if chain.contains(&candidate) {
        return candidate;
      }
      match self.parent(candidate) {
        Some(parent) => candidate = parent,
        None => return 0,
      }
    }
  }

  /// The child of `ancestor` on the path down to `doc`.
  pub fn child_toward(&self, ancestor: usize, doc: usize) -> usize {
    let mut current = doc;
    while let Some(parent) = self.parent(current) {
      if parent == ancestor {
        break;
      }
      current = parent;
    }
    current
  }
}

/// Index of the document owning `scope`.
pub(super) fn doc_of(plans: &[DocPlan], scope: &ScopePath) -> usize {
  plans
    .iter()
    .enumerate()
    .filter(|(_, plan)| scope.starts_with(&plan.root))
    .max_by_key(|(_, plan)| plan.root.depth())
    .map(|(i, _)| i)
    .unwrap_or(0)
}

/// Bricks directly beneath `doc`'s root that still own resources in `doc`,
/// heaviest first; ties go to the first declared.
pub(super) fn split_candidates(
  plans: &[DocPlan],
  layout: &Layout,
  graph: &ResolvedGraph,
  doc: usize,
) -> Vec<(BrickRecord, usize)> {
  let root = &plans[doc].root;
  let mut candidates: Vec<(BrickRecord, usize)> = graph
    .bricks
    .iter()
    .filter(|brick| brick.scope.parent().as_ref() == Some(root))
    .map(|brick| {
      let weight = graph
        .resources
        .iter()
        .filter(|r| r.scope.starts_with(&brick.scope) && layout.owner(&r.id) == Some(doc))
        .count();
      (brick.clone(), weight)
    })
    .filter(|(_, weight)| *weight > 0)
    .collect();
  candidates.sort_by(|(a, wa), (b, wb)| wb.cmp(wa).then(a.order.cmp(&b.order)));
  candidates
}
