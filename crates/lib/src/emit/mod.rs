//! Template emission.
//!
//! The emitter serializes a [`ResolvedGraph`] into one root document, and
//! as many nested documents as it takes for every document to fit the
//! configured [`Limits`](crate::config::Limits).
//!
//! # Splitting
//!
//! When a document breaks a limit, the brick subtree directly beneath its
//! root scope holding the most of its resources is factored out into a
//! nested document, declared in the parent as an
//! `AWS::CloudFormation::Stack` resource whose logical id is the brick
//! invocation's id. References across the new boundary are linked (see
//! [`link`]) and everything is rendered again.
//!
//! A split that would make nested stacks wait on each other in a circle is
//! skipped in favour of the next heaviest brick. A document breaking a limit
//! with no brick left to factor out fails with `TemplateSizeExceeded`.
//!
//! # Determinism
//!
//! Plans, entries, parameters and outputs are all ordered by declaration
//! index or key, so the same graph always yields byte-identical documents.

mod link;
mod partition;
mod render;
mod types;

pub use types::*;

use tracing::{debug, info};

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::resolver::ResolvedGraph;

use link::Linker;
use partition::{DocPlan, Layout, split_candidates};
use render::{Rendered, Renderer, order};

struct Violation {
  doc: usize,
  limit: &'static str,
  actual: usize,
  max: usize,
}

/// Serializes resolved graphs with a fixed configuration.
pub struct Emitter<'c> {
  config: &'c CompilerConfig,
  export_prefix: String,
}

impl<'c> Emitter<'c> {
  pub fn new(config: &'c CompilerConfig, export_prefix: impl Into<String>) -> Self {
    Self {
      config,
      export_prefix: export_prefix.into(),
    }
  }

  /// Emit the root document and any nested documents.
  ///
  /// # Errors
  ///
  /// - `BrickFailed` if the root brick declared no resources
  /// - `TemplateSizeExceeded` if a document cannot be split enough
  /// - `UnsupportedIntrinsic` for expressions outside the profile
  pub fn emit(&self, graph: &ResolvedGraph) -> Result<TemplateSet, CompileError> {
    let root_name = graph.root.to_string();
    if graph.resources.is_empty() {
      return Err(CompileError::BrickFailed {
        scope: root_name,
        message: "declares no resources; a template needs at least one".to_string(),
      });
    }
    let description = self.config.description.clone().unwrap_or_else(|| root_name.clone());
    let mut plans = vec![DocPlan {
      root: graph.root.clone(),
      brick: None,
    }];

    loop {
      let layout = Layout::new(&plans, graph);
      let (contents, output) = Linker::new(graph, &plans, &layout, &self.export_prefix).run();
      let renderer = Renderer {
        graph,
        plans: &plans,
        profile: self.config.profile,
        description: &description,
        pretty: self.config.pretty,
      };

      let mut rendered = Vec::with_capacity(contents.len());
      for (doc, content) in contents.iter().enumerate() {
        let root_output = if doc == 0 { Some(&output) } else { None };
        rendered.push(renderer.render(doc, content, root_output)?);
      }

      let Some(violation) = self.violation(&rendered) else {
        info!(documents = rendered.len(), "emitted templates");
        return Ok(assemble(&plans, rendered));
      };

      let document = plans[violation.doc].name();
      debug!(
        document = %document,
        limit = violation.limit,
        actual = violation.actual,
        max = violation.max,
        "document exceeds limit"
      );

      let mut split = None;
      for (brick, weight) in split_candidates(&plans, &layout, graph, violation.doc) {
        let mut trial = plans.clone();
        trial.push(DocPlan {
          root: brick.scope.clone(),
          brick: Some(brick.clone()),
        });
        if self.acyclic(graph, &trial) {
          split = Some((trial, brick, weight));
          break;
        }
        debug!(brick = %brick.scope, "split would make nested documents depend on each other");
      }

      let Some((trial, brick, weight)) = split else {
        return Err(CompileError::TemplateSizeExceeded {
          document,
          limit: violation.limit.to_string(),
          actual: violation.actual,
          max: violation.max,
        });
      };
      info!(
        document = %document,
        brick = %brick.scope,
        resources = weight,
        "splitting brick into nested document"
      );
      plans = trial;
    }
  }

  /// Whether every document stays acyclic once `plans` are linked.
  fn acyclic(&self, graph: &ResolvedGraph, plans: &[DocPlan]) -> bool {
    let layout = Layout::new(plans, graph);
    let (contents, _) = Linker::new(graph, plans, &layout, &self.export_prefix).run();
    contents.iter().all(|content| order(content).is_ok())
  }

  fn violation(&self, rendered: &[Rendered]) -> Option<Violation> {
    let limits = &self.config.limits;
    rendered.iter().enumerate().find_map(|(doc, r)| {
      let checks = [
        ("max_resources", r.resources, limits.max_resources),
        ("max_outputs", r.outputs, limits.max_outputs),
        ("max_parameters", r.parameters, limits.max_parameters),
        ("max_body_bytes", r.body.len(), limits.max_body_bytes),
      ];
      checks
        .into_iter()
        .find(|(_, actual, max)| actual > max)
        .map(|(limit, actual, max)| Violation {
          doc,
          limit,
          actual,
          max,
        })
    })
  }
}

fn assemble(plans: &[DocPlan], rendered: Vec<Rendered>) -> TemplateSet {
  let mut documents = plans.iter().zip(rendered).map(|(plan, r)| Document {
    name: plan.name(),
    file_name: plan.file_name(),
    body: r.body,
  });
  let root = documents.next().unwrap_or_else(|| Document {
    name: String::new(),
    file_name: String::new(),
    body: String::new(),
  });
  TemplateSet {
    root,
    nested: documents.collect(),
  }
}
