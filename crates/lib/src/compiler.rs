//! The compiler driver: one pass from a root brick to templates.
//!
//! ```
//! use icbrick_lib::builder::{BuildContext, brick_fn};
//! use icbrick_lib::compiler::Compiler;
//! use icbrick_lib::config::CompilerConfig;
//! use icbrick_lib::value::Value;
//!
//! let app = brick_fn(|ctx: &mut BuildContext<'_>, _: &Value| {
//!   let queue = ctx.resource("jobs", "AWS::SQS::Queue", Value::Null)?;
//!   Ok(queue.attr("Arn"))
//! });
//! let output = Compiler::new(CompilerConfig::default()).compile("app", &app, &Value::Null).unwrap();
//! assert_eq!(output.order.len(), 1);
//! assert!(output.templates.nested.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builder::{Brick, BrickLibrary, BuildContext, MapLibrary};
use crate::config::CompilerConfig;
use crate::emit::{Emitter, TemplateSet};
use crate::error::CompileError;
use crate::native::Native;
use crate::registry::{LogicalId, Registry, ScopePath, check_name, lineage_digest};
use crate::resolver;
use crate::value::Value;

/// A parameter value in the shape the deployment collaborator expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterValue {
  pub parameter_key: String,
  pub parameter_value: String,
}

/// Everything a pass produces.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
  pub templates: TemplateSet,
  /// The root brick's return value in native syntax.
  pub output: Native,
  /// Global resolution order of all resources.
  pub order: Vec<LogicalId>,
  /// Sensitive parameter values, never embedded in any template.
  pub parameter_values: Vec<ParameterValue>,
}

/// Deterministic deployment stack name for a root brick.
pub fn stack_name(root_name: &str) -> String {
  format!("ic-{}", &lineage_digest(&[root_name])[..16])
}

/// Compiles bricks into templates. Holds no pass state.
pub struct Compiler {
  config: CompilerConfig,
  library: Box<dyn BrickLibrary>,
}

impl Compiler {
  pub fn new(config: CompilerConfig) -> Self {
    Self {
      config,
      library: Box::new(MapLibrary::new()),
    }
  }

  /// Use `library` to resolve `ctx.import` calls.
  pub fn with_library(mut self, library: impl BrickLibrary + 'static) -> Self {
    self.library = Box::new(library);
    self
  }

  pub fn config(&self) -> &CompilerConfig {
    &self.config
  }

  /// Run one pass: build `brick` as `root_name`, resolve, emit.
  ///
  /// # Errors
  ///
  /// Any [`CompileError`]; nothing is emitted when an error is returned.
  pub fn compile(&self, root_name: &str, brick: &dyn Brick, params: &Value) -> Result<CompileOutput, CompileError> {
    self.config.validate()?;
    check_name(&ScopePath::default(), root_name)?;
    info!(root = root_name, "compiling");

    let root = ScopePath::root(root_name);
    let mut registry = Registry::new();
    let output = {
      let mut ctx = BuildContext::new(&mut registry, self.library.as_ref(), root.clone());
      brick.build(&mut ctx, params)?
    };
    info!(
      resources = registry.resources().len(),
      bricks = registry.bricks().len(),
      edges = registry.edges().len(),
      "built graph"
    );

    let resolved = resolver::resolve(&registry, &root, &output)?;

    let prefix = self
      .config
      .export_prefix
      .clone()
      .unwrap_or_else(|| stack_name(root_name));
    let templates = Emitter::new(&self.config, prefix).emit(&resolved)?;

    Ok(CompileOutput {
      templates,
      order: resolved.order(),
      output: resolved.output,
      parameter_values: resolved
        .parameters
        .iter()
        .map(|p| ParameterValue {
          parameter_key: p.name.clone(),
          parameter_value: p.value.clone(),
        })
        .collect(),
    })
  }
}
