//! Brick invocation and resource declaration.
//!
//! A [`BuildContext`] is handed to every brick. It owns no state of its own
//! beyond the current scope: declarations go straight into the pass-local
//! [`Registry`], and nested bricks receive a child context that shares it.
//!
//! # Example
//!
//! ```
//! use icbrick_lib::builder::{BuildContext, brick_fn};
//! use icbrick_lib::value::Value;
//!
//! let web = brick_fn(|ctx: &mut BuildContext<'_>, _params: &Value| {
//!   let sg = ctx.resource("sg", "AWS::EC2::SecurityGroup", Value::map([("GroupDescription", "web")]))?;
//!   let instance = ctx.resource(
//!     "instance",
//!     "AWS::EC2::Instance",
//!     Value::map([("SecurityGroups", Value::List(vec![sg.reference()]))]),
//!   )?;
//!   Value::concat([Value::from("http://"), instance.attr("PublicIp")])
//! });
//! # let _ = web;
//! ```

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::CompileError;
use crate::reference::Reference;
use crate::registry::{DeletionPolicy, LogicalId, Registry, ScopePath, check_name};
use crate::value::{Intrinsic, Value};

/// A composable unit that declares resources and returns a value.
pub trait Brick {
  fn build(&self, ctx: &mut BuildContext<'_>, params: &Value) -> Result<Value, CompileError>;
}

impl<F> Brick for F
where
  F: Fn(&mut BuildContext<'_>, &Value) -> Result<Value, CompileError>,
{
  fn build(&self, ctx: &mut BuildContext<'_>, params: &Value) -> Result<Value, CompileError> {
    self(ctx, params)
  }
}

/// Pin a closure to the brick signature so its argument types are inferred.
pub fn brick_fn<F>(f: F) -> F
where
  F: Fn(&mut BuildContext<'_>, &Value) -> Result<Value, CompileError>,
{
  f
}

/// Source of bricks referenced by name (`author.brick_name`).
pub trait BrickLibrary {
  fn lookup(&self, name: &str) -> Option<&dyn Brick>;
}

/// In-memory brick library.
#[derive(Default)]
pub struct MapLibrary {
  bricks: BTreeMap<String, Box<dyn Brick>>,
}

impl MapLibrary {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a brick under `name`.
  ///
  /// # Errors
  ///
  /// Returns `InvalidShortName` if `name` is not of the form `author.brick_name`.
  pub fn insert(&mut self, name: &str, brick: impl Brick + 'static) -> Result<(), CompileError> {
    check_brick_name(name)?;
    self.bricks.insert(name.to_string(), Box::new(brick));
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.bricks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bricks.is_empty()
  }
}

impl BrickLibrary for MapLibrary {
  fn lookup(&self, name: &str) -> Option<&dyn Brick> {
    self.bricks.get(name).map(|b| b.as_ref())
  }
}

/// Validate a library name of the form `author.brick_name`.
pub fn check_brick_name(name: &str) -> Result<(), CompileError> {
  let library = ScopePath::root("library");
  match name.split_once('.') {
    Some((author, brick)) => {
      check_name(&library, author)?;
      check_name(&library, brick)
    }
    None => Err(CompileError::InvalidShortName {
      scope: library.to_string(),
      name: name.to_string(),
      reason: "brick names take the form author.brick_name".to_string(),
    }),
  }
}

/// Handle to a declared (or forward-declared) resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
  id: LogicalId,
}

impl ResourceHandle {
  pub fn new(id: LogicalId) -> Self {
    Self { id }
  }

  pub fn id(&self) -> &LogicalId {
    &self.id
  }

  /// The resource's primary value (`Ref`).
  pub fn reference(&self) -> Value {
    Value::Reference(Reference::to_ref(self.id.clone()))
  }

  /// A deploy-time attribute (`Fn::GetAtt`).
  pub fn attr(&self, name: &str) -> Value {
    Value::Reference(Reference::attribute(self.id.clone(), name))
  }
}

impl From<&ResourceHandle> for Value {
  fn from(handle: &ResourceHandle) -> Self {
    handle.reference()
  }
}

/// Options for [`BuildContext::resource_with`].
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
  pub depends_on: Vec<LogicalId>,
  pub deletion_policy: Option<DeletionPolicy>,
}

impl ResourceOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
    self.depends_on.push(handle.id.clone());
    self
  }

  pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
    self.deletion_policy = Some(policy);
    self
  }
}

/// Options for [`BuildContext::brick_with`].
#[derive(Debug, Clone, Default)]
pub struct BrickOptions {
  /// Ordering hints applied to every resource declared inside the brick.
  pub depends_on: Vec<LogicalId>,
}

impl BrickOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
    self.depends_on.push(handle.id.clone());
    self
  }
}

/// The explicit, mutable build context threaded into every brick.
pub struct BuildContext<'p> {
  registry: &'p mut Registry,
  library: &'p dyn BrickLibrary,
  scope: ScopePath,
  inherited: Vec<LogicalId>,
}

impl<'p> BuildContext<'p> {
  pub fn new(registry: &'p mut Registry, library: &'p dyn BrickLibrary, scope: ScopePath) -> Self {
    Self {
      registry,
      library,
      scope,
      inherited: Vec::new(),
    }
  }

  pub fn scope(&self) -> &ScopePath {
    &self.scope
  }

  /// Declare a resource in the current scope.
  pub fn resource(&mut self, short_name: &str, type_tag: &str, properties: Value) -> Result<ResourceHandle, CompileError> {
    self.resource_with(short_name, type_tag, properties, ResourceOptions::default())
  }

  /// Declare a resource with explicit ordering hints or a deletion policy.
  ///
  /// # Errors
  ///
  /// - `ValueType` if `properties` is neither a map nor null
  /// - any registration error (see [`Registry::register`])
  pub fn resource_with(
    &mut self,
    short_name: &str,
    type_tag: &str,
    properties: Value,
    options: ResourceOptions,
  ) -> Result<ResourceHandle, CompileError> {
    let properties = match properties {
      Value::Map(map) => map,
      Value::Null => BTreeMap::new(),
      other => return Err(CompileError::value_type("property map", other.type_name())),
    };

    let mut depends_on = self.inherited.clone();
    depends_on.extend(options.depends_on);

    let record = self.registry.register(
      &self.scope,
      short_name,
      type_tag,
      properties,
      &depends_on,
      options.deletion_policy,
    )?;
    Ok(ResourceHandle::new(record.id.clone()))
  }

  /// Invoke `brick` as a nested brick named `short_name`.
  pub fn brick(&mut self, short_name: &str, brick: &dyn Brick, params: &Value) -> Result<Value, CompileError> {
    self.brick_with(short_name, brick, params, BrickOptions::default())
  }

  /// Invoke a nested brick whose resources all carry the given ordering hints.
  pub fn brick_with(
    &mut self,
    short_name: &str,
    brick: &dyn Brick,
    params: &Value,
    options: BrickOptions,
  ) -> Result<Value, CompileError> {
    self.invoke(short_name, None, brick, params, options)
  }

  /// Look up `brick_name` in the library and invoke it as `short_name`.
  ///
  /// # Errors
  ///
  /// - `InvalidShortName` if `brick_name` is not `author.brick_name`
  /// - `UnknownBrick` if the library has no such brick
  pub fn import(&mut self, brick_name: &str, short_name: &str, params: &Value) -> Result<Value, CompileError> {
    check_brick_name(brick_name)?;
    let library = self.library;
    let brick = library.lookup(brick_name).ok_or_else(|| CompileError::UnknownBrick {
      name: brick_name.to_string(),
    })?;
    self.invoke(short_name, Some(brick_name.to_string()), brick, params, BrickOptions::default())
  }

  fn invoke(
    &mut self,
    short_name: &str,
    brick_name: Option<String>,
    brick: &dyn Brick,
    params: &Value,
    options: BrickOptions,
  ) -> Result<Value, CompileError> {
    let scope = self.registry.register_brick(&self.scope, short_name, brick_name)?.scope.clone();
    trace!(scope = %scope, "building nested brick");

    let mut inherited = self.inherited.clone();
    inherited.extend(options.depends_on);

    let mut child = BuildContext {
      registry: &mut *self.registry,
      library: self.library,
      scope,
      inherited,
    };
    brick.build(&mut child, params)
  }

  /// Handle to a resource of this scope that may be declared later.
  pub fn forward_ref(&self, short_name: &str) -> Result<ResourceHandle, CompileError> {
    self.forward_ref_in(&self.scope, short_name)
  }

  /// Handle to a resource of any scope that may be declared later.
  pub fn forward_ref_in(&self, scope: &ScopePath, short_name: &str) -> Result<ResourceHandle, CompileError> {
    check_name(scope, short_name)?;
    Ok(ResourceHandle::new(LogicalId::derive(scope, short_name)))
  }

  /// Declare a secret template parameter and return its deferred value.
  ///
  /// # Errors
  ///
  /// - `DeferredValueRead` or `ValueType` unless `value` is a literal string
  /// - any parameter declaration error (see [`Registry::declare_parameter`])
  pub fn sensitive(&mut self, name: &str, value: &Value) -> Result<Value, CompileError> {
    let secret = value.as_str()?.to_string();
    self.registry.declare_parameter(&self.scope, name, secret)?;
    Ok(Value::from(Intrinsic::Parameter(name.to_string())))
  }

  /// A `BrickFailed` error attributed to the current scope.
  pub fn failure(&self, message: impl Into<String>) -> CompileError {
    CompileError::BrickFailed {
      scope: self.scope.to_string(),
      message: message.into(),
    }
  }
}
