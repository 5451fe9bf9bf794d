//! Bricks written in Lua.
//!
//! A brick chunk returns `function(ctx, params)`. The `ctx` userdata only
//! lives for that call and offers:
//!
//! - `ctx.scope` - dotted scope path of the invocation
//! - `ctx:resource(name, type, props[, opts])` - `opts.depends_on` is a list
//!   of resources, `opts.deletion_policy` one of `Delete`/`Retain`/`Snapshot`
//! - `ctx:brick(name, fn, params[, opts])` - nested brick from a Lua function
//! - `ctx:import(brick_name, name, params)` - brick from the library
//! - `ctx:ref(name)` - forward reference to a resource of this scope
//! - `ctx:sensitive(name, value)` - secret template parameter
//!
//! Compile errors raised inside Lua keep their kind when they surface; any
//! other Lua error becomes `BrickFailed` for the invoking scope.

use std::path::Path;

use mlua::prelude::*;
use tracing::debug;

use super::convert::{LuaResource, lua_to_value, value_to_lua};
use super::runtime::{create_runtime, load_chunk, load_file};
use crate::builder::{Brick, BrickOptions, BuildContext, ResourceHandle, ResourceOptions};
use crate::error::CompileError;
use crate::registry::DeletionPolicy;
use crate::value::Value;

/// A brick loaded from Lua source. Owns its Lua state.
pub struct LuaBrick {
  name: String,
  lua: Lua,
  func: LuaFunction,
}

impl LuaBrick {
  /// Load a brick from `source`.
  ///
  /// # Errors
  ///
  /// `BrickFailed` if the chunk does not compile or does not return a function.
  pub fn from_source(name: &str, source: &str) -> Result<Self, CompileError> {
    let load = || -> LuaResult<(Lua, LuaFunction)> {
      let lua = create_runtime()?;
      let func = load_chunk(&lua, source, &format!("={}", name))?;
      Ok((lua, func))
    };
    let (lua, func) = load().map_err(|e| load_failure(name, &e))?;
    Ok(Self {
      name: name.to_string(),
      lua,
      func,
    })
  }

  /// Load a brick from a file; the brick is named after the file stem.
  pub fn from_file(path: &Path) -> Result<Self, CompileError> {
    let name = path
      .file_stem()
      .map(|s| s.to_string_lossy().to_string())
      .unwrap_or_else(|| path.display().to_string());
    let load = || -> LuaResult<(Lua, LuaFunction)> {
      let lua = create_runtime()?;
      let func = load_file(&lua, path)?;
      Ok((lua, func))
    };
    let (lua, func) = load().map_err(|e| load_failure(&name, &e))?;
    debug!(brick = %name, path = %path.display(), "loaded lua brick");
    Ok(Self { name, lua, func })
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl Brick for LuaBrick {
  fn build(&self, ctx: &mut BuildContext<'_>, params: &Value) -> Result<Value, CompileError> {
    call_brick(&self.lua, &self.func, ctx, params)
  }
}

/// A Lua function passed to `ctx:brick`.
struct LuaFnBrick<'l> {
  lua: &'l Lua,
  func: LuaFunction,
}

impl Brick for LuaFnBrick<'_> {
  fn build(&self, ctx: &mut BuildContext<'_>, params: &Value) -> Result<Value, CompileError> {
    call_brick(self.lua, &self.func, ctx, params)
  }
}

fn load_failure(name: &str, err: &LuaError) -> CompileError {
  CompileError::BrickFailed {
    scope: name.to_string(),
    message: err.to_string(),
  }
}

/// The compile error carried by `err`, if it wraps one.
fn compile_error(err: &LuaError) -> Option<CompileError> {
  match err {
    LuaError::CallbackError { cause, .. } => compile_error(cause),
    LuaError::WithContext { cause, .. } => compile_error(cause),
    LuaError::ExternalError(inner) => inner.downcast_ref::<CompileError>().cloned(),
    _ => None,
  }
}

fn call_brick(lua: &Lua, func: &LuaFunction, ctx: &mut BuildContext<'_>, params: &Value) -> Result<Value, CompileError> {
  let scope_name = ctx.scope().to_string();
  lua
    .scope(|scope| {
      let handle = scope.create_userdata(LuaBuildCtx { ctx: &mut *ctx })?;
      let params = value_to_lua(lua, params)?;
      lua_to_value(func.call::<LuaValue>((handle, params))?)
    })
    .map_err(|err| {
      compile_error(&err).unwrap_or_else(|| CompileError::BrickFailed {
        scope: scope_name,
        message: err.to_string(),
      })
    })
}

struct LuaBuildCtx<'c, 'p> {
  ctx: &'c mut BuildContext<'p>,
}

fn handles(opts: &LuaTable) -> LuaResult<Vec<ResourceHandle>> {
  let Some(list) = opts.get::<Option<LuaTable>>("depends_on")? else {
    return Ok(Vec::new());
  };
  let mut out = Vec::new();
  for i in 1..=list.raw_len() {
    let item: LuaAnyUserData = list.raw_get(i)?;
    out.push(item.borrow::<LuaResource>()?.0.clone());
  }
  Ok(out)
}

fn resource_options(opts: Option<LuaTable>) -> LuaResult<ResourceOptions> {
  let mut options = ResourceOptions::new();
  let Some(opts) = opts else {
    return Ok(options);
  };
  for handle in handles(&opts)? {
    options = options.depends_on(&handle);
  }
  if let Some(policy) = opts.get::<Option<String>>("deletion_policy")? {
    options = options.deletion_policy(policy.parse::<DeletionPolicy>().map_err(LuaError::external)?);
  }
  Ok(options)
}

fn brick_options(opts: Option<LuaTable>) -> LuaResult<BrickOptions> {
  let mut options = BrickOptions::new();
  if let Some(opts) = opts {
    for handle in handles(&opts)? {
      options = options.depends_on(&handle);
    }
  }
  Ok(options)
}

impl LuaUserData for LuaBuildCtx<'_, '_> {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("scope", |_, this| Ok(this.ctx.scope().to_string()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method_mut(
      "resource",
      |_, this, (name, type_tag, props, opts): (String, String, LuaValue, Option<LuaTable>)| {
        let options = resource_options(opts)?;
        let handle = this
          .ctx
          .resource_with(&name, &type_tag, lua_to_value(props)?, options)
          .map_err(LuaError::external)?;
        Ok(LuaResource(handle))
      },
    );

    methods.add_method_mut(
      "brick",
      |lua, this, (name, func, params, opts): (String, LuaFunction, LuaValue, Option<LuaTable>)| {
        let options = brick_options(opts)?;
        let nested = LuaFnBrick { lua, func };
        let result = this
          .ctx
          .brick_with(&name, &nested, &lua_to_value(params)?, options)
          .map_err(LuaError::external)?;
        value_to_lua(lua, &result)
      },
    );

    methods.add_method_mut(
      "import",
      |lua, this, (brick_name, name, params): (String, String, LuaValue)| {
        let result = this
          .ctx
          .import(&brick_name, &name, &lua_to_value(params)?)
          .map_err(LuaError::external)?;
        value_to_lua(lua, &result)
      },
    );

    methods.add_method("ref", |_, this, name: String| {
      let handle = this.ctx.forward_ref(&name).map_err(LuaError::external)?;
      Ok(LuaResource(handle))
    });

    methods.add_method_mut("sensitive", |lua, this, (name, value): (String, LuaValue)| {
      let deferred = this
        .ctx
        .sensitive(&name, &lua_to_value(value)?)
        .map_err(LuaError::external)?;
      value_to_lua(lua, &deferred)
    });
  }
}
