//! The `ic` global table.
//!
//! Mirrors [`crate::stdlib`] for Lua bricks:
//! - `ic.join(delim, list)`, `ic.split(delim, source)`, `ic.select(index, list)`
//! - `ic.base64(value)`, `ic.sub(format[, vars])`, `ic.cidr(block, count, bits)`
//! - `ic.get_azs([region])`
//! - `ic.region`, `ic.account_id`, `ic.partition`, `ic.stack_id`,
//!   `ic.stack_name`, `ic.url_suffix`, `ic.notification_arns`
//!
//! Indices passed to `ic.select` are zero-based.

use std::collections::BTreeMap;

use mlua::prelude::*;

use super::convert::{lua_to_value, value_to_lua};
use crate::error::CompileError;
use crate::stdlib;
use crate::value::Value;

fn lift(lua: &Lua, result: Result<Value, CompileError>) -> LuaResult<LuaValue> {
  value_to_lua(lua, &result.map_err(LuaError::external)?)
}

/// Register the `ic` global table in the Lua runtime.
pub fn register_globals(lua: &Lua) -> LuaResult<()> {
  let ic = lua.create_table()?;

  ic.set(
    "join",
    lua.create_function(|lua, (delimiter, list): (String, LuaValue)| {
      lift(lua, stdlib::join(&delimiter, lua_to_value(list)?))
    })?,
  )?;

  ic.set(
    "split",
    lua.create_function(|lua, (delimiter, source): (String, LuaValue)| {
      lift(lua, stdlib::split(&delimiter, lua_to_value(source)?))
    })?,
  )?;

  ic.set(
    "select",
    lua.create_function(|lua, (index, list): (usize, LuaValue)| {
      lift(lua, stdlib::select(index, lua_to_value(list)?))
    })?,
  )?;

  ic.set(
    "base64",
    lua.create_function(|lua, value: LuaValue| lift(lua, stdlib::base64(lua_to_value(value)?)))?,
  )?;

  ic.set(
    "sub",
    lua.create_function(|lua, (format, vars): (String, Option<LuaTable>)| {
      let mut variables = BTreeMap::new();
      if let Some(vars) = vars {
        for pair in vars.pairs::<String, LuaValue>() {
          let (name, value) = pair?;
          variables.insert(name, lua_to_value(value)?);
        }
      }
      lift(lua, stdlib::sub(&format, variables))
    })?,
  )?;

  ic.set(
    "cidr",
    lua.create_function(|lua, (block, count, bits): (LuaValue, u32, u32)| {
      lift(lua, stdlib::cidr(lua_to_value(block)?, count, bits))
    })?,
  )?;

  ic.set(
    "get_azs",
    lua.create_function(|lua, region: LuaValue| lift(lua, stdlib::get_azs(lua_to_value(region)?)))?,
  )?;

  ic.set("region", value_to_lua(lua, &stdlib::region())?)?;
  ic.set("account_id", value_to_lua(lua, &stdlib::account_id())?)?;
  ic.set("partition", value_to_lua(lua, &stdlib::partition())?)?;
  ic.set("stack_id", value_to_lua(lua, &stdlib::stack_id())?)?;
  ic.set("stack_name", value_to_lua(lua, &stdlib::stack_name())?)?;
  ic.set("url_suffix", value_to_lua(lua, &stdlib::url_suffix())?)?;
  ic.set("notification_arns", value_to_lua(lua, &stdlib::notification_arns())?)?;

  lua.globals().set("ic", ic)?;

  Ok(())
}
