//! Conversions between Lua values and [`Value`]s.
//!
//! Literals map onto their Lua counterparts. Deferred values cross into Lua
//! as [`LuaDeferred`] userdata, which can be concatenated with `..` and
//! navigated with `:get(field)` / `:at(index)`, but never read: `tostring`
//! raises `DeferredValueRead`. Resource handles cross as [`LuaResource`].

use std::collections::BTreeMap;

use mlua::prelude::*;

use crate::builder::ResourceHandle;
use crate::error::CompileError;
use crate::value::Value;

/// A deferred value held by Lua code.
#[derive(Debug, Clone)]
pub struct LuaDeferred(pub Value);

/// A resource handle held by Lua code.
#[derive(Debug, Clone)]
pub struct LuaResource(pub ResourceHandle);

fn concat(lua: &Lua, (left, right): (LuaValue, LuaValue)) -> LuaResult<LuaValue> {
  let joined = Value::concat([lua_to_value(left)?, lua_to_value(right)?]).map_err(LuaError::external)?;
  value_to_lua(lua, &joined)
}

fn deferred_read(what: String) -> LuaError {
  LuaError::external(CompileError::DeferredValueRead { what })
}

impl LuaUserData for LuaDeferred {
  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("get", |lua, this, field: String| {
      let value = this.0.field(&field).map_err(LuaError::external)?;
      value_to_lua(lua, &value)
    });

    methods.add_method("at", |lua, this, index: usize| {
      let value = this.0.index(index).map_err(LuaError::external)?;
      value_to_lua(lua, &value)
    });

    methods.add_meta_function(LuaMetaMethod::Concat, concat);

    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| -> LuaResult<String> {
      Err(deferred_read(format!("{} passed to tostring", this.0.type_name())))
    });
  }
}

impl LuaUserData for LuaResource {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("id", |_, this| Ok(this.0.id().to_string()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("ref", |lua, this, ()| value_to_lua(lua, &this.0.reference()));

    methods.add_method("attr", |lua, this, name: String| value_to_lua(lua, &this.0.attr(&name)));

    methods.add_meta_function(LuaMetaMethod::Concat, concat);

    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| -> LuaResult<String> {
      Err(deferred_read(format!("resource {} passed to tostring", this.0.id())))
    });
  }
}

/// Convert a [`Value`] into Lua.
pub fn value_to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
  match value {
    Value::Null => Ok(LuaValue::Nil),
    Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => Ok(LuaValue::Integer(i)),
      None => Ok(LuaValue::Number(n.as_f64().unwrap_or(f64::NAN))),
    },
    Value::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
    Value::List(items) => {
      let table = lua.create_table()?;
      for (i, item) in items.iter().enumerate() {
        table.set(i + 1, value_to_lua(lua, item)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    Value::Map(map) => {
      let table = lua.create_table()?;
      for (k, v) in map {
        table.set(k.as_str(), value_to_lua(lua, v)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    Value::Reference(_) | Value::Concat(_) | Value::Intrinsic(_) => {
      Ok(LuaValue::UserData(lua.create_userdata(LuaDeferred(value.clone()))?))
    }
  }
}

/// Convert a Lua value into a [`Value`].
///
/// Tables with a non-nil `[1]` entry are lists of their sequence part; any
/// other table is a map and must have string keys.
pub fn lua_to_value(value: LuaValue) -> LuaResult<Value> {
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(b)),
    LuaValue::Integer(i) => Ok(Value::from(i)),
    LuaValue::Number(n) => Value::float(n).map_err(LuaError::external),
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::Table(t) => {
      let len = t.raw_len();
      let first: LuaValue = t.raw_get(1)?;
      if len > 0 && !first.is_nil() {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
          items.push(lua_to_value(t.raw_get(i)?)?);
        }
        Ok(Value::List(items))
      } else {
        let mut map = BTreeMap::new();
        for pair in t.pairs::<LuaValue, LuaValue>() {
          let (k, v) = pair?;
          let key = match k {
            LuaValue::String(s) => s.to_str()?.to_string(),
            other => {
              return Err(LuaError::external(CompileError::ValueType {
                expected: "string table key".to_string(),
                found: other.type_name().to_string(),
              }));
            }
          };
          map.insert(key, lua_to_value(v)?);
        }
        Ok(Value::Map(map))
      }
    }
    LuaValue::UserData(ud) => {
      if let Ok(deferred) = ud.borrow::<LuaDeferred>() {
        return Ok(deferred.0.clone());
      }
      if let Ok(resource) = ud.borrow::<LuaResource>() {
        return Ok(resource.0.reference());
      }
      Err(LuaError::external(CompileError::ValueType {
        expected: "brick value".to_string(),
        found: "foreign userdata".to_string(),
      }))
    }
    other => Err(LuaError::external(CompileError::ValueType {
      expected: "brick value".to_string(),
      found: other.type_name().to_string(),
    })),
  }
}
