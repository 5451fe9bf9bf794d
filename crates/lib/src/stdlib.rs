//! Value producers available to every brick.
//!
//! Each function returns an ordinary [`Value`]. When every input is a literal
//! and the result is exact, `join`, `split` and `select` fold locally;
//! otherwise the call is kept as a deferred [`Intrinsic`] for the resolver.

use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::value::{Intrinsic, Pseudo, Value};

fn literal_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn is_deferred_list(value: &Value) -> bool {
  match value {
    Value::Reference(_) => true,
    Value::Intrinsic(intrinsic) => intrinsic.is_list(),
    _ => false,
  }
}

fn string_like(what: &str, value: &Value) -> Result<(), CompileError> {
  match value {
    Value::String(_) | Value::Reference(_) | Value::Concat(_) | Value::Intrinsic(_) => Ok(()),
    other => Err(CompileError::value_type(format!("string for {}", what), other.type_name())),
  }
}

/// Join list elements with `delimiter`.
pub fn join(delimiter: &str, list: Value) -> Result<Value, CompileError> {
  match &list {
    Value::List(items) => {
      if let Some(parts) = items.iter().map(literal_text).collect::<Option<Vec<_>>>() {
        return Ok(Value::String(parts.join(delimiter)));
      }
      for item in items {
        if matches!(item, Value::Null | Value::List(_) | Value::Map(_)) {
          return Err(CompileError::value_type("string element for join", item.type_name()));
        }
      }
    }
    deferred if is_deferred_list(deferred) => {}
    other => return Err(CompileError::value_type("list for join", other.type_name())),
  }
  Ok(Value::from(Intrinsic::Join {
    delimiter: delimiter.to_string(),
    list,
  }))
}

/// Split a string on `delimiter`.
pub fn split(delimiter: &str, source: Value) -> Result<Value, CompileError> {
  if delimiter.is_empty() {
    return Err(CompileError::value_type("non-empty delimiter for split", "empty string"));
  }
  if let Value::String(s) = &source {
    return Ok(Value::List(s.split(delimiter).map(Value::from).collect()));
  }
  string_like("split", &source)?;
  Ok(Value::from(Intrinsic::Split {
    delimiter: delimiter.to_string(),
    source,
  }))
}

/// Select the element at `index` of a list.
pub fn select(index: usize, list: Value) -> Result<Value, CompileError> {
  match list {
    Value::List(_) => list.index(index),
    deferred if is_deferred_list(&deferred) => Ok(Value::from(Intrinsic::Select { index, list: deferred })),
    other => Err(CompileError::value_type("list for select", other.type_name())),
  }
}

/// Base64-encode a string at deployment time.
pub fn base64(value: Value) -> Result<Value, CompileError> {
  string_like("base64", &value)?;
  Ok(Value::from(Intrinsic::Base64(value)))
}

/// Substitute `${name}` variables in `format` at deployment time.
pub fn sub(format: &str, variables: BTreeMap<String, Value>) -> Result<Value, CompileError> {
  for (name, value) in &variables {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
      return Err(CompileError::value_type("alphanumeric variable name for sub", name.clone()));
    }
    if matches!(value, Value::Null | Value::List(_) | Value::Map(_)) {
      return Err(CompileError::value_type(format!("string for sub variable '{}'", name), value.type_name()));
    }
  }
  Ok(Value::from(Intrinsic::Sub {
    format: format.to_string(),
    variables,
  }))
}

/// Split a CIDR block into `count` sub-blocks of `bits` host bits each.
pub fn cidr(block: Value, count: u32, bits: u32) -> Result<Value, CompileError> {
  string_like("cidr", &block)?;
  if !(1..=256).contains(&count) {
    return Err(CompileError::value_type("cidr count between 1 and 256", count.to_string()));
  }
  if !(1..=128).contains(&bits) {
    return Err(CompileError::value_type("cidr bits between 1 and 128", bits.to_string()));
  }
  Ok(Value::from(Intrinsic::Cidr { block, count, bits }))
}

/// Availability zones of `region`; `Null` means the stack's own region.
pub fn get_azs(region: Value) -> Result<Value, CompileError> {
  let region = match region {
    Value::Null => pseudo(Pseudo::Region),
    other => {
      string_like("get_azs", &other)?;
      other
    }
  };
  Ok(Value::from(Intrinsic::GetAzs { region }))
}

pub fn pseudo(parameter: Pseudo) -> Value {
  Value::from(Intrinsic::Pseudo(parameter))
}

pub fn region() -> Value {
  pseudo(Pseudo::Region)
}

pub fn account_id() -> Value {
  pseudo(Pseudo::AccountId)
}

pub fn partition() -> Value {
  pseudo(Pseudo::Partition)
}

pub fn stack_id() -> Value {
  pseudo(Pseudo::StackId)
}

pub fn stack_name() -> Value {
  pseudo(Pseudo::StackName)
}

pub fn url_suffix() -> Value {
  pseudo(Pseudo::UrlSuffix)
}

pub fn notification_arns() -> Value {
  pseudo(Pseudo::NotificationArns)
}
