//! The value model shared by bricks, resources and the resolver.
//!
//! A [`Value`] is either a literal (null, bool, number, string, list, map) or
//! a deferred value whose content is only known at deployment time:
//!
//! - [`Value::Reference`] - an attribute of a resource
//! - [`Value::Concat`] - a string mixing literal text and deferred parts
//! - [`Value::Intrinsic`] - a provider function applied to values
//!
//! Deferred values can be moved around, nested into lists and maps, and
//! interpolated into strings, but never read. Every literal accessor fails
//! with [`CompileError::DeferredValueRead`] when handed a deferred value.
//!
//! # Interpolation
//!
//! ```
//! use icbrick_lib::reference::Reference;
//! use icbrick_lib::registry::LogicalId;
//! use icbrick_lib::value::Value;
//!
//! let ip = Value::Reference(Reference::attribute(LogicalId::new("Instance0a1b2c3d4e"), "PublicIp"));
//! let url = Value::concat([Value::from("http://"), ip, Value::from(":"), Value::from(8080)]).unwrap();
//! assert_eq!(url.parts().len(), 3);
//! ```

use std::collections::BTreeMap;

use serde_json::Number;

use crate::error::CompileError;
use crate::reference::{Accessor, Reference};

/// Pseudo parameters the provider substitutes in every stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pseudo {
  AccountId,
  NotificationArns,
  Partition,
  Region,
  StackId,
  StackName,
  UrlSuffix,
}

impl Pseudo {
  /// The native parameter name, e.g. `AWS::Region`.
  pub fn name(&self) -> &'static str {
    match self {
      Pseudo::AccountId => "AWS::AccountId",
      Pseudo::NotificationArns => "AWS::NotificationARNs",
      Pseudo::Partition => "AWS::Partition",
      Pseudo::Region => "AWS::Region",
      Pseudo::StackId => "AWS::StackId",
      Pseudo::StackName => "AWS::StackName",
      Pseudo::UrlSuffix => "AWS::URLSuffix",
    }
  }
}

/// A provider function applied to (possibly deferred) arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
  Join { delimiter: String, list: Value },
  Split { delimiter: String, source: Value },
  Select { index: usize, list: Value },
  Base64(Value),
  Sub {
    format: String,
    variables: BTreeMap<String, Value>,
  },
  Cidr { block: Value, count: u32, bits: u32 },
  GetAzs { region: Value },
  Pseudo(Pseudo),
  /// A template parameter declared through `BuildContext::sensitive`.
  Parameter(String),
}

impl Intrinsic {
  /// Whether the function evaluates to a list at deployment time.
  pub fn is_list(&self) -> bool {
    matches!(
      self,
      Intrinsic::Split { .. } | Intrinsic::GetAzs { .. } | Intrinsic::Cidr { .. } | Intrinsic::Pseudo(Pseudo::NotificationArns)
    )
  }

  pub fn name(&self) -> &'static str {
    match self {
      Intrinsic::Join { .. } => "Fn::Join",
      Intrinsic::Split { .. } => "Fn::Split",
      Intrinsic::Select { .. } => "Fn::Select",
      Intrinsic::Base64(_) => "Fn::Base64",
      Intrinsic::Sub { .. } => "Fn::Sub",
      Intrinsic::Cidr { .. } => "Fn::Cidr",
      Intrinsic::GetAzs { .. } => "Fn::GetAZs",
      Intrinsic::Pseudo(_) | Intrinsic::Parameter(_) => "Ref",
    }
  }

  fn for_each_arg<'a>(&'a self, f: &mut impl FnMut(&'a Value)) {
    match self {
      Intrinsic::Join { list, .. } | Intrinsic::Select { list, .. } => f(list),
      Intrinsic::Split { source, .. } => f(source),
      Intrinsic::Base64(value) => f(value),
      Intrinsic::Sub { variables, .. } => variables.values().for_each(f),
      Intrinsic::Cidr { block, .. } => f(block),
      Intrinsic::GetAzs { region } => f(region),
      Intrinsic::Pseudo(_) | Intrinsic::Parameter(_) => {}
    }
  }
}

/// A literal or deferred value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Number(Number),
  String(String),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
  Reference(Reference),
  /// Interpolated string; always normalized by [`Value::concat`].
  Concat(Vec<Value>),
  Intrinsic(Box<Intrinsic>),
}

impl Value {
  /// Build a map value from key/value pairs.
  pub fn map<K, V, I>(entries: I) -> Value
  where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
  {
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }

  /// Build a float value. Non-finite numbers have no JSON form.
  pub fn float(value: f64) -> Result<Value, CompileError> {
    Number::from_f64(value)
      .map(Value::Number)
      .ok_or_else(|| CompileError::value_type("finite number", value.to_string()))
  }

  /// Interpolate `parts` into one string value.
  ///
  /// Nested concats are flattened, numbers and booleans are rendered as
  /// text, adjacent literal text is merged, and the result collapses to a
  /// plain string when nothing deferred remains (or to the deferred part
  /// itself when it is the only part).
  ///
  /// # Errors
  ///
  /// Returns `ValueType` for null, list or map parts, and for intrinsics
  /// that evaluate to a list.
  pub fn concat<I: IntoIterator<Item = Value>>(parts: I) -> Result<Value, CompileError> {
    let mut out = Vec::new();
    for part in parts {
      push_part(&mut out, part)?;
    }

    match out.len() {
      0 => Ok(Value::String(String::new())),
      1 => Ok(out.remove(0)),
      _ => Ok(Value::Concat(out)),
    }
  }

  /// Parts of an interpolated string; a plain value is its own single part.
  pub fn parts(&self) -> &[Value] {
    match self {
      Value::Concat(parts) => parts,
      other => std::slice::from_ref(other),
    }
  }

  /// Whether this value itself is only known at deployment time.
  pub fn is_deferred(&self) -> bool {
    matches!(self, Value::Reference(_) | Value::Concat(_) | Value::Intrinsic(_))
  }

  /// Whether any deferred value appears anywhere inside this value.
  pub fn contains_deferred(&self) -> bool {
    match self {
      Value::List(items) => items.iter().any(Value::contains_deferred),
      Value::Map(map) => map.values().any(Value::contains_deferred),
      other => other.is_deferred(),
    }
  }

  /// Collect every reference embedded in this value, in traversal order.
  pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
    match self {
      Value::Reference(reference) => out.push(reference),
      Value::List(items) | Value::Concat(items) => items.iter().for_each(|v| v.collect_references(out)),
      Value::Map(map) => map.values().for_each(|v| v.collect_references(out)),
      Value::Intrinsic(intrinsic) => intrinsic.for_each_arg(&mut |v| v.collect_references(out)),
      Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
  }

  /// Collect every template parameter name embedded in this value.
  pub fn collect_parameters<'a>(&'a self, out: &mut Vec<&'a str>) {
    match self {
      Value::Intrinsic(intrinsic) => match intrinsic.as_ref() {
        Intrinsic::Parameter(name) => out.push(name),
        other => other.for_each_arg(&mut |v| v.collect_parameters(out)),
      },
      Value::List(items) | Value::Concat(items) => items.iter().for_each(|v| v.collect_parameters(out)),
      Value::Map(map) => map.values().for_each(|v| v.collect_parameters(out)),
      Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Reference(_) => {}
    }
  }

  /// Human readable name of the variant, used in error messages.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::List(_) => "list",
      Value::Map(_) => "map",
      Value::Reference(_) => "reference",
      Value::Concat(_) => "interpolated string",
      Value::Intrinsic(_) => "intrinsic",
    }
  }

  fn deferred_read(&self, wanted: &str) -> CompileError {
    let what = match self {
      Value::Reference(reference) => format!("{} read as {}", reference, wanted),
      other => format!("{} read as {}", other.type_name(), wanted),
    };
    CompileError::DeferredValueRead { what }
  }

  fn literal(&self, wanted: &str) -> Result<&Value, CompileError> {
    if self.is_deferred() {
      return Err(self.deferred_read(wanted));
    }
    Ok(self)
  }

  pub fn as_str(&self) -> Result<&str, CompileError> {
    match self.literal("string")? {
      Value::String(s) => Ok(s),
      other => Err(CompileError::value_type("string", other.type_name())),
    }
  }

  pub fn as_bool(&self) -> Result<bool, CompileError> {
    match self.literal("bool")? {
      Value::Bool(b) => Ok(*b),
      other => Err(CompileError::value_type("bool", other.type_name())),
    }
  }

  pub fn as_i64(&self) -> Result<i64, CompileError> {
    match self.literal("integer")? {
      Value::Number(n) => n
        .as_i64()
        .ok_or_else(|| CompileError::value_type("integer", n.to_string())),
      other => Err(CompileError::value_type("integer", other.type_name())),
    }
  }

  pub fn as_f64(&self) -> Result<f64, CompileError> {
    match self.literal("number")? {
      Value::Number(n) => n
        .as_f64()
        .ok_or_else(|| CompileError::value_type("number", n.to_string())),
      other => Err(CompileError::value_type("number", other.type_name())),
    }
  }

  pub fn as_list(&self) -> Result<&[Value], CompileError> {
    match self.literal("list")? {
      Value::List(items) => Ok(items),
      other => Err(CompileError::value_type("list", other.type_name())),
    }
  }

  pub fn as_map(&self) -> Result<&BTreeMap<String, Value>, CompileError> {
    match self.literal("map")? {
      Value::Map(map) => Ok(map),
      other => Err(CompileError::value_type("map", other.type_name())),
    }
  }

  /// Access a field of a map, or extend a reference's attribute path.
  pub fn field(&self, name: &str) -> Result<Value, CompileError> {
    match self {
      Value::Map(map) => map
        .get(name)
        .cloned()
        .ok_or_else(|| CompileError::value_type(format!("field '{}'", name), "map without it")),
      Value::Reference(reference) => Ok(Value::Reference(reference.with(Accessor::Field(name.to_string())))),
      other => Err(CompileError::value_type(format!("map with field '{}'", name), other.type_name())),
    }
  }

  /// Access a list element, or select from a deferred list.
  pub fn index(&self, index: usize) -> Result<Value, CompileError> {
    match self {
      Value::List(items) => items.get(index).cloned().ok_or_else(|| {
        CompileError::value_type(format!("index {}", index), format!("list of length {}", items.len()))
      }),
      Value::Reference(reference) => Ok(Value::Reference(reference.with(Accessor::Index(index)))),
      Value::Intrinsic(intrinsic) if intrinsic.is_list() => Ok(Value::Intrinsic(Box::new(Intrinsic::Select {
        index,
        list: self.clone(),
      }))),
      other => Err(CompileError::value_type(format!("list with index {}", index), other.type_name())),
    }
  }

  /// Convert a plain JSON value (e.g. brick parameters) into a literal.
  pub fn from_json(json: serde_json::Value) -> Value {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => Value::Number(n),
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
      serde_json::Value::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect()),
    }
  }

  /// Render a fully literal value as JSON.
  ///
  /// # Errors
  ///
  /// Returns `DeferredValueRead` if any part of the value is deferred.
  pub fn to_json(&self) -> Result<serde_json::Value, CompileError> {
    Ok(match self.literal("json")? {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Number(n) => serde_json::Value::Number(n.clone()),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect::<Result<_, _>>()?),
      Value::Map(map) => {
        let mut out = serde_json::Map::new();
        for (k, v) in map {
          out.insert(k.clone(), v.to_json()?);
        }
        serde_json::Value::Object(out)
      }
      Value::Reference(_) | Value::Concat(_) | Value::Intrinsic(_) => unreachable!("rejected by literal()"),
    })
  }
}

fn push_part(out: &mut Vec<Value>, part: Value) -> Result<(), CompileError> {
  match part {
    Value::Concat(inner) => {
      for p in inner {
        push_part(out, p)?;
      }
    }
    Value::String(s) => push_text(out, s),
    Value::Number(n) => push_text(out, n.to_string()),
    Value::Bool(b) => push_text(out, b.to_string()),
    Value::Null | Value::List(_) | Value::Map(_) => {
      return Err(CompileError::value_type("string part", part.type_name()));
    }
    Value::Intrinsic(intrinsic) if intrinsic.is_list() => {
      return Err(CompileError::value_type(
        "string part",
        format!("list-valued {}", intrinsic.name()),
      ));
    }
    deferred @ (Value::Reference(_) | Value::Intrinsic(_)) => out.push(deferred),
  }
  Ok(())
}

fn push_text(out: &mut Vec<Value>, text: String) {
  if text.is_empty() {
    return;
  }
  if let Some(Value::String(last)) = out.last_mut() {
    last.push_str(&text);
  } else {
    out.push(Value::String(text));
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Number(n.into())
  }
}

impl From<i32> for Value {
  fn from(n: i32) -> Self {
    Value::Number(n.into())
  }
}

impl From<u32> for Value {
  fn from(n: u32) -> Self {
    Value::Number(n.into())
  }
}

impl From<u64> for Value {
  fn from(n: u64) -> Self {
    Value::Number(n.into())
  }
}

impl From<Reference> for Value {
  fn from(reference: Reference) -> Self {
    Value::Reference(reference)
  }
}

impl From<Intrinsic> for Value {
  fn from(intrinsic: Intrinsic) -> Self {
    Value::Intrinsic(Box::new(intrinsic))
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Map(map)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::List(items.into_iter().map(Into::into).collect())
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(Value::Null)
  }
}
