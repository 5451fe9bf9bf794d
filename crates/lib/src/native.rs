//! Native template expressions.
//!
//! [`Native`] is the resolved form of a [`Value`](crate::value::Value): every
//! deferred part has become an intrinsic function call of the target
//! format. [`Native::to_json`] renders it as template JSON.

use std::collections::BTreeMap;

use serde_json::{Number, json};

/// A resolved template expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
  Null,
  Bool(bool),
  Number(Number),
  String(String),
  List(Vec<Native>),
  Map(BTreeMap<String, Native>),
  /// `{"Ref": name}` for resources, parameters and pseudo parameters.
  Ref(String),
  GetAtt {
    id: String,
    attribute: String,
  },
  Join {
    delimiter: String,
    list: Box<Native>,
  },
  Sub {
    format: String,
    variables: BTreeMap<String, Native>,
  },
  Select {
    index: usize,
    list: Box<Native>,
  },
  Split {
    delimiter: String,
    source: Box<Native>,
  },
  Base64(Box<Native>),
  Cidr {
    block: Box<Native>,
    count: u32,
    bits: u32,
  },
  GetAzs(Box<Native>),
  ImportValue(String),
}

impl Native {
  /// Name of the intrinsic function, `None` for literals.
  pub fn intrinsic(&self) -> Option<&'static str> {
    match self {
      Native::Null | Native::Bool(_) | Native::Number(_) | Native::String(_) | Native::List(_) | Native::Map(_) => None,
      Native::Ref(_) => Some("Ref"),
      Native::GetAtt { .. } => Some("Fn::GetAtt"),
      Native::Join { .. } => Some("Fn::Join"),
      Native::Sub { .. } => Some("Fn::Sub"),
      Native::Select { .. } => Some("Fn::Select"),
      Native::Split { .. } => Some("Fn::Split"),
      Native::Base64(_) => Some("Fn::Base64"),
      Native::Cidr { .. } => Some("Fn::Cidr"),
      Native::GetAzs(_) => Some("Fn::GetAZs"),
      Native::ImportValue(_) => Some("Fn::ImportValue"),
    }
  }

  /// Whether the expression evaluates to a list at deployment time.
  pub fn is_deferred_list(&self) -> bool {
    match self {
      Native::Split { .. } | Native::Cidr { .. } | Native::GetAzs(_) => true,
      Native::Ref(name) => name == "AWS::NotificationARNs",
      _ => false,
    }
  }

  /// Visit this expression and every sub-expression, parents first.
  pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Native)) {
    f(self);
    match self {
      Native::List(items) => items.iter().for_each(|n| n.walk(f)),
      Native::Map(map) => map.values().for_each(|n| n.walk(f)),
      Native::Sub { variables, .. } => variables.values().for_each(|n| n.walk(f)),
      Native::Join { list, .. } | Native::Select { list, .. } => list.walk(f),
      Native::Split { source, .. } => source.walk(f),
      Native::Base64(inner) | Native::GetAzs(inner) => inner.walk(f),
      Native::Cidr { block, .. } => block.walk(f),
      Native::Null
      | Native::Bool(_)
      | Native::Number(_)
      | Native::String(_)
      | Native::Ref(_)
      | Native::GetAtt { .. }
      | Native::ImportValue(_) => {}
    }
  }

  /// Rebuild the expression, replacing every node for which `f` returns a
  /// substitute. Substitutes are not descended into.
  pub fn rewrite(&self, f: &mut impl FnMut(&Native) -> Option<Native>) -> Native {
    if let Some(replacement) = f(self) {
      return replacement;
    }
    match self {
      Native::List(items) => Native::List(items.iter().map(|n| n.rewrite(f)).collect()),
      Native::Map(map) => Native::Map(map.iter().map(|(k, v)| (k.clone(), v.rewrite(f))).collect()),
      Native::Sub { format, variables } => Native::Sub {
        format: format.clone(),
        variables: variables.iter().map(|(k, v)| (k.clone(), v.rewrite(f))).collect(),
      },
      Native::Join { delimiter, list } => Native::Join {
        delimiter: delimiter.clone(),
        list: Box::new(list.rewrite(f)),
      },
      Native::Select { index, list } => Native::Select {
        index: *index,
        list: Box::new(list.rewrite(f)),
      },
      Native::Split { delimiter, source } => Native::Split {
        delimiter: delimiter.clone(),
        source: Box::new(source.rewrite(f)),
      },
      Native::Base64(inner) => Native::Base64(Box::new(inner.rewrite(f))),
      Native::GetAzs(inner) => Native::GetAzs(Box::new(inner.rewrite(f))),
      Native::Cidr { block, count, bits } => Native::Cidr {
        block: Box::new(block.rewrite(f)),
        count: *count,
        bits: *bits,
      },
      leaf => leaf.clone(),
    }
  }

  /// Render as template JSON.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Native::Null => serde_json::Value::Null,
      Native::Bool(b) => json!(b),
      Native::Number(n) => serde_json::Value::Number(n.clone()),
      Native::String(s) => json!(s),
      Native::List(items) => serde_json::Value::Array(items.iter().map(Native::to_json).collect()),
      Native::Map(map) => {
        let mut out = serde_json::Map::new();
        for (k, v) in map {
          out.insert(k.clone(), v.to_json());
        }
        serde_json::Value::Object(out)
      }
      Native::Ref(name) => json!({ "Ref": name }),
      Native::GetAtt { id, attribute } => json!({ "Fn::GetAtt": [id, attribute] }),
      Native::Join { delimiter, list } => json!({ "Fn::Join": [delimiter, list.to_json()] }),
      Native::Sub { format, variables } if variables.is_empty() => json!({ "Fn::Sub": format }),
      Native::Sub { format, variables } => {
        let mut vars = serde_json::Map::new();
        for (k, v) in variables {
          vars.insert(k.clone(), v.to_json());
        }
        json!({ "Fn::Sub": [format, vars] })
      }
      Native::Select { index, list } => json!({ "Fn::Select": [index, list.to_json()] }),
      Native::Split { delimiter, source } => json!({ "Fn::Split": [delimiter, source.to_json()] }),
      Native::Base64(inner) => json!({ "Fn::Base64": inner.to_json() }),
      Native::Cidr { block, count, bits } => json!({ "Fn::Cidr": [block.to_json(), count, bits] }),
      Native::GetAzs(region) => json!({ "Fn::GetAZs": region.to_json() }),
      Native::ImportValue(name) => json!({ "Fn::ImportValue": name }),
    }
  }

  /// Encode the value as a JSON document string evaluated at deployment
  /// time: literal structure becomes text and deferred parts are spliced in
  /// with `Fn::Join`. Deferred strings are quoted; deferred lists become
  /// JSON arrays of strings.
  pub fn encode_json(&self) -> Native {
    let mut fragments = Fragments::default();
    fragments.encode(self);
    fragments.finish()
  }
}

#[derive(Default)]
struct Fragments {
  parts: Vec<Native>,
}

impl Fragments {
  fn text(&mut self, text: &str) {
    if let Some(Native::String(last)) = self.parts.last_mut() {
      last.push_str(text);
    } else {
      self.parts.push(Native::String(text.to_string()));
    }
  }

  fn encode(&mut self, native: &Native) {
    match native {
      Native::Null | Native::Bool(_) | Native::Number(_) | Native::String(_) => {
        self.text(&native.to_json().to_string());
      }
      Native::List(items) => {
        self.text("[");
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            self.text(",");
          }
          self.encode(item);
        }
        self.text("]");
      }
      Native::Map(map) => {
        self.text("{");
        for (i, (key, value)) in map.iter().enumerate() {
          if i > 0 {
            self.text(",");
          }
          self.text(&serde_json::Value::String(key.clone()).to_string());
          self.text(":");
          self.encode(value);
        }
        self.text("}");
      }
      list if list.is_deferred_list() => {
        self.text("[\"");
        self.parts.push(Native::Join {
          delimiter: "\",\"".to_string(),
          list: Box::new(list.clone()),
        });
        self.text("\"]");
      }
      deferred => {
        self.text("\"");
        self.string_body(deferred);
        self.text("\"");
      }
    }
  }

  /// Splice a deferred string between quotes, escaping any literal text
  /// joined into it.
  fn string_body(&mut self, native: &Native) {
    match native {
      Native::String(s) => {
        let quoted = serde_json::Value::String(s.clone()).to_string();
        self.text(&quoted[1..quoted.len() - 1]);
      }
      Native::Join { delimiter, list } => match list.as_ref() {
        Native::List(items) => {
          for (i, item) in items.iter().enumerate() {
            if i > 0 {
              self.string_body(&Native::String(delimiter.clone()));
            }
            self.string_body(item);
          }
        }
        _ => self.parts.push(native.clone()),
      },
      other => self.parts.push(other.clone()),
    }
  }

  fn finish(mut self) -> Native {
    match self.parts.len() {
      0 => Native::String(String::new()),
      1 if matches!(self.parts[0], Native::String(_)) => self.parts.remove(0),
      _ => Native::Join {
        delimiter: String::new(),
        list: Box::new(Native::List(self.parts)),
      },
    }
  }
}
