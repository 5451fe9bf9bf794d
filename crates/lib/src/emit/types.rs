/// One serialized template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  /// Scope the document was built from, e.g. `app` or `app.network`.
  pub name: String,
  /// File name referenced by the parent's `TemplateURL`.
  pub file_name: String,
  pub body: String,
}

impl Document {
  /// Parse the body back into JSON.
  pub fn json(&self) -> serde_json::Result<serde_json::Value> {
    serde_json::from_str(&self.body)
  }
}

/// The root document and every nested document split off from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
  pub root: Document,
  /// Nested documents in the order they were split off.
  pub nested: Vec<Document>,
}

impl TemplateSet {
  pub fn len(&self) -> usize {
    1 + self.nested.len()
  }

  pub fn is_empty(&self) -> bool {
    false
  }

  pub fn documents(&self) -> impl Iterator<Item = &Document> {
    std::iter::once(&self.root).chain(self.nested.iter())
  }

  pub fn get(&self, name: &str) -> Option<&Document> {
    self.documents().find(|d| d.name == name)
  }
}
