//! Compiler configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use icbrick_lib::config::{CompilerConfig, TemplateProfile};
//!
//! let config = CompilerConfig::from_json_str(r#"{"profile": "legacy", "limits": {"max_resources": 50}}"#).unwrap();
//! assert_eq!(config.profile, TemplateProfile::Legacy);
//! assert_eq!(config.limits.max_resources, 50);
//! assert_eq!(config.limits.max_outputs, 200);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Longest description the provider accepts.
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Which intrinsic functions the target format supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateProfile {
  /// `Ref`, `Fn::GetAtt`, `Fn::Join`, `Fn::Select`, `Fn::Base64`, `Fn::GetAZs`.
  Legacy,
  /// Every intrinsic.
  #[default]
  Standard,
}

impl TemplateProfile {
  pub fn supports(&self, intrinsic: &str) -> bool {
    match self {
      TemplateProfile::Standard => true,
      TemplateProfile::Legacy => matches!(
        intrinsic,
        "Ref" | "Fn::GetAtt" | "Fn::Join" | "Fn::Select" | "Fn::Base64" | "Fn::GetAZs"
      ),
    }
  }
}

/// Per-document provider ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
  pub max_resources: usize,
  pub max_outputs: usize,
  pub max_parameters: usize,
  pub max_body_bytes: usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      max_resources: 500,
      max_outputs: 200,
      max_parameters: 200,
      max_body_bytes: 1_048_576,
    }
  }
}

/// Options for a [`Compiler`](crate::compiler::Compiler).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
  pub profile: TemplateProfile,
  /// Root document description; defaults to the root brick name.
  pub description: Option<String>,
  /// Prefix of cross-document export names; defaults to the stack name.
  pub export_prefix: Option<String>,
  /// Indent documents instead of emitting compact JSON.
  pub pretty: bool,
  pub limits: Limits,
}

impl CompilerConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse and validate a JSON configuration.
  pub fn from_json_str(json: &str) -> Result<Self, CompileError> {
    let config: CompilerConfig = serde_json::from_str(json).map_err(|e| CompileError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  pub fn with_profile(mut self, profile: TemplateProfile) -> Self {
    self.profile = profile;
    self
  }

  pub fn with_description(mut self, description: &str) -> Self {
    self.description = Some(description.to_string());
    self
  }

  pub fn with_export_prefix(mut self, prefix: &str) -> Self {
    self.export_prefix = Some(prefix.to_string());
    self
  }

  pub fn with_pretty(mut self, pretty: bool) -> Self {
    self.pretty = pretty;
    self
  }

  pub fn with_limits(mut self, limits: Limits) -> Self {
    self.limits = limits;
    self
  }

  /// # Errors
  ///
  /// Returns `Config` for zero limits, an over-long description, or an
  /// export prefix with characters other than alphanumerics and `-`.
  pub fn validate(&self) -> Result<(), CompileError> {
    let limits = [
      ("max_resources", self.limits.max_resources),
      ("max_outputs", self.limits.max_outputs),
      ("max_parameters", self.limits.max_parameters),
      ("max_body_bytes", self.limits.max_body_bytes),
    ];
    for (name, value) in limits {
      if value == 0 {
        return Err(CompileError::Config(format!("limits.{} must be at least 1", name)));
      }
    }

    if let Some(description) = &self.description
      && description.len() > MAX_DESCRIPTION_LEN
    {
      return Err(CompileError::Config(format!(
        "description is longer than {} bytes",
        MAX_DESCRIPTION_LEN
      )));
    }

    if let Some(prefix) = &self.export_prefix
      && (prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
    {
      return Err(CompileError::Config(format!(
        "export_prefix '{}' must be non-empty and contain only alphanumerics and '-'",
        prefix
      )));
    }
    Ok(())
  }
}
