//! Extension declaration parsing for `extension.toml` files.
//!
//! An extension declaration names the extension, its kind, version, and the
//! extensions it depends on. The canonical filename is
//! [`DECLARATION_FILENAME`](crate::DECLARATION_FILENAME) (`extension.toml`),
//! placed in the extension's directory.
//!
//! # Example TOML
//!
//! ```toml
//! [extension]
//! name = "views"
//! kind = "module"
//! version = "2.1.0"
//! description = "Query builder and listing pages"
//! dependencies = ["node (>=1.0)", "filter"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dependency::DependencyEdge;
use crate::error::{Error, Result};
use crate::extension::ExtensionKind;

/// Complete extension declaration loaded from `extension.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionInfo {
    /// Core extension metadata.
    pub extension: ExtensionMeta,
}

/// Metadata about an extension.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionMeta {
    /// Extension name (e.g., "views").
    pub name: String,
    /// Extension kind; defaults to `module`.
    #[serde(default = "default_kind")]
    pub kind: ExtensionKind,
    /// Semver version string.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Raw dependency declarations.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_kind() -> ExtensionKind {
    ExtensionKind::Module
}

impl ExtensionInfo {
    /// Parse a declaration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let info: Self = toml::from_str(content)?;
        info.validate()?;
        Ok(info)
    }

    /// Read and parse a declaration from a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DeclarationNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize the declaration back to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::DeclarationSerialize(e.to_string()))
    }

    /// Validate the declaration fields.
    fn validate(&self) -> Result<()> {
        let name = &self.extension.name;
        if name.is_empty() {
            return Err(Error::InvalidName {
                name: name.clone(),
                reason: "extension name must not be empty".to_string(),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidName {
                name: name.clone(),
                reason:
                    "extension name must contain only alphanumeric characters, hyphens, or underscores"
                        .to_string(),
            });
        }

        semver::Version::parse(&self.extension.version).map_err(|e| Error::InvalidVersion {
            version: self.extension.version.clone(),
            source: e,
        })?;

        // Every dependency must parse; constraints surface their own errors.
        for raw in &self.extension.dependencies {
            DependencyEdge::parse(raw)?;
        }

        Ok(())
    }
}
