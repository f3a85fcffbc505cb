//! Desired-state manifest
//!
//! ```toml
//! [[resource_group]]
//! name = "rg_etl"
//! cpu_weight = 4
//! mem_limit = "80%"
//! big_query_mem_limit = "2GB"
//!
//! [[resource_group.classifiers]]
//! user = "etl"
//! query_type = "insert"
//! ```

use anyhow::{Context, Result, bail};
use rgkit::ResourceGroupSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "resource_group")]
    pub groups: Vec<ResourceGroupSpec>,
}

impl Manifest {
    /// Load and validate a manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand(path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        log::debug!(
            "Loaded {} resource group(s) from {}",
            manifest.groups.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content).context("Invalid TOML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check for duplicate names and unsafe or empty entries.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                bail!("Duplicate resource group '{}'", group.name);
            }
            rgkit::reconcile::validate(group)
                .with_context(|| format!("Invalid resource group '{}'", group.name))?;
        }
        Ok(())
    }

    /// Groups selected by `targets`, or all groups when empty.
    ///
    /// Unknown target names are an error.
    pub fn select(&self, targets: &[String]) -> Result<Vec<&ResourceGroupSpec>> {
        if targets.is_empty() {
            return Ok(self.groups.iter().collect());
        }

        let unknown: Vec<&str> = targets
            .iter()
            .filter(|t| !self.groups.iter().any(|g| &g.name == *t))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            bail!("Not in manifest: {}", unknown.join(", "));
        }

        Ok(self
            .groups
            .iter()
            .filter(|g| targets.contains(&g.name))
            .collect())
    }

    /// Render as manifest TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize manifest")
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Append a group entry to a manifest file, creating it if needed.
pub fn append(path: &Path, group: ResourceGroupSpec) -> Result<PathBuf> {
    let path = expand(path);

    let mut manifest = if path.exists() {
        Manifest::load(&path)?
    } else {
        Manifest::default()
    };

    if manifest.groups.iter().any(|g| g.name == group.name) {
        bail!(
            "Resource group '{}' is already in {}",
            group.name,
            path.display()
        );
    }
    manifest.groups.push(group);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    std::fs::write(&path, manifest.to_toml()?)
        .with_context(|| format!("Could not write {}", path.display()))?;

    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================
