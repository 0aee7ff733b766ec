use anyhow::{bail, Context, Result};
use nova_core::{KeyPath, Node};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Process-wide defaults every scenario request is overlaid onto.
///
/// Built once at startup and shared read-only (by reference, or behind an
/// `Arc` across workers). Resolution never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultTemplate {
    root: Node,
    required: Vec<KeyPath>,
}

impl DefaultTemplate {
    pub fn new(root: Node, required: Vec<KeyPath>) -> Result<Self> {
        if !root.is_map() {
            bail!("default template must be a mapping, found a {}", root.kind());
        }
        Ok(DefaultTemplate { root, required })
    }

    /// Load a JSON, YAML or TOML template document.
    pub fn load(path: &Path, required: Vec<KeyPath>) -> Result<Self> {
        let document = read_document(path)?;
        DefaultTemplate::new(Node::from(document), required)
            .with_context(|| format!("loading default template '{}'", path.display()))
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Paths that must hold a non-blank value after overlay.
    pub fn required(&self) -> &[KeyPath] {
        &self.required
    }
}

/// Read a nested document, choosing the parser from the file extension.
///
/// Unknown extensions are tried as YAML first (a JSON superset), then JSON.
pub fn read_document(path: &Path) -> Result<Value> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading document '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing yaml document")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing json document")
        }
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(&data).context("parsing toml document")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing document"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_yaml_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("defaults.yaml");
        fs::write(
            &path,
            "Scenario:\n  Site:\n    latitude: 39.7\n    PV:\n      max_kw: 1000\n",
        )
        .unwrap();

        let template =
            DefaultTemplate::load(&path, vec![KeyPath::parse("Scenario.Site.latitude").unwrap()])
                .unwrap();
        let max_kw = KeyPath::parse("Scenario.Site.PV.max_kw").unwrap();
        assert_eq!(template.root().get_path(&max_kw).and_then(Node::as_f64), Some(1000.0));
        assert_eq!(template.required().len(), 1);
    }

    #[test]
    fn rejects_non_mapping_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(DefaultTemplate::load(&path, Vec::new()).is_err());
    }
}
