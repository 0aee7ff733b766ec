//! Sparse per-scenario overrides.
//!
//! A definition document maps dotted key paths (or nested mappings, which are
//! flattened to their leaves) to values. A handful of top-level keys are not
//! overrides but directives: they name the scenario or point at profile files
//! to attach after resolution.

use nova_core::{KeyPath, Node, ResolutionError, Scalar};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::template::read_document;

const ID_KEYS: &[&str] = &["scenario_id", "post_name"];
const LOAD_FILE_KEYS: &[&str] = &["load_file"];
const PROD_FACTOR_KEYS: &[&str] = &["pv_prod_factor_file", "solar_production_factor_file"];
const PRICE_KEYS: &[&str] = &["wholesale_price_file", "wholesale_price_path"];
const BASELINE_TYPE_KEYS: &[&str] = &["baseline_type"];

/// Non-override instructions carried by a definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub load_file: Option<PathBuf>,
    pub pv_prod_factor_file: Option<PathBuf>,
    pub wholesale_price_file: Option<PathBuf>,
    /// Free-form tag describing what the baseline differs in
    pub baseline_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    pub id: String,
    /// File (or `file#row`) the definition was read from
    pub origin: String,
    /// Overrides in document order; later entries win
    pub overrides: Vec<(KeyPath, Node)>,
    pub directives: Directives,
}

impl ScenarioDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        ScenarioDefinition {
            origin: id.clone(),
            id,
            overrides: Vec::new(),
            directives: Directives::default(),
        }
    }

    pub fn with_override(mut self, path: &str, value: impl Into<Node>) -> Result<Self, ResolutionError> {
        self.overrides.push((KeyPath::parse(path)?, value.into()));
        Ok(self)
    }

    /// Build a definition from a parsed document.
    ///
    /// `base_dir` anchors relative directive paths.
    pub fn from_value(
        default_id: &str,
        origin: &str,
        value: Value,
        base_dir: &Path,
    ) -> Result<Self, ResolutionError> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => return Err(invalid(origin, format!("expected a mapping, found {other}"))),
        };
        let mut definition = ScenarioDefinition {
            id: default_id.to_string(),
            origin: origin.to_string(),
            overrides: Vec::new(),
            directives: Directives::default(),
        };
        for (key, value) in entries {
            if is_directive(&key) {
                definition.apply_directive(&key, &Node::from(value), base_dir)?;
            } else {
                flatten_into(KeyPath::parse(&key)?, value, &mut definition.overrides)?;
            }
        }
        if definition.id.trim().is_empty() {
            return Err(invalid(origin, "scenario id cannot be empty"));
        }
        Ok(definition)
    }

    fn apply_directive(&mut self, key: &str, value: &Node, base_dir: &Path) -> Result<(), ResolutionError> {
        let key = key.trim();
        if ID_KEYS.contains(&key) {
            self.id = text_of(&self.origin, key, value)?;
        } else if LOAD_FILE_KEYS.contains(&key) {
            self.directives.load_file = file_of(&self.origin, key, value, base_dir)?;
        } else if PROD_FACTOR_KEYS.contains(&key) {
            self.directives.pv_prod_factor_file = file_of(&self.origin, key, value, base_dir)?;
        } else if PRICE_KEYS.contains(&key) {
            self.directives.wholesale_price_file = file_of(&self.origin, key, value, base_dir)?;
        } else if BASELINE_TYPE_KEYS.contains(&key) {
            self.directives.baseline_type = Some(text_of(&self.origin, key, value)?);
        }
        Ok(())
    }
}

fn is_directive(key: &str) -> bool {
    let key = key.trim();
    [ID_KEYS, LOAD_FILE_KEYS, PROD_FACTOR_KEYS, PRICE_KEYS, BASELINE_TYPE_KEYS]
        .iter()
        .any(|keys| keys.contains(&key))
}

/// Nested mappings become one override per leaf so they merge deeply;
/// lists and scalars are single leaves and replace wholesale.
fn flatten_into(path: KeyPath, value: Value, out: &mut Vec<(KeyPath, Node)>) -> Result<(), ResolutionError> {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let child_path = path.join(&KeyPath::parse(&key)?);
                flatten_into(child_path, child, out)?;
            }
            Ok(())
        }
        other => {
            out.push((path, Node::from(other)));
            Ok(())
        }
    }
}

fn text_of(origin: &str, key: &str, value: &Node) -> Result<String, ResolutionError> {
    match value {
        Node::Scalar(Scalar::Text(text)) => Ok(text.trim().to_string()),
        Node::Scalar(Scalar::Int(number)) => Ok(number.to_string()),
        other => Err(invalid(origin, format!("'{key}' must be a string, found a {}", other.kind()))),
    }
}

fn file_of(origin: &str, key: &str, value: &Node, base_dir: &Path) -> Result<Option<PathBuf>, ResolutionError> {
    if value.is_blank() {
        return Ok(None);
    }
    let raw = text_of(origin, key, value)?;
    let path = PathBuf::from(raw);
    Ok(Some(if path.is_absolute() { path } else { base_dir.join(path) }))
}

fn invalid(origin: &str, reason: impl Into<String>) -> ResolutionError {
    ResolutionError::InvalidDefinition {
        origin: origin.to_string(),
        reason: reason.into(),
    }
}

/// Load one JSON/YAML definition file. The id defaults to the file stem.
pub fn load_definition(path: &Path) -> Result<ScenarioDefinition, ResolutionError> {
    let origin = path.display().to_string();
    let value = read_document(path).map_err(|err| invalid(&origin, format!("{err:#}")))?;
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    ScenarioDefinition::from_value(stem, &origin, value, base_dir)
}

/// Load a scenario sheet: one row per scenario, a `scenario_id` column, and
/// one column per dotted key. Empty cells leave the key unset.
pub fn load_sheet(path: &Path) -> Result<Vec<ScenarioDefinition>, ResolutionError> {
    let origin = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| invalid(&origin, err.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|err| invalid(&origin, err.to_string()))?
        .clone();
    if !headers.iter().any(|header| ID_KEYS.contains(&header)) {
        return Err(invalid(&origin, "sheet has no 'scenario_id' column"));
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut definitions = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let row_origin = format!("{origin}#{}", row + 2);
        let record = record.map_err(|err| invalid(&row_origin, err.to_string()))?;
        let entries: serde_json::Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(header, cell)| (header.to_string(), typed_cell(cell)))
            .collect();
        if entries.is_empty() {
            continue;
        }
        definitions.push(ScenarioDefinition::from_value(
            "",
            &row_origin,
            Value::Object(entries),
            base_dir,
        )?);
    }
    Ok(definitions)
}

fn typed_cell(cell: &str) -> Value {
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = cell.parse::<f64>() {
        return Value::from(float);
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}
