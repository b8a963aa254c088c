use crate::builder::dimension::Dimension;
use crate::config::types::{Result, ScoreboxError};
use crate::contract::ScoringCodeValidator;
use crate::wire::{ScoringDimension, ScoringSpec, ScoringSubDimension};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::io::Write;

/// Read-write view over a scoring specification tree.
///
/// Hydrate with one of the `from_*` constructors (or start empty with
/// [`ScoringSpecBuilder::new`]), edit, then call [`ScoringSpecBuilder::build`]
/// for a fresh wire snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringSpecBuilder {
    pub name: String,
    pub description: String,
    dimensions: Vec<Dimension>,
}

impl ScoringSpecBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            dimensions: Vec::new(),
        }
    }

    /// Hydrate from a parsed wire spec. Every code-backed sub-dimension is
    /// validated; the first failure aborts hydration.
    pub fn from_spec(spec: &ScoringSpec, validator: &dyn ScoringCodeValidator) -> Result<Self> {
        let mut builder = Self::new(spec.name.clone(), spec.description.clone());
        for (idx, dimension) in spec.dimensions.iter().enumerate() {
            let hydrated = Dimension::from_wire(dimension, validator).map_err(|e| {
                log::debug!("Hydration failed at dimensions[{}] ('{}')", idx, dimension.label);
                e
            })?;
            builder.dimensions.push(hydrated);
        }
        log::debug!(
            "Hydrated scoring spec '{}' with {} dimensions",
            builder.name,
            builder.dimensions.len()
        );
        Ok(builder)
    }

    pub fn from_value(value: Value, validator: &dyn ScoringCodeValidator) -> Result<Self> {
        let spec = match ScoringSpec::deserialize(&value) {
            Ok(spec) => spec,
            Err(e) => return Err(locate_schema_error(&value, e)),
        };
        Self::from_spec(&spec, validator)
    }

    /// Hydrate from JSON text. Text that is not JSON is `MalformedInput`;
    /// JSON of the wrong shape is `SchemaValidation`.
    pub fn from_json(input: impl AsRef<[u8]>, validator: &dyn ScoringCodeValidator) -> Result<Self> {
        let value: Value = serde_json::from_slice(input.as_ref())
            .map_err(|e| ScoreboxError::MalformedInput(e.to_string()))?;
        Self::from_value(value, validator)
    }

    /// Fresh wire snapshot, depth-first in stored order.
    pub fn build(&self) -> ScoringSpec {
        ScoringSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            dimensions: self.dimensions.iter().map(Dimension::to_wire).collect(),
        }
    }

    pub fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.clone()
    }

    /// First dimension with `label`.
    pub fn dimension_mut(&mut self, label: &str) -> Option<&mut Dimension> {
        self.dimensions.iter_mut().find(|d| d.label == label)
    }

    /// Append a dimension, given a label or a prepared [`Dimension`].
    pub fn add_dimension(&mut self, dimension: impl Into<Dimension>) -> &mut Dimension {
        let idx = self.dimensions.len();
        self.dimensions.push(dimension.into());
        &mut self.dimensions[idx]
    }

    /// Remove the first dimension equal to `dimension`.
    pub fn remove_dimension(&mut self, dimension: &Dimension) -> Result<Dimension> {
        let idx = self
            .dimensions
            .iter()
            .position(|d| d == dimension)
            .ok_or_else(|| ScoreboxError::NotFound(format!("dimension '{}'", dimension.label)))?;
        Ok(self.dimensions.remove(idx))
    }

    pub fn print_tree<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write!(out, "{self}")
    }

    pub fn print_tree_stdout(&self) -> std::io::Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.print_tree(&mut lock)
    }
}

impl fmt::Display for ScoringSpecBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dimension in &self.dimensions {
            writeln!(f, "{}", dimension.label)?;
            for label in dimension.sub_dimension_labels() {
                writeln!(f, "\t{label}")?;
            }
        }
        Ok(())
    }
}

/// Narrow a root decode failure down to the first offending record.
fn locate_schema_error(value: &Value, root_error: serde_json::Error) -> ScoreboxError {
    let mut path = "$".to_string();
    let mut message = root_error.to_string();

    if let Some(dimensions) = value.get("dimensions").and_then(Value::as_array) {
        for (i, dimension) in dimensions.iter().enumerate() {
            let Err(e) = ScoringDimension::deserialize(dimension) else {
                continue;
            };
            path = format!("$.dimensions[{i}]");
            message = e.to_string();

            let subs = dimension.get("sub_dimensions").and_then(Value::as_array);
            for (j, sub) in subs.into_iter().flatten().enumerate() {
                if let Err(e) = ScoringSubDimension::deserialize(sub) {
                    path = format!("$.dimensions[{i}].sub_dimensions[{j}]");
                    message = e.to_string();
                    break;
                }
            }
            break;
        }
    }

    ScoreboxError::SchemaValidation { path, message }
}
