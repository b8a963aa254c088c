use crate::builder::subdimension::SubDimension;
use crate::config::types::{Result, ScoreboxError};
use crate::contract::ScoringCodeValidator;
use crate::wire::{ScoringDimension, UNUSED_DESCRIPTION};

/// Ordered group of sub-dimensions with its own weight.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    pub label: String,
    pub weight: f64,
    pub scaling_parameters: Vec<f64>,
    sub_dimensions: Vec<SubDimension>,
}

impl Dimension {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            weight: 1.0,
            scaling_parameters: Vec::new(),
            sub_dimensions: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_scaling_parameters(mut self, scaling_parameters: Vec<f64>) -> Self {
        self.scaling_parameters = scaling_parameters;
        self
    }

    /// Snapshot; edits to it do not reach the dimension.
    pub fn sub_dimensions(&self) -> Vec<SubDimension> {
        self.sub_dimensions.clone()
    }

    pub fn add_sub_dimension(&mut self, sub_dimension: impl Into<SubDimension>) -> &mut SubDimension {
        let idx = self.sub_dimensions.len();
        self.sub_dimensions.push(sub_dimension.into());
        &mut self.sub_dimensions[idx]
    }

    /// Remove the first sub-dimension equal to `sub_dimension`.
    pub fn remove_sub_dimension(&mut self, sub_dimension: &SubDimension) -> Result<SubDimension> {
        let idx = self
            .sub_dimensions
            .iter()
            .position(|s| s == sub_dimension)
            .ok_or_else(|| {
                ScoreboxError::NotFound(format!(
                    "sub-dimension '{}' in dimension '{}'",
                    sub_dimension.label(),
                    self.label
                ))
            })?;
        Ok(self.sub_dimensions.remove(idx))
    }

    pub(crate) fn sub_dimension_labels(&self) -> impl Iterator<Item = &str> {
        self.sub_dimensions.iter().map(SubDimension::label)
    }

    /// Hydrate from wire form, fail-fast in list order.
    pub fn from_wire(
        record: &ScoringDimension,
        validator: &dyn ScoringCodeValidator,
    ) -> Result<Self> {
        let mut dimension = Dimension::new(record.label.clone())
            .with_weight(record.weight)
            .with_scaling_parameters(record.parameters.clone());

        for (idx, sub) in record.sub_dimensions.iter().enumerate() {
            let hydrated = SubDimension::from_wire(sub, validator).map_err(|e| {
                log::debug!(
                    "Hydration failed at sub_dimensions[{}] ('{}') of '{}': {}",
                    idx,
                    sub.label,
                    record.label,
                    e
                );
                e
            })?;
            dimension.sub_dimensions.push(hydrated);
        }

        Ok(dimension)
    }

    pub fn to_wire(&self) -> ScoringDimension {
        ScoringDimension {
            label: self.label.clone(),
            description: UNUSED_DESCRIPTION.to_string(),
            weight: self.weight,
            parameters: self.scaling_parameters.clone(),
            sub_dimensions: self.sub_dimensions.iter().map(SubDimension::to_wire).collect(),
        }
    }
}

impl From<&str> for Dimension {
    fn from(label: &str) -> Self {
        Dimension::new(label)
    }
}

impl From<String> for Dimension {
    fn from(label: String) -> Self {
        Dimension::new(label)
    }
}
