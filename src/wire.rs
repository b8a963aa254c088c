/// Flat wire form of a scoring specification
///
/// Field order matches the service schema so a hydrate/build cycle reproduces
/// the input byte for byte. `null` in any defaulted field reads as the default.
use serde::{Deserialize, Deserializer, Serialize};

pub const SERVICE_QUESTION: &str = "SERVICE_QUESTION";
pub const CODE_FUNCTION: &str = "CODE_FUNCTION";

/// Older discriminants still emitted by some stored specs.
pub const LEGACY_SERVICE_QUESTION: &str = "PI_SCORER";
pub const LEGACY_CODE_FUNCTION: &str = "PYTHON_CODE";

/// Dimension description placeholder; the service ignores it.
pub const UNUSED_DESCRIPTION: &str = "unused";

/// Description written for every code-backed sub-dimension.
pub const CODE_FUNCTION_DESCRIPTION: &str = "Code Function";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_unit_weight<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(1.0))
}

fn default_weight() -> f64 {
    1.0
}

fn default_dimension_description() -> String {
    UNUSED_DESCRIPTION.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoringSpec {
    pub name: String,
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dimensions: Vec<ScoringDimension>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoringDimension {
    pub label: String,
    #[serde(default = "default_dimension_description")]
    pub description: String,
    #[serde(default = "default_weight", deserialize_with = "null_as_unit_weight")]
    pub weight: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_dimensions: Vec<ScoringSubDimension>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoringSubDimension {
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default = "default_weight", deserialize_with = "null_as_unit_weight")]
    pub weight: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<f64>,
    pub scoring_type: String,
    #[serde(default, alias = "python_code", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Stand-alone question, outside any scoring tree.
///
/// A plain question carries only its text. A code-backed question also
/// carries validated code and the `CODE_FUNCTION` discriminant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub question: String,
    #[serde(default, alias = "python_code", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_type: Option<String>,
}

impl ScoringSpec {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
