use crate::config::types::{Result, ScoreboxError};
use crate::contract::ScoringCodeValidator;
use crate::wire::{
    ScoringSubDimension, CODE_FUNCTION, CODE_FUNCTION_DESCRIPTION, LEGACY_CODE_FUNCTION,
    LEGACY_SERVICE_QUESTION, SERVICE_QUESTION,
};
use std::path::Path;

/// Sub-dimension answered by the remote semantic scorer.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceQuestion {
    pub label: String,
    pub question: String,
    pub weight: f64,
    pub scaling_parameters: Vec<f64>,
}

impl ServiceQuestion {
    pub fn new(label: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            question: question.into(),
            weight: 1.0,
            scaling_parameters: Vec::new(),
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
}

/// Sub-dimension backed by user scoring code.
///
/// The code held here has always passed a [`ScoringCodeValidator`]; there is
/// no way to attach code without validating it:
///
/// ```compile_fail
/// use scorebox::builder::CodeFunction;
///
/// let unchecked = CodeFunction {
///     label: "Unchecked".to_string(),
///     code: "junk(".to_string(),
///     weight: 1.0,
///     scaling_parameters: vec![],
/// };
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CodeFunction {
    pub label: String,
    code: String,
    pub weight: f64,
    pub scaling_parameters: Vec<f64>,
}

impl CodeFunction {
    /// Validate `code` and wrap it. Fails with the validator's error.
    pub fn new(
        label: impl Into<String>,
        code: impl Into<String>,
        validator: &dyn ScoringCodeValidator,
    ) -> Result<Self> {
        let code = code.into();
        validator.validate(&code)?;
        Ok(Self {
            label: label.into(),
            code,
            weight: 1.0,
            scaling_parameters: Vec::new(),
        })
    }

    /// Read the code from `path`, then validate as in [`CodeFunction::new`].
    pub fn from_file(
        label: impl Into<String>,
        weight: f64,
        scaling_parameters: Vec<f64>,
        path: impl AsRef<Path>,
        validator: &dyn ScoringCodeValidator,
    ) -> Result<Self> {
        let code = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::new(label, code, validator)?
            .with_weight(weight)
            .with_scaling_parameters(scaling_parameters))
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_scaling_parameters(mut self, scaling_parameters: Vec<f64>) -> Self {
        self.scaling_parameters = scaling_parameters;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Replace the code. On rejection the current code is kept.
    pub fn set_code(
        &mut self,
        code: impl Into<String>,
        validator: &dyn ScoringCodeValidator,
    ) -> Result<()> {
        let code = code.into();
        validator.validate(&code)?;
        self.code = code;
        Ok(())
    }
}

/// Leaf of a scoring tree.
#[derive(Clone, Debug, PartialEq)]
pub enum SubDimension {
    ServiceQuestion(ServiceQuestion),
    CodeFunction(CodeFunction),
}

impl SubDimension {
    pub fn label(&self) -> &str {
        match self {
            SubDimension::ServiceQuestion(q) => &q.label,
            SubDimension::CodeFunction(f) => &f.label,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            SubDimension::ServiceQuestion(q) => q.weight,
            SubDimension::CodeFunction(f) => f.weight,
        }
    }

    pub fn scaling_parameters(&self) -> &[f64] {
        match self {
            SubDimension::ServiceQuestion(q) => &q.scaling_parameters,
            SubDimension::CodeFunction(f) => &f.scaling_parameters,
        }
    }

    /// Hydrate one wire record. Code-backed records are validated.
    pub fn from_wire(
        record: &ScoringSubDimension,
        validator: &dyn ScoringCodeValidator,
    ) -> Result<Self> {
        match record.scoring_type.as_str() {
            SERVICE_QUESTION | LEGACY_SERVICE_QUESTION => {
                Ok(SubDimension::ServiceQuestion(ServiceQuestion {
                    label: record.label.clone(),
                    question: record.description.clone(),
                    weight: record.weight,
                    scaling_parameters: record.parameters.clone(),
                }))
            }
            CODE_FUNCTION | LEGACY_CODE_FUNCTION => {
                let code = record.code.clone().unwrap_or_default();
                let function = CodeFunction::new(record.label.clone(), code, validator)?
                    .with_weight(record.weight)
                    .with_scaling_parameters(record.parameters.clone());
                Ok(SubDimension::CodeFunction(function))
            }
            other => Err(ScoreboxError::UnknownScoringType(other.to_string())),
        }
    }

    pub fn to_wire(&self) -> ScoringSubDimension {
        match self {
            SubDimension::ServiceQuestion(q) => ScoringSubDimension {
                label: q.label.clone(),
                description: q.question.clone(),
                weight: q.weight,
                parameters: q.scaling_parameters.clone(),
                scoring_type: SERVICE_QUESTION.to_string(),
                code: None,
            },
            SubDimension::CodeFunction(f) => ScoringSubDimension {
                label: f.label.clone(),
                description: CODE_FUNCTION_DESCRIPTION.to_string(),
                weight: f.weight,
                parameters: f.scaling_parameters.clone(),
                scoring_type: CODE_FUNCTION.to_string(),
                code: Some(f.code.clone()),
            },
        }
    }
}

impl From<ServiceQuestion> for SubDimension {
    fn from(question: ServiceQuestion) -> Self {
        SubDimension::ServiceQuestion(question)
    }
}

impl From<CodeFunction> for SubDimension {
    fn from(function: CodeFunction) -> Self {
        SubDimension::CodeFunction(function)
    }
}
