/// Stand-alone question builders
///
/// Questions live outside a scoring tree. Code-backed questions go through
/// the same contract gate as [`CodeFunction`].
use crate::builder::subdimension::{CodeFunction, ServiceQuestion};
use crate::config::types::Result;
use crate::contract::ScoringCodeValidator;
use crate::wire::{Question, CODE_FUNCTION};
use std::path::Path;

/// Question answered by the remote semantic scorer.
pub fn service_question(question: impl Into<String>) -> Question {
    Question {
        question: question.into(),
        code: None,
        scoring_type: None,
    }
}

/// Validate `code` and wrap it in a code-backed question.
pub fn code_question(
    question: impl Into<String>,
    code: impl Into<String>,
    validator: &dyn ScoringCodeValidator,
) -> Result<Question> {
    let code = code.into();
    validator.validate(&code)?;
    Ok(validated_question(question.into(), code))
}

/// Read the code from `path`, then validate as in [`code_question`].
pub fn code_question_from_file(
    question: impl Into<String>,
    path: impl AsRef<Path>,
    validator: &dyn ScoringCodeValidator,
) -> Result<Question> {
    let code = std::fs::read_to_string(path.as_ref())?;
    code_question(question, code, validator)
}

fn validated_question(question: String, code: String) -> Question {
    Question {
        question,
        code: Some(code),
        scoring_type: Some(CODE_FUNCTION.to_string()),
    }
}

impl From<&ServiceQuestion> for Question {
    fn from(sub: &ServiceQuestion) -> Self {
        service_question(sub.question.clone())
    }
}

// CodeFunction only ever holds validated code.
impl From<&CodeFunction> for Question {
    fn from(function: &CodeFunction) -> Self {
        validated_question(function.label.clone(), function.code().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::testing::{AcceptAll, RejectAll};
    use crate::config::types::ScoreboxError;
    use crate::contract::ContractViolation;

    const SCORER: &str =
        "score = lambda response_text, input_text, **kwargs: {'score': 1.0, 'explanation': 'good'}";

    #[test]
    fn test_service_question_never_validates() {
        let question = service_question("Is it good?");
        assert_eq!(question.question, "Is it good?");
        assert!(question.code.is_none());
        assert!(question.scoring_type.is_none());
    }

    #[test]
    fn test_code_question_routes_through_validator() {
        let validator = AcceptAll::default();
        let question = code_question("Python", SCORER, &validator).unwrap();
        assert_eq!(validator.seen(), vec![SCORER.to_string()]);
        assert_eq!(question.question, "Python");
        assert_eq!(question.code.as_deref(), Some(SCORER));
        assert_eq!(question.scoring_type.as_deref(), Some(CODE_FUNCTION));
    }

    #[test]
    fn test_code_question_rejected() {
        let err = code_question("Bad", "junk(", &RejectAll).unwrap_err();
        assert_eq!(err.violation(), Some(&ContractViolation::MissingScoreFunction));
    }

    #[test]
    fn test_code_question_from_file() {
        let path = std::env::temp_dir().join(format!("scorebox-question-{}.py", std::process::id()));
        std::fs::write(&path, SCORER).unwrap();
        let validator = AcceptAll::default();
        let question = code_question_from_file("File", &path, &validator);
        let _ = std::fs::remove_file(&path);

        assert_eq!(question.unwrap().code.as_deref(), Some(SCORER));
        assert_eq!(validator.seen().len(), 1);
    }

    #[test]
    fn test_code_question_missing_file() {
        let err = code_question_from_file(
            "Missing",
            "/nonexistent/scorebox/scorer.py",
            &AcceptAll::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScoreboxError::Io(_)));
    }

    #[test]
    fn test_from_sub_dimensions() {
        let sub = ServiceQuestion::new("Tone", "Is the tone friendly?");
        assert_eq!(Question::from(&sub), service_question("Is the tone friendly?"));

        let function = CodeFunction::new("Length", SCORER, &AcceptAll::default()).unwrap();
        let question = Question::from(&function);
        assert_eq!(question.question, "Length");
        assert_eq!(question.code.as_deref(), Some(SCORER));
    }
}
