//! Scoring specification builder.
//!
//! Tree view over the flat wire form: [`ScoringSpecBuilder`] owns ordered
//! [`Dimension`]s, each owning ordered [`SubDimension`]s. Stand-alone
//! questions are built in [`question`].

pub mod dimension;
pub mod question;
pub mod spec;
pub mod subdimension;

pub use dimension::Dimension;
pub use question::{code_question, code_question_from_file, service_question};
pub use spec::ScoringSpecBuilder;
pub use subdimension::{CodeFunction, ServiceQuestion, SubDimension};
