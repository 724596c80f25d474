pub mod language;
pub mod submission;

pub use language::{Language, LanguageSummary};
pub use submission::{AdditionalFile, Submission, SubmissionSnapshot, SubmissionStatus};
