pub mod grader;
pub mod heuristic_grader;
pub mod llm_grader;
pub mod registry;
pub mod scorer;
pub mod submission_writer;

pub use grader::{GradeRequest, GradeResult, Grader};
pub use heuristic_grader::HeuristicGrader;
pub use llm_grader::LlmGrader;
pub use registry::{EmailRegistry, InMemoryRegistry, JsonFileRegistry};
pub use submission_writer::{InMemorySubmissions, SubmissionWriter};
