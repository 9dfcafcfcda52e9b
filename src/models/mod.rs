pub mod answer;
pub mod identity;
pub mod loaders;
pub mod question;
pub mod record;

pub use answer::Answer;
pub use identity::Identity;
pub use loaders::{load_catalog, load_catalog_from_dir};
pub use question::{Catalog, CorrectAnswer, Question, QuestionKind};
pub use record::{
    ObjectiveScore, QuestionGrade, ReviewedSubmission, SubjectiveEvaluation, SubmissionRecord,
    SubmitTrigger,
};
