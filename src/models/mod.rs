pub mod loaders;
pub mod paper;
pub mod progress;
pub mod resource;
pub mod setup;

pub use loaders::load_paper_template;
pub use paper::{sub_question_label, PaperConfig, PaperPart, Question, SubQuestion};
pub use progress::{
    FileProgress, FileStatus, OverallStatus, ProgressBoard, ProgressEvent, ProgressStep,
};
pub use resource::{
    average_score, AnswerDocument, EvaluationResult, HistoryEntry, ResourceType, UploadFile,
    UploadedResource,
};
pub use setup::{AddFilesOutcome, AnswerFile, ProcessingStatus, SetupStep, SetupStepKind, StepStatus};
