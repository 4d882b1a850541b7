pub mod evaluation_api;
pub mod paper_normalizer;
pub mod paper_service;
pub mod progress_stream;
pub mod upload_service;

pub use evaluation_api::{
    build_document_map, parse_answer_documents, parse_evaluation_results, EvaluationBackend,
    HttpEvaluationBackend,
};
pub use paper_normalizer::{
    merge_paper_config_with_question_structure, normalize_paper_config, normalize_question_structure,
    split_flat_questions_into_parts,
};
pub use paper_service::PaperService;
pub use progress_stream::{map_status, map_step, parse_progress_line};
pub use upload_service::{extract_uploaded_resources, UploadService};
