use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{AppError, AppResult, FileError};
use crate::models::FileProgress;

/// 上传资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    QuestionPaper,
    Syllabus,
    AnswerSheet,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::QuestionPaper => "question_paper",
            ResourceType::Syllabus => "syllabus",
            ResourceType::AnswerSheet => "answer_sheet",
        }
    }
}

/// 待上传的文件
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// 从磁盘读取文件，根据扩展名推断 MIME
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::File(FileError::NotFound {
                path: path.display().to_string(),
            }));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mime_type = guess_mime(&filename).to_string();
        Ok(Self::new(filename, mime_type, bytes))
    }
}

/// 根据扩展名推断 MIME 类型
pub fn guess_mime(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// 上传成功后后端返回的资源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedResource {
    pub resource_id: String,
    pub filename: Option<String>,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
}

/// 后端的答卷文档摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDocument {
    /// 答卷文档ID（用于打开进度流）
    pub id: String,
    pub resource_id: String,
}

/// 单份答卷的评测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub resource_id: String,
    pub file_name: Option<String>,
    pub overall_score: f64,
    pub max_score: Option<f64>,
    /// 后端返回的原始数据（分析页使用）
    #[serde(default)]
    pub details: JsonValue,
}

/// 历史记录中的一次评测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub files: Vec<FileProgress>,
    pub results: Vec<EvaluationResult>,
    pub average_score: i64,
}

/// 所有答卷总分的算术平均值，四舍五入取整；没有结果时为 0
pub fn average_score(results: &[EvaluationResult]) -> i64 {
    if results.is_empty() {
        return 0;
    }
    let sum: f64 = results.iter().map(|r| r.overall_score).sum();
    (sum / results.len() as f64).round() as i64
}
