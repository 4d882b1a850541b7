//! 评测后端能力 - 业务能力层
//!
//! 进度协调器只依赖 `EvaluationBackend` trait：
//! - `resolve_documents`：资源ID → 答卷文档ID
//! - `open_progress_stream`：按答卷文档ID打开进度流（逐行）
//! - `fetch_results`：评测结束后拉取结果
//!
//! `HttpEvaluationBackend` 是基于 `ApiExecutor` 的实现；测试中使用内存实现。

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::{ApiExecutor, LineStream};
use crate::models::{AnswerDocument, EvaluationResult};
use crate::utils::fields::{array_field, f64_field, string_field};

const DOCUMENT_LIST_KEYS: &[&str] = &["documents", "answer_documents", "answers", "data", "results", "items"];
const DOCUMENT_ID_KEYS: &[&str] = &["id", "document_id", "answer_document_id", "documentId"];
const RESOURCE_ID_KEYS: &[&str] = &["resource_id", "resourceId", "answer_resource_id"];

const RESULT_LIST_KEYS: &[&str] = &["results", "evaluations", "data", "items"];
const SCORE_KEYS: &[&str] = &["overall_score", "score", "total_score", "marks_obtained"];
const MAX_SCORE_KEYS: &[&str] = &["max_score", "total_marks", "max_marks", "out_of"];
const FILE_NAME_KEYS: &[&str] = &["file_name", "filename", "name", "student_name"];

/// 评测后端
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    /// 列出会话中的答卷文档
    async fn resolve_documents(&self, session_id: &str) -> AppResult<Vec<AnswerDocument>>;

    /// 打开某份答卷的进度流
    async fn open_progress_stream(&self, session_id: &str, document_id: &str) -> AppResult<LineStream>;

    /// 拉取会话的评测结果
    async fn fetch_results(&self, session_id: &str) -> AppResult<Vec<EvaluationResult>>;
}

/// 基于 HTTP 的评测后端
#[derive(Clone)]
pub struct HttpEvaluationBackend {
    executor: ApiExecutor,
}

impl HttpEvaluationBackend {
    pub fn new(executor: ApiExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl EvaluationBackend for HttpEvaluationBackend {
    async fn resolve_documents(&self, session_id: &str) -> AppResult<Vec<AnswerDocument>> {
        let path = format!("/api/evaluation/sessions/{}/answer-documents", session_id);
        let value = self.executor.get_json(&path).await?;
        let documents = parse_answer_documents(&value);
        info!("[会话 {}] 获取到 {} 份答卷文档", session_id, documents.len());
        Ok(documents)
    }

    async fn open_progress_stream(&self, session_id: &str, document_id: &str) -> AppResult<LineStream> {
        let path = format!("/api/evaluation/answer-documents/{}/evaluate/stream", document_id);
        self.executor
            .open_line_stream(&path, &json!({ "session_id": session_id }))
            .await
    }

    async fn fetch_results(&self, session_id: &str) -> AppResult<Vec<EvaluationResult>> {
        let path = format!("/api/evaluation/sessions/{}/results", session_id);
        let value = self.executor.get_json(&path).await?;
        Ok(parse_evaluation_results(&value))
    }
}

fn list_items<'a>(value: &'a JsonValue, keys: &[&str]) -> &'a [JsonValue] {
    if let Some(items) = value.as_array() {
        return items;
    }
    array_field(value, keys).unwrap_or(&[])
}

/// 解析答卷文档列表，缺少任一ID的条目跳过
pub fn parse_answer_documents(value: &JsonValue) -> Vec<AnswerDocument> {
    list_items(value, DOCUMENT_LIST_KEYS)
        .iter()
        .filter_map(|item| {
            let id = string_field(item, DOCUMENT_ID_KEYS)?;
            let resource_id = string_field(item, RESOURCE_ID_KEYS)?;
            Some(AnswerDocument { id, resource_id })
        })
        .collect()
}

/// 建立 资源ID → 答卷文档ID 映射
///
/// 同一资源ID出现多次时保留第一条并记录警告。
pub fn build_document_map(documents: &[AnswerDocument]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(documents.len());
    for doc in documents {
        if doc.resource_id.is_empty() || doc.id.is_empty() {
            continue;
        }
        if let Some(existing) = map.get(&doc.resource_id) {
            warn!(
                "资源 {} 对应多个答卷文档 ({} / {})，使用第一个",
                doc.resource_id, existing, doc.id
            );
            continue;
        }
        map.insert(doc.resource_id.clone(), doc.id.clone());
    }
    map
}

/// 解析评测结果
pub fn parse_evaluation_results(value: &JsonValue) -> Vec<EvaluationResult> {
    list_items(value, RESULT_LIST_KEYS)
        .iter()
        .filter_map(|item| {
            let resource_id = string_field(item, RESOURCE_ID_KEYS)?;
            let overall_score = f64_field(item, SCORE_KEYS).unwrap_or_else(|| {
                debug!("结果 {} 没有总分字段，记为 0", resource_id);
                0.0
            });
            Some(EvaluationResult {
                resource_id,
                file_name: string_field(item, FILE_NAME_KEYS),
                overall_score,
                max_score: f64_field(item, MAX_SCORE_KEYS),
                details: item.clone(),
            })
        })
        .collect()
}
