//! 进度流解析 - 业务能力层
//!
//! 只负责把进度流中的一行文本转换为 `ProgressEvent`，不关心是哪份答卷。
//!
//! 每行可能是：
//! - SSE 格式：`data: {"status": "...", "progress": 40, "step": "grading"}`
//! - 裸 JSON
//! - 纯文本（只能靠关键词猜测步骤）

use phf::phf_map;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::models::{FileStatus, ProgressEvent, ProgressStep};
use crate::utils::fields::{f64_field, string_field};

/// 后端状态词 → 界面状态
static STATUS_VOCABULARY: phf::Map<&'static str, FileStatus> = phf_map! {
    "pending" => FileStatus::Pending,
    "queued" => FileStatus::Pending,
    "waiting" => FileStatus::Pending,
    "processing" => FileStatus::Processing,
    "running" => FileStatus::Processing,
    "in_progress" => FileStatus::Processing,
    "started" => FileStatus::Processing,
    "evaluating" => FileStatus::Processing,
    "completed" => FileStatus::Completed,
    "complete" => FileStatus::Completed,
    "done" => FileStatus::Completed,
    "success" => FileStatus::Completed,
    "succeeded" => FileStatus::Completed,
    "finished" => FileStatus::Completed,
    "failed" => FileStatus::Failed,
    "failure" => FileStatus::Failed,
    "error" => FileStatus::Failed,
    "errored" => FileStatus::Failed,
};

/// 后端步骤词 → 界面步骤
static STEP_VOCABULARY: phf::Map<&'static str, ProgressStep> = phf_map! {
    "analyzing" => ProgressStep::Analyzing,
    "analysing" => ProgressStep::Analyzing,
    "analysis" => ProgressStep::Analyzing,
    "ocr" => ProgressStep::Analyzing,
    "extracting" => ProgressStep::Analyzing,
    "reading" => ProgressStep::Analyzing,
    "parsing" => ProgressStep::Analyzing,
    "initializing" => ProgressStep::Analyzing,
    "started" => ProgressStep::Analyzing,
    "evaluating_answer" => ProgressStep::Analyzing,
    "marking" => ProgressStep::Marking,
    "grading" => ProgressStep::Marking,
    "scoring" => ProgressStep::Marking,
    "evaluating" => ProgressStep::Marking,
    "evaluation" => ProgressStep::Marking,
    "feedback" => ProgressStep::Feedback,
    "generating_feedback" => ProgressStep::Feedback,
    "commenting" => ProgressStep::Feedback,
    "review" => ProgressStep::Feedback,
    "report" => ProgressStep::Report,
    "generating_report" => ProgressStep::Report,
    "summary" => ProgressStep::Report,
    "summarizing" => ProgressStep::Report,
    "finalizing" => ProgressStep::Report,
    "done" => ProgressStep::Done,
    "completed" => ProgressStep::Done,
    "complete" => ProgressStep::Done,
    "finished" => ProgressStep::Done,
};

const STATUS_KEYS: &[&str] = &["status", "state"];
const PROGRESS_KEYS: &[&str] = &["progress", "percent", "percentage"];
const STEP_KEYS: &[&str] = &["step", "stage", "phase", "current_step", "currentStep"];
const MESSAGE_KEYS: &[&str] = &["message", "detail", "error", "msg"];

/// 统一词形：小写，空格/连字符转下划线
fn vocabulary_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// 把后端状态词映射为固定状态
pub fn map_status(raw: &str) -> Option<FileStatus> {
    STATUS_VOCABULARY.get(vocabulary_key(raw).as_str()).copied()
}

/// 把后端步骤词映射为固定步骤
///
/// 先精确匹配，再按包含关系匹配（如 "ai_grading_v2" → marking）。
pub fn map_step(raw: &str) -> Option<ProgressStep> {
    let key = vocabulary_key(raw);
    if let Some(step) = STEP_VOCABULARY.get(key.as_str()) {
        return Some(*step);
    }
    guess_step_from_text(&key)
}

/// 纯文本关键词猜测
pub fn guess_step_from_text(text: &str) -> Option<ProgressStep> {
    let text = text.to_lowercase();
    if text.contains("evaluat") && text.contains("answer") {
        Some(ProgressStep::Analyzing)
    } else if text.contains("analy") || text.contains("ocr") || text.contains("extract") {
        Some(ProgressStep::Analyzing)
    } else if text.contains("mark") || text.contains("grad") || text.contains("scor") {
        Some(ProgressStep::Marking)
    } else if text.contains("feedback") {
        Some(ProgressStep::Feedback)
    } else if text.contains("report") || text.contains("summar") {
        Some(ProgressStep::Report)
    } else if text.contains("complete") || text.contains("finished") {
        Some(ProgressStep::Done)
    } else {
        None
    }
}

fn event_from_json(value: &JsonValue) -> ProgressEvent {
    // 有些后端把真正的事件包在 data 字段里
    let body = match value.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    };

    ProgressEvent {
        status: string_field(body, STATUS_KEYS).and_then(|s| map_status(&s)),
        progress: f64_field(body, PROGRESS_KEYS),
        step: string_field(body, STEP_KEYS).and_then(|s| map_step(&s)),
        message: string_field(body, MESSAGE_KEYS),
    }
}

/// 解析进度流中的一行
///
/// 空行、注释行（`:` 开头）、非 data 的 SSE 字段以及无法识别的内容返回 None。
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim(),
        None => {
            if ["event:", "id:", "retry:"].iter().any(|p| line.starts_with(p)) {
                return None;
            }
            line
        }
    };

    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }

    let event = match serde_json::from_str::<JsonValue>(payload) {
        Ok(value) if value.is_object() => event_from_json(&value),
        _ => {
            debug!("非结构化进度文本: {}", payload);
            ProgressEvent {
                step: guess_step_from_text(payload),
                message: Some(payload.to_string()),
                ..Default::default()
            }
        }
    };

    if event.is_empty() {
        None
    } else {
        Some(event)
    }
}
