/// 资源上传服务
///
/// 负责把评分标准 / 教学大纲 / 试卷 / 答卷以 multipart 方式上传，返回资源ID
use reqwest::multipart::{Form, Part};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, UploadError};
use crate::infrastructure::{ApiExecutor, ToastLevel};
use crate::models::{ResourceType, UploadFile, UploadedResource};
use crate::utils::fields::{f64_field, string_field};

const UPLOAD_ENDPOINT: &str = "/api/resources/upload";

/// 响应中可能包裹资源列表的字段，按顺序尝试
const WRAPPER_KEYS: &[&str] = &["uploads", "uploaded_resources", "resources", "data", "result"];
const RESOURCE_ID_KEYS: &[&str] = &["resource_id", "resourceId", "id"];
const FILENAME_KEYS: &[&str] = &["filename", "file_name", "name", "original_filename"];
const SIZE_KEYS: &[&str] = &["size_bytes", "sizeBytes", "size"];
const MIME_KEYS: &[&str] = &["mime_type", "mimeType", "content_type"];

/// 上传服务
#[derive(Clone)]
pub struct UploadService {
    executor: ApiExecutor,
}

impl UploadService {
    pub fn new(executor: ApiExecutor) -> Self {
        Self { executor }
    }

    /// 上传一批文件
    ///
    /// 失败时发出 toast，只影响本批次；取消时返回 `AppError::Cancelled`。
    pub async fn upload(
        &self,
        files: Vec<UploadFile>,
        resource_type: ResourceType,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<UploadedResource>> {
        if files.is_empty() {
            return Err(UploadError::EmptyBatch.into());
        }

        let count = files.len();
        info!(
            "[会话 {}] 📤 上传 {} 个文件 ({})",
            session_id,
            count,
            resource_type.as_str()
        );

        let form = build_form(files, resource_type, session_id)?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("[会话 {}] 上传已取消", session_id);
                return Err(AppError::Cancelled);
            }
            response = self.executor.post_multipart(UPLOAD_ENDPOINT, form) => response,
        };

        let result = response.and_then(|value| {
            let resources = extract_uploaded_resources(&value);
            if resources.is_empty() {
                Err(UploadError::NoResourcesReturned.into())
            } else {
                Ok(resources)
            }
        });

        match result {
            Ok(resources) => {
                info!("[会话 {}] ✓ 上传成功，获得 {} 个资源ID", session_id, resources.len());
                Ok(resources)
            }
            Err(e) => {
                warn!("[会话 {}] ❌ 上传失败: {}", session_id, e);
                self.executor
                    .notifier()
                    .toast(ToastLevel::Error, format!("上传失败: {}", e));
                Err(e)
            }
        }
    }
}

fn build_form(files: Vec<UploadFile>, resource_type: ResourceType, session_id: &str) -> AppResult<Form> {
    let mut form = Form::new()
        .text("resource_type", resource_type.as_str())
        .text("session_id", session_id.to_string());

    for file in files {
        let part = Part::bytes(file.bytes)
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type)
            .map_err(|_| UploadError::InvalidMime {
                filename: file.filename.clone(),
                mime: file.mime_type.clone(),
            })?;
        form = form.part("files", part);
    }

    Ok(form)
}

fn parse_resource(item: &JsonValue) -> Option<UploadedResource> {
    let resource_id = string_field(item, RESOURCE_ID_KEYS)?;
    Some(UploadedResource {
        resource_id,
        filename: string_field(item, FILENAME_KEYS),
        size_bytes: f64_field(item, SIZE_KEYS)
            .filter(|size| *size > 0.0)
            .map(|size| size.round() as u64),
        mime_type: string_field(item, MIME_KEYS),
    })
}

fn resources_from_list(items: &[JsonValue]) -> Vec<UploadedResource> {
    items.iter().filter_map(parse_resource).collect()
}

/// 从上传响应中提取资源列表
///
/// 依次尝试 uploads / uploaded_resources / resources / data / result，
/// 包裹对象本身也可能再包一层；响应是裸数组时直接解析。
pub fn extract_uploaded_resources(value: &JsonValue) -> Vec<UploadedResource> {
    if let Some(items) = value.as_array() {
        return resources_from_list(items);
    }

    for key in WRAPPER_KEYS {
        match value.get(*key) {
            Some(JsonValue::Array(items)) => return resources_from_list(items),
            Some(inner @ JsonValue::Object(_)) => {
                for nested in WRAPPER_KEYS {
                    if let Some(JsonValue::Array(items)) = inner.get(*nested) {
                        return resources_from_list(items);
                    }
                }
                if let Some(resource) = parse_resource(inner) {
                    return vec![resource];
                }
            }
            _ => {}
        }
    }

    // 单个资源对象
    debug!("上传响应中没有找到资源列表，尝试按单个资源解析");
    parse_resource(value).into_iter().collect()
}
