use crate::error::{AppError, AppResult, FileError};
use crate::models::PaperConfig;
use crate::services::paper_normalizer::normalize_paper_config;
use serde_json::Value as JsonValue;
use std::path::Path;
use tokio::fs;

/// 从本地模板文件（.toml / .json）加载试卷配置
///
/// 模板内容与后端的 paper-config 返回格式相同，统一走规范化流程。
pub async fn load_paper_template(path: &Path) -> AppResult<PaperConfig> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    let payload: JsonValue = match ext.as_deref() {
        Some("toml") => {
            let value: toml::Table = toml::from_str(&content).map_err(|e| {
                AppError::File(FileError::ParseFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })
            })?;
            serde_json::to_value(value)?
        }
        Some("json") => serde_json::from_str(&content).map_err(|e| {
            AppError::File(FileError::ParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?,
        _ => {
            return Err(AppError::File(FileError::UnsupportedFormat {
                path: path.display().to_string(),
            }))
        }
    };

    Ok(PaperConfig::new(normalize_paper_config(&payload)))
}
