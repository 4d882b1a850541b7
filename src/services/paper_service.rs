/// 试卷结构服务
///
/// 负责触发会话处理、拉取 paper-config 与 question-structure，并合并成一份 PaperConfig
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::{ApiExecutor, ToastLevel};
use crate::models::{PaperConfig, PaperPart};
use crate::services::paper_normalizer::{
    merge_paper_config_with_question_structure, normalize_paper_config, normalize_question_structure,
};

/// 试卷结构服务
#[derive(Clone)]
pub struct PaperService {
    executor: ApiExecutor,
}

impl PaperService {
    /// 创建新的试卷结构服务
    pub fn new(executor: ApiExecutor) -> Self {
        Self { executor }
    }

    /// 让后端处理已上传的评分标准、大纲与试卷
    pub async fn process_session(&self, session_id: &str, cancel: &CancellationToken) -> AppResult<()> {
        info!("[会话 {}] ⚙️ 请求后端处理准备材料...", session_id);
        let path = format!("/api/evaluation/sessions/{}/process", session_id);
        let body = json!({ "session_id": session_id });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = self.executor.post_json(&path, &body) => result,
        };

        match result {
            Ok(_) => {
                info!("[会话 {}] ✓ 处理完成", session_id);
                Ok(())
            }
            Err(e) => {
                warn!("[会话 {}] ❌ 处理失败: {}", session_id, e);
                self.executor
                    .notifier()
                    .toast(ToastLevel::Error, format!("处理失败: {}", e));
                Err(e)
            }
        }
    }

    /// 拉取 paper-config 并规范化
    pub async fn fetch_paper_config(&self, session_id: &str) -> AppResult<Vec<PaperPart>> {
        let path = format!("/api/evaluation/sessions/{}/paper-config", session_id);
        let payload = self.executor.get_json(&path).await?;
        Ok(normalize_paper_config(&payload))
    }

    /// 拉取 question-structure 并规范化（扁平列表按 base 的题目数量拆分）
    pub async fn fetch_question_structure(
        &self,
        session_id: &str,
        base: Option<&[PaperPart]>,
    ) -> AppResult<Vec<PaperPart>> {
        let path = format!("/api/evaluation/sessions/{}/question-structure", session_id);
        let payload = self.executor.get_json(&path).await?;
        Ok(normalize_question_structure(&payload, base))
    }

    /// 加载完整试卷结构
    ///
    /// `template` 存在时作为基础配置，否则使用后端的 paper-config。
    /// 任一接口失败都降级为空结构，只记录警告。
    pub async fn load_paper_structure(&self, session_id: &str, template: Option<&PaperConfig>) -> PaperConfig {
        let base = match template {
            Some(config) => config.parts.clone(),
            None => self.fetch_paper_config(session_id).await.unwrap_or_else(|e| {
                warn!("[会话 {}] ⚠️ 获取试卷配置失败: {}", session_id, e);
                Vec::new()
            }),
        };

        let base_ref = (!base.is_empty()).then_some(base.as_slice());
        let structure = self
            .fetch_question_structure(session_id, base_ref)
            .await
            .unwrap_or_else(|e| {
                warn!("[会话 {}] ⚠️ 获取题目结构失败: {}", session_id, e);
                Vec::new()
            });

        let parts = merge_paper_config_with_question_structure(&base, &structure);
        let config = PaperConfig::new(parts);
        info!(
            "[会话 {}] 📄 试卷结构: {} 个分卷，总分 {}",
            session_id,
            config.parts.len(),
            config.total_marks()
        );
        config
    }
}
