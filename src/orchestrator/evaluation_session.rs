//! 评测会话 - 编排层
//!
//! ## 职责
//!
//! 把准备状态、上传、试卷结构、进度协调和页面切换串成完整的评测流程：
//!
//! 1. **准备**：选择评分标准，上传大纲 / 试卷 / 答卷
//! 2. **处理**：后端处理材料，拉取并合并试卷结构
//! 3. **分值**：确认分值配置（校验不通过则阻止确认）
//! 4. **评测**：为每份答卷打开进度流，等待全部结束
//! 5. **结果**：拉取结果、写入历史记录、分析页 / 历史页切换
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有 `SetupTracker`、`ScreenRouter` 与 `ProgressCoordinator`
//! - **向下委托**：网络请求交给 services，状态规则交给 workflow

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppResult, RouterError, SetupError, UploadError, ValidationError};
use crate::infrastructure::{ApiExecutor, AppEvent, Notifier, ToastLevel};
use crate::models::{
    load_paper_template, AddFilesOutcome, AnswerFile, PaperConfig, ProgressBoard, ResourceType,
    UploadFile, UploadedResource,
};
use crate::orchestrator::progress_coordinator::{ProgressCoordinator, RunHandle};
use crate::orchestrator::screen_router::{next_screen, RouterAction, Screen, ScreenRouter};
use crate::services::{EvaluationBackend, HttpEvaluationBackend, PaperService, UploadService};
use crate::utils::logging;
use crate::workflow::SetupTracker;

/// 评测会话
pub struct EvaluationSession {
    config: Config,
    notifier: Notifier,
    backend: Arc<dyn EvaluationBackend>,
    uploads: UploadService,
    papers: PaperService,
    tracker: SetupTracker,
    router: ScreenRouter,
    coordinator: ProgressCoordinator,
    /// 处理完成后得到的试卷结构，待用户确认分值
    paper_draft: Option<PaperConfig>,
    cancel: CancellationToken,
}

impl EvaluationSession {
    /// 使用 HTTP 后端创建会话
    pub fn connect(config: Config) -> AppResult<Self> {
        config.validate()?;
        let notifier = Notifier::new();
        let executor = ApiExecutor::new(&config, notifier.clone())?;
        let backend = Arc::new(HttpEvaluationBackend::new(executor.clone()));
        Ok(Self::new(config, executor, backend))
    }

    /// 使用指定的评测后端创建会话
    pub fn new(config: Config, executor: ApiExecutor, backend: Arc<dyn EvaluationBackend>) -> Self {
        let notifier = executor.notifier().clone();
        logging::log_startup(&config.session_id, config.max_answer_files);

        Self {
            tracker: SetupTracker::new(config.max_answer_files),
            router: ScreenRouter::new(),
            coordinator: ProgressCoordinator::new(backend.clone(), notifier.clone()),
            uploads: UploadService::new(executor.clone()),
            papers: PaperService::new(executor),
            backend,
            notifier,
            config,
            paper_draft: None,
            cancel: CancellationToken::new(),
        }
    }

    // ========== 查询 ==========

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn tracker(&self) -> &SetupTracker {
        &self.tracker
    }

    pub fn router(&self) -> &ScreenRouter {
        &self.router
    }

    pub fn screen(&self) -> Screen {
        self.router.screen()
    }

    pub fn paper_draft(&self) -> Option<&PaperConfig> {
        self.paper_draft.as_ref()
    }

    /// 订阅事件总线（toast / 登录失效 / 单份答卷失败）
    pub fn events(&self) -> broadcast::Receiver<AppEvent> {
        self.notifier.subscribe()
    }

    /// 订阅答卷进度
    pub fn progress(&self) -> watch::Receiver<ProgressBoard> {
        self.coordinator.subscribe()
    }

    pub fn progress_snapshot(&self) -> ProgressBoard {
        self.coordinator.snapshot()
    }

    /// 取消进行中的上传和处理请求
    pub fn cancel_pending(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }

    // ========== 准备材料 ==========

    pub fn select_rubric(&mut self, selected: bool) {
        self.tracker.set_rubric(selected);
    }

    /// 上传教学大纲
    pub async fn upload_syllabus(&mut self, files: Vec<UploadFile>) -> AppResult<usize> {
        let token = self.cancel.child_token();
        let resources = self
            .uploads
            .upload(files, ResourceType::Syllabus, &self.config.session_id, &token)
            .await?;
        let count = self.tracker.syllabus_count() + resources.len();
        self.tracker.set_syllabus(true, count);
        Ok(count)
    }

    pub fn detach_syllabus(&mut self) {
        self.tracker.set_syllabus(false, 0);
    }

    /// 上传试卷
    pub async fn upload_question_paper(&mut self, file: UploadFile) -> AppResult<UploadedResource> {
        let token = self.cancel.child_token();
        let name = file.filename.clone();
        let resource = self
            .uploads
            .upload(vec![file], ResourceType::QuestionPaper, &self.config.session_id, &token)
            .await?
            .into_iter()
            .next()
            .ok_or(UploadError::NoResourcesReturned)?;
        self.tracker.set_questions(true, Some(name));
        Ok(resource)
    }

    pub fn detach_question_paper(&mut self) {
        self.tracker.set_questions(false, None);
    }

    /// 上传答卷
    ///
    /// 名额已满时直接拒绝；一批中超出名额的文件不会上传。
    pub async fn upload_answer_sheets(&mut self, mut files: Vec<UploadFile>) -> AppResult<AddFilesOutcome> {
        let remaining = self.tracker.remaining_slots();
        if remaining == 0 {
            let err = SetupError::FileLimitReached {
                limit: self.tracker.max_answer_files(),
                remaining,
            };
            self.notifier.toast(ToastLevel::Warning, err.to_string());
            return Err(err.into());
        }

        let truncated = files.len().saturating_sub(remaining);
        if truncated > 0 {
            self.notifier.toast(
                ToastLevel::Warning,
                format!("只能再上传 {} 份答卷，{} 份已忽略", remaining, truncated),
            );
            files.truncate(remaining);
        }

        let names: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        let token = self.cancel.child_token();
        let resources = self
            .uploads
            .upload(files, ResourceType::AnswerSheet, &self.config.session_id, &token)
            .await?;

        let answer_files = resources
            .into_iter()
            .enumerate()
            .map(|(i, r)| AnswerFile {
                name: r
                    .filename
                    .clone()
                    .or_else(|| names.get(i).cloned())
                    .unwrap_or_else(|| r.resource_id.clone()),
                size_bytes: r.size_bytes,
                resource_id: r.resource_id,
            })
            .collect();

        let mut outcome = self.tracker.add_answer_files(answer_files)?;
        outcome.truncated += truncated;
        Ok(outcome)
    }

    /// 添加已上传过的答卷
    pub fn attach_answer_files(&mut self, files: Vec<AnswerFile>) -> AppResult<AddFilesOutcome> {
        Ok(self.tracker.add_answer_files(files)?)
    }

    pub fn remove_answer_file(&mut self, resource_id: &str) -> AppResult<AnswerFile> {
        Ok(self.tracker.remove_answer_file(resource_id)?)
    }

    // ========== 处理与分值 ==========

    /// 让后端处理材料，然后加载试卷结构
    ///
    /// 失败时处理状态回到开始前。
    pub async fn process(&mut self) -> AppResult<PaperConfig> {
        self.tracker.begin_processing()?;
        let token = self.cancel.child_token();

        if let Err(e) = self.papers.process_session(&self.config.session_id, &token).await {
            self.tracker.finish_processing(false)?;
            return Err(e);
        }

        let template = match self.config.paper_template_path.as_deref() {
            Some(path) => match load_paper_template(Path::new(path)).await {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("⚠️ 加载本地试卷模板失败，改用后端配置: {}", e);
                    None
                }
            },
            None => None,
        };

        let paper = self
            .papers
            .load_paper_structure(&self.config.session_id, template.as_ref())
            .await;
        self.tracker.finish_processing(true)?;
        self.paper_draft = Some(paper.clone());
        Ok(paper)
    }

    /// 确认分值配置
    ///
    /// 校验不通过时不保存，每个问题发出一条提示。
    pub fn confirm_marks(&mut self, config: PaperConfig) -> Result<(), Vec<ValidationError>> {
        match self.tracker.confirm_paper_config(config.clone()) {
            Ok(()) => {
                info!("✓ 分值配置已确认，总分 {}", config.total_marks());
                self.paper_draft = Some(config);
                Ok(())
            }
            Err(errors) => {
                for error in &errors {
                    self.notifier.toast(ToastLevel::Warning, error.to_string());
                }
                Err(errors)
            }
        }
    }

    // ========== 评测 ==========

    /// 开始评测
    pub async fn start_evaluation(&mut self) -> AppResult<RunHandle> {
        if next_screen(self.router.screen(), RouterAction::StartEvaluation).is_none() {
            return Err(RouterError::InvalidTransition {
                from: self.router.screen().to_string(),
                action: RouterAction::StartEvaluation.to_string(),
            }
            .into());
        }
        self.tracker.ensure_ready_to_send()?;

        // 评测真正开始后才标记发送步骤完成
        let files = self.tracker.answer_files().to_vec();
        let handle = match self.coordinator.start(&self.config.session_id, &files).await {
            Ok(handle) => handle,
            Err(e) => {
                self.notifier
                    .toast(ToastLevel::Error, format!("无法开始评测: {}", e));
                return Err(e);
            }
        };

        self.tracker.mark_sent()?;
        self.router.start_evaluation(handle.run_id())?;
        Ok(handle)
    }

    /// 取消进行中的评测
    pub fn cancel_evaluation(&self) {
        self.coordinator.cancel_current();
    }

    /// 查看结果（所有答卷结束后）
    pub async fn view_results(&mut self) -> AppResult<()> {
        let board = self.coordinator.snapshot();
        if !board.all_settled() {
            return Err(RouterError::RunNotSettled.into());
        }

        let results = match self.backend.fetch_results(&self.config.session_id).await {
            Ok(results) => results,
            Err(e) => {
                self.notifier
                    .toast(ToastLevel::Error, format!("获取评测结果失败: {}", e));
                return Err(e);
            }
        };

        self.router.view_results(&board, results)?;
        Ok(())
    }

    pub fn open_analytics(&mut self) -> AppResult<()> {
        Ok(self.router.open_analytics()?)
    }

    pub fn back(&mut self) -> AppResult<Screen> {
        Ok(self.router.back()?)
    }

    pub fn view_history(&mut self) -> AppResult<()> {
        Ok(self.router.view_history()?)
    }

    pub fn select_history(&mut self, id: &str) -> AppResult<()> {
        Ok(self.router.select_session(id)?)
    }

    pub fn new_evaluation(&mut self) -> AppResult<()> {
        Ok(self.router.new_evaluation()?)
    }
}
