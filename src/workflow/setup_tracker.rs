//! 评测准备状态 - 流程层
//!
//! 核心职责：回答"这次评测能不能往下走"
//!
//! 步骤顺序：
//! 1. rubric → syllabus → questions → answers（准备材料）
//! 2. process（后端处理材料）
//! 3. marks（确认分值配置）
//! 4. send（开始评测）
//!
//! 处理状态：
//!
//! ```text
//! idle ──begin──> processing ──成功──> completed ──任意材料变更──> needs_reprocessing
//!                     │                                              │
//!                     └──失败：回到开始前的状态          begin <──────┘
//! ```

use tracing::{debug, info, warn};

use crate::error::{SetupError, ValidationError};
use crate::models::{
    AddFilesOutcome, AnswerFile, PaperConfig, ProcessingStatus, SetupStep, SetupStepKind, StepStatus,
};

/// 单次评测会话的准备状态
///
/// - 持有所有前置条件（评分标准、大纲、试卷、答卷、分值）
/// - 计算步骤列表和是否可以开始处理
/// - 不发任何请求
#[derive(Debug, Clone)]
pub struct SetupTracker {
    rubric_selected: bool,
    syllabus_attached: bool,
    syllabus_count: usize,
    questions_attached: bool,
    questions_name: Option<String>,
    answer_files: Vec<AnswerFile>,
    max_answer_files: usize,
    processing_status: ProcessingStatus,
    /// 开始处理前的状态，处理失败时恢复
    status_before_processing: ProcessingStatus,
    paper_config: Option<PaperConfig>,
    sent: bool,
}

impl SetupTracker {
    pub fn new(max_answer_files: usize) -> Self {
        Self {
            rubric_selected: false,
            syllabus_attached: false,
            syllabus_count: 0,
            questions_attached: false,
            questions_name: None,
            answer_files: Vec::new(),
            max_answer_files,
            processing_status: ProcessingStatus::Idle,
            status_before_processing: ProcessingStatus::Idle,
            paper_config: None,
            sent: false,
        }
    }

    // ========== 查询 ==========

    pub fn processing_status(&self) -> ProcessingStatus {
        self.processing_status
    }

    pub fn answer_files(&self) -> &[AnswerFile] {
        &self.answer_files
    }

    pub fn syllabus_count(&self) -> usize {
        self.syllabus_count
    }

    pub fn questions_name(&self) -> Option<&str> {
        self.questions_name.as_deref()
    }

    pub fn paper_config(&self) -> Option<&PaperConfig> {
        self.paper_config.as_ref()
    }

    pub fn max_answer_files(&self) -> usize {
        self.max_answer_files
    }

    pub fn remaining_slots(&self) -> usize {
        self.max_answer_files.saturating_sub(self.answer_files.len())
    }

    pub fn has_marks(&self) -> bool {
        self.paper_config.is_some()
    }

    /// 评分标准、大纲、试卷都已就绪且至少有一份答卷
    pub fn is_ready_to_process(&self) -> bool {
        self.rubric_selected
            && self.syllabus_attached
            && self.questions_attached
            && !self.answer_files.is_empty()
    }

    fn is_step_completed(&self, kind: SetupStepKind) -> bool {
        match kind {
            SetupStepKind::Rubric => self.rubric_selected,
            SetupStepKind::Syllabus => self.syllabus_attached,
            SetupStepKind::Questions => self.questions_attached,
            SetupStepKind::Answers => !self.answer_files.is_empty(),
            SetupStepKind::Process => self.processing_status == ProcessingStatus::Completed,
            SetupStepKind::Marks => self.has_marks(),
            SetupStepKind::Send => self.sent,
        }
    }

    /// 计算步骤列表
    ///
    /// 每一步只有在之前所有步骤都完成后才可用；
    /// 上传答卷例外，只要没有达到数量上限就一直可用。
    pub fn compute_steps(&self) -> Vec<SetupStep> {
        let mut prior_completed = true;
        SetupStepKind::ALL
            .iter()
            .map(|&kind| {
                let completed = self.is_step_completed(kind);
                let disabled = match kind {
                    SetupStepKind::Answers => self.remaining_slots() == 0,
                    _ => !prior_completed,
                };
                prior_completed &= completed;
                SetupStep {
                    kind,
                    status: if completed {
                        StepStatus::Completed
                    } else {
                        StepStatus::Pending
                    },
                    disabled,
                }
            })
            .collect()
    }

    /// 第一个未完成的步骤
    pub fn first_pending_step(&self) -> Option<SetupStepKind> {
        SetupStepKind::ALL
            .iter()
            .copied()
            .find(|&kind| !self.is_step_completed(kind))
    }

    // ========== 材料变更 ==========

    /// 处理完成后材料又被修改，需要重新处理
    fn invalidate(&mut self) {
        self.sent = false;
        if self.processing_status == ProcessingStatus::Completed {
            info!("🔄 准备材料已变更，需要重新处理");
            self.processing_status = ProcessingStatus::NeedsReprocessing;
        }
    }

    pub fn set_rubric(&mut self, selected: bool) {
        self.rubric_selected = selected;
        self.invalidate();
    }

    pub fn set_syllabus(&mut self, attached: bool, count: usize) {
        self.syllabus_attached = attached;
        self.syllabus_count = if attached { count } else { 0 };
        self.invalidate();
    }

    pub fn set_questions(&mut self, attached: bool, name: Option<String>) {
        self.questions_attached = attached;
        self.questions_name = if attached { name } else { None };
        self.invalidate();
    }

    /// 整体替换答卷列表，超出上限的部分被截掉
    pub fn set_answer_files(&mut self, mut files: Vec<AnswerFile>) -> AddFilesOutcome {
        let truncated = files.len().saturating_sub(self.max_answer_files);
        if truncated > 0 {
            warn!("答卷数量超过上限 {}，截掉 {} 份", self.max_answer_files, truncated);
            files.truncate(self.max_answer_files);
        }
        let accepted = files.len();
        self.answer_files = files;
        self.invalidate();

        AddFilesOutcome {
            accepted,
            truncated,
            remaining: self.remaining_slots(),
        }
    }

    /// 追加答卷
    ///
    /// 已满时拒绝并返回剩余名额；一批中超出名额的部分被截掉。
    pub fn add_answer_files(&mut self, files: Vec<AnswerFile>) -> Result<AddFilesOutcome, SetupError> {
        let remaining = self.remaining_slots();
        if remaining == 0 {
            return Err(SetupError::FileLimitReached {
                limit: self.max_answer_files,
                remaining,
            });
        }

        let total = files.len();
        let accepted: Vec<AnswerFile> = files.into_iter().take(remaining).collect();
        let outcome = AddFilesOutcome {
            accepted: accepted.len(),
            truncated: total - accepted.len(),
            remaining: remaining - accepted.len(),
        };
        if outcome.truncated > 0 {
            warn!(
                "只能再添加 {} 份答卷，{} 份被忽略",
                remaining, outcome.truncated
            );
        }

        self.answer_files.extend(accepted);
        self.invalidate();
        Ok(outcome)
    }

    pub fn remove_answer_file(&mut self, resource_id: &str) -> Result<AnswerFile, SetupError> {
        let index = self
            .answer_files
            .iter()
            .position(|f| f.resource_id == resource_id)
            .ok_or_else(|| SetupError::UnknownFile {
                resource_id: resource_id.to_string(),
            })?;
        let removed = self.answer_files.remove(index);
        self.invalidate();
        Ok(removed)
    }

    // ========== 处理状态 ==========

    /// 开始处理
    pub fn begin_processing(&mut self) -> Result<(), SetupError> {
        if self.processing_status == ProcessingStatus::Processing {
            return Err(SetupError::AlreadyProcessing);
        }
        if !self.is_ready_to_process() {
            let step = self
                .first_pending_step()
                .map(|s| s.to_string())
                .unwrap_or_default();
            return Err(SetupError::StepLocked { step });
        }

        self.status_before_processing = self.processing_status;
        self.processing_status = ProcessingStatus::Processing;
        debug!("处理状态: {:?} → processing", self.status_before_processing);
        Ok(())
    }

    /// 结束处理；失败时回到开始前的状态
    pub fn finish_processing(&mut self, success: bool) -> Result<ProcessingStatus, SetupError> {
        if self.processing_status != ProcessingStatus::Processing {
            return Err(SetupError::NotProcessing);
        }

        self.processing_status = if success {
            ProcessingStatus::Completed
        } else {
            self.status_before_processing
        };
        Ok(self.processing_status)
    }

    /// 确认分值配置，有任何校验错误都不会保存
    pub fn confirm_paper_config(&mut self, config: PaperConfig) -> Result<(), Vec<ValidationError>> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        self.paper_config = Some(config);
        self.sent = false;
        Ok(())
    }

    pub fn clear_paper_config(&mut self) {
        self.paper_config = None;
        self.sent = false;
    }

    /// 检查发送之前的步骤是否全部完成
    pub fn ensure_ready_to_send(&self) -> Result<(), SetupError> {
        match self
            .first_pending_step()
            .filter(|&s| s != SetupStepKind::Send)
        {
            Some(step) => Err(SetupError::StepLocked {
                step: step.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// 标记已开始评测，要求之前的步骤全部完成
    pub fn mark_sent(&mut self) -> Result<(), SetupError> {
        self.ensure_ready_to_send()?;
        self.sent = true;
        Ok(())
    }
}
