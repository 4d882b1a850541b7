use serde::{Deserialize, Serialize};
use std::fmt;

/// 会话处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    /// 处理完成后准备材料又被修改，需要重新处理
    NeedsReprocessing,
}

/// 评测准备步骤（按顺序解锁）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStepKind {
    Rubric,
    Syllabus,
    Questions,
    Answers,
    Process,
    Marks,
    Send,
}

impl SetupStepKind {
    pub const ALL: [SetupStepKind; 7] = [
        SetupStepKind::Rubric,
        SetupStepKind::Syllabus,
        SetupStepKind::Questions,
        SetupStepKind::Answers,
        SetupStepKind::Process,
        SetupStepKind::Marks,
        SetupStepKind::Send,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SetupStepKind::Rubric => "rubric",
            SetupStepKind::Syllabus => "syllabus",
            SetupStepKind::Questions => "questions",
            SetupStepKind::Answers => "answers",
            SetupStepKind::Process => "process",
            SetupStepKind::Marks => "marks",
            SetupStepKind::Send => "send",
        }
    }
}

impl fmt::Display for SetupStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
}

/// 步骤列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupStep {
    pub kind: SetupStepKind,
    pub status: StepStatus,
    pub disabled: bool,
}

impl SetupStep {
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// 已上传的答卷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerFile {
    /// 资源ID（界面用它关联文件）
    pub resource_id: String,
    pub name: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl AnswerFile {
    pub fn new(resource_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            name: name.into(),
            size_bytes: None,
        }
    }
}

/// 追加答卷的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddFilesOutcome {
    /// 实际加入的数量
    pub accepted: usize,
    /// 超出上限被截掉的数量
    pub truncated: usize,
    /// 加入后剩余名额
    pub remaining: usize,
}
