//! 答卷评测进度模型
//!
//! 每份答卷一个 `FileProgress`，由进度流事件驱动：
//!
//! ```text
//! pending ──(首次出现进度 > 0 或非初始步骤)──> processing ──> completed
//!    │                                            │
//!    └──────────────(流出错 / 无文档ID)───────────┴──> failed
//! ```
//!
//! completed / failed 为终态，之后的事件一律忽略。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Failed)
    }
}

/// 界面固定使用的评测步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStep {
    Analyzing,
    Marking,
    Feedback,
    Report,
    Done,
}

impl ProgressStep {
    /// 只有步骤信息时使用的默认进度
    pub fn default_progress(self) -> u8 {
        match self {
            ProgressStep::Analyzing => 10,
            ProgressStep::Marking => 40,
            ProgressStep::Feedback => 70,
            ProgressStep::Report => 90,
            ProgressStep::Done => 100,
        }
    }
}

/// 解析后的一条进度事件（字段已映射到固定词表）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressEvent {
    pub status: Option<FileStatus>,
    pub progress: Option<f64>,
    pub step: Option<ProgressStep>,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.progress.is_none() && self.step.is_none()
    }
}

/// 单份答卷的评测进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProgress {
    /// 资源ID（与后端内部的答卷文档ID不同）
    pub id: String,
    pub name: String,
    pub status: FileStatus,
    pub step: ProgressStep,
    /// 0-100
    pub progress: u8,
    #[serde(default)]
    pub error: Option<String>,
}

impl FileProgress {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: FileStatus::Pending,
            step: ProgressStep::Analyzing,
            progress: 0,
            error: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = FileStatus::Completed;
        self.step = ProgressStep::Done;
        self.progress = 100;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = FileStatus::Failed;
        self.error = Some(reason.into());
    }

    /// 合并一条事件，返回记录是否发生变化
    ///
    /// 优先级：显式 status > (progress >= 100 或 step 为完成) > 显式 progress > 步骤映射
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        if self.status.is_terminal() || event.is_empty() {
            return false;
        }
        let before = self.clone();

        match event.status {
            Some(FileStatus::Completed) => {
                self.complete();
                return *self != before;
            }
            Some(FileStatus::Failed) => {
                let reason = event
                    .message
                    .clone()
                    .unwrap_or_else(|| "评测失败".to_string());
                self.fail(reason);
                return *self != before;
            }
            Some(status) => self.status = status,
            None => {
                let finished = event.progress.is_some_and(|p| p >= 100.0)
                    || event.step == Some(ProgressStep::Done);
                if finished {
                    self.complete();
                    return *self != before;
                }
            }
        }

        if let Some(step) = event.step {
            // 显式 status 不是 completed 时不能进入 done
            self.step = step.min(ProgressStep::Report);
        }

        match event.progress {
            Some(p) => self.progress = p.round().clamp(0.0, 99.0) as u8,
            None => {
                if let Some(step) = event.step {
                    let implied = step.default_progress().min(99);
                    self.progress = self.progress.max(implied);
                }
            }
        }

        if self.status == FileStatus::Pending
            && (self.progress > 0 || self.step != ProgressStep::Analyzing)
        {
            self.status = FileStatus::Processing;
        }

        *self != before
    }
}

/// 整次评测的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    #[default]
    Idle,
    Running,
    /// 所有答卷都已结束（成功或失败）
    Completed,
    Cancelled,
}

/// 一次评测的全部答卷进度
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressBoard {
    /// 评测批次编号，每次新评测递增
    pub run_id: u64,
    pub overall: OverallStatus,
    pub files: Vec<FileProgress>,
}

impl ProgressBoard {
    pub fn file(&self, id: &str) -> Option<&FileProgress> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn file_mut(&mut self, id: &str) -> Option<&mut FileProgress> {
        self.files.iter_mut().find(|f| f.id == id)
    }

    pub fn all_settled(&self) -> bool {
        self.files.iter().all(|f| f.status.is_terminal())
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> ProgressEvent {
        ProgressEvent::default()
    }

    #[test]
    fn test_step_only_moves_to_processing() {
        let mut file = FileProgress::new("r1", "a.pdf");
        assert!(file.apply(&ProgressEvent {
            step: Some(ProgressStep::Marking),
            ..event()
        }));
        assert_eq!(file.status, FileStatus::Processing);
        assert_eq!(file.step, ProgressStep::Marking);
        assert_eq!(file.progress, 40);
    }

    #[test]
    fn test_initial_step_without_progress_stays_pending() {
        let mut file = FileProgress::new("r1", "a.pdf");
        file.apply(&ProgressEvent {
            progress: Some(0.0),
            step: Some(ProgressStep::Analyzing),
            ..event()
        });
        assert_eq!(file.status, FileStatus::Pending);
    }

    #[test]
    fn test_explicit_progress_beats_step_default() {
        let mut file = FileProgress::new("r1", "a.pdf");
        file.apply(&ProgressEvent {
            progress: Some(55.0),
            step: Some(ProgressStep::Marking),
            ..event()
        });
        assert_eq!(file.progress, 55);
        assert_eq!(file.status, FileStatus::Processing);
    }

    #[test]
    fn test_progress_hundred_completes() {
        let mut file = FileProgress::new("r1", "a.pdf");
        file.apply(&ProgressEvent {
            progress: Some(100.0),
            step: Some(ProgressStep::Feedback),
            ..event()
        });
        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(file.step, ProgressStep::Done);
        assert_eq!(file.progress, 100);
    }

    #[test]
    fn test_explicit_status_wins_over_progress() {
        let mut file = FileProgress::new("r1", "a.pdf");
        file.apply(&ProgressEvent {
            status: Some(FileStatus::Processing),
            progress: Some(100.0),
            ..event()
        });
        assert_eq!(file.status, FileStatus::Processing);
        assert!(file.progress < 100);

        file.apply(&ProgressEvent {
            status: Some(FileStatus::Completed),
            progress: Some(20.0),
            ..event()
        });
        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(file.progress, 100);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut file = FileProgress::new("r1", "a.pdf");
        file.apply(&ProgressEvent {
            status: Some(FileStatus::Failed),
            message: Some("ocr failed".to_string()),
            ..event()
        });
        assert_eq!(file.status, FileStatus::Failed);
        assert_eq!(file.error.as_deref(), Some("ocr failed"));

        assert!(!file.apply(&ProgressEvent {
            status: Some(FileStatus::Completed),
            ..event()
        }));
        assert_eq!(file.status, FileStatus::Failed);
    }

    #[test]
    fn test_board_settlement() {
        let mut board = ProgressBoard {
            run_id: 1,
            overall: OverallStatus::Running,
            files: vec![FileProgress::new("a", "a"), FileProgress::new("b", "b")],
        };
        assert!(!board.all_settled());
        board.file_mut("a").unwrap().complete();
        board.file_mut("b").unwrap().fail("x");
        assert!(board.all_settled());
        assert_eq!(board.count(FileStatus::Completed), 1);
        assert_eq!(board.count(FileStatus::Failed), 1);
    }
}
