//! 评测页面切换 - 编排层
//!
//! 五个页面之间的有限状态机，同时携带当前结果和历史记录：
//!
//! | 当前页面 | 操作 | 目标页面 |
//! |----------|------|----------|
//! | setup | start_evaluation | in_progress |
//! | in_progress | view_results（全部答卷结束后） | results |
//! | results | open_analytics | analytics |
//! | analytics | back | results |
//! | results / in_progress | view_history | history |
//! | history | select_session | results |
//! | history | back | setup |
//! | results / analytics / history | new_evaluation | setup |

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::info;
use uuid::Uuid;

use crate::error::RouterError;
use crate::models::{average_score, EvaluationResult, FileProgress, HistoryEntry, ProgressBoard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Setup,
    InProgress,
    Results,
    Analytics,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterAction {
    StartEvaluation,
    ViewResults,
    OpenAnalytics,
    Back,
    ViewHistory,
    SelectSession,
    NewEvaluation,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Setup => "setup",
            Screen::InProgress => "in_progress",
            Screen::Results => "results",
            Screen::Analytics => "analytics",
            Screen::History => "history",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RouterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 状态转移表
pub fn next_screen(from: Screen, action: RouterAction) -> Option<Screen> {
    use RouterAction::*;
    use Screen::*;

    match (from, action) {
        (Setup, StartEvaluation) => Some(InProgress),
        (InProgress, ViewResults) => Some(Results),
        (Results, OpenAnalytics) => Some(Analytics),
        (Analytics, Back) => Some(Results),
        (Results | InProgress, ViewHistory) => Some(History),
        (History, SelectSession) => Some(Results),
        (History, Back) => Some(Setup),
        (Results | Analytics | History, NewEvaluation) => Some(Setup),
        _ => None,
    }
}

/// 页面路由
#[derive(Debug, Default)]
pub struct ScreenRouter {
    screen: Screen,
    run_id: Option<u64>,
    files: Vec<FileProgress>,
    results: Vec<EvaluationResult>,
    /// 最新的在前
    history: Vec<HistoryEntry>,
    snapshotted_run: Option<u64>,
}

impl ScreenRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// 当前页面对应的评测批次
    pub fn run_id(&self) -> Option<u64> {
        self.run_id
    }

    pub fn files(&self) -> &[FileProgress] {
        &self.files
    }

    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn transition(&mut self, action: RouterAction) -> Result<Screen, RouterError> {
        let next = next_screen(self.screen, action).ok_or_else(|| RouterError::InvalidTransition {
            from: self.screen.to_string(),
            action: action.to_string(),
        })?;
        info!("📺 页面切换: {} → {}", self.screen, next);
        self.screen = next;
        Ok(next)
    }

    /// 开始新的评测
    pub fn start_evaluation(&mut self, run_id: u64) -> Result<(), RouterError> {
        self.transition(RouterAction::StartEvaluation)?;
        self.run_id = Some(run_id);
        self.files.clear();
        self.results.clear();
        Ok(())
    }

    /// 查看结果
    ///
    /// 需要所有答卷都已结束；每次评测第一次进入结果页时写入历史记录。
    pub fn view_results(
        &mut self,
        board: &ProgressBoard,
        results: Vec<EvaluationResult>,
    ) -> Result<(), RouterError> {
        if let Some(expected) = self.run_id.filter(|&id| id != board.run_id) {
            return Err(RouterError::StaleRun {
                expected,
                actual: board.run_id,
            });
        }
        if self.screen == Screen::InProgress && !board.all_settled() {
            return Err(RouterError::RunNotSettled);
        }
        self.transition(RouterAction::ViewResults)?;

        self.files = board.files.clone();
        self.results = results;

        if self.snapshotted_run != Some(board.run_id) {
            self.snapshotted_run = Some(board.run_id);
            let entry = HistoryEntry {
                id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                files: self.files.clone(),
                results: self.results.clone(),
                average_score: average_score(&self.results),
            };
            info!(
                "🗂️ 保存评测记录: {} 份答卷，平均分 {}",
                entry.files.len(),
                entry.average_score
            );
            self.history.insert(0, entry);
        }
        Ok(())
    }

    pub fn open_analytics(&mut self) -> Result<(), RouterError> {
        self.transition(RouterAction::OpenAnalytics).map(|_| ())
    }

    pub fn back(&mut self) -> Result<Screen, RouterError> {
        self.transition(RouterAction::Back)
    }

    pub fn view_history(&mut self) -> Result<(), RouterError> {
        self.transition(RouterAction::ViewHistory).map(|_| ())
    }

    /// 打开历史记录中的一次评测
    pub fn select_session(&mut self, id: &str) -> Result<(), RouterError> {
        let entry = self
            .history
            .iter()
            .find(|h| h.id == id)
            .cloned()
            .ok_or_else(|| RouterError::UnknownHistory { id: id.to_string() })?;
        self.transition(RouterAction::SelectSession)?;
        self.files = entry.files;
        self.results = entry.results;
        Ok(())
    }

    /// 回到准备页开始新一轮评测，历史记录保留
    pub fn new_evaluation(&mut self) -> Result<(), RouterError> {
        self.transition(RouterAction::NewEvaluation)?;
        self.run_id = None;
        self.files.clear();
        self.results.clear();
        Ok(())
    }
}
