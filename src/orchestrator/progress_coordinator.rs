//! 答卷进度协调器 - 编排层
//!
//! ## 职责
//!
//! 一次评测中为每份答卷打开一条进度流，并把所有答卷的状态汇总成一块进度板。
//!
//! ## 核心流程
//!
//! 1. **替换进度板**：新评测取消上一次评测，并整体替换（不是追加）答卷列表
//! 2. **文档解析**：资源ID → 答卷文档ID；解析不到的答卷立即标记失败
//! 3. **并发订阅**：每份答卷一个 tokio 任务，单条流出错只影响该答卷
//! 4. **汇总**：所有任务都结束（无论成败）后整体状态才变为 completed
//!
//! ## 取消
//!
//! 每次评测一个 `CancellationToken`。每次修改进度板前都会检查令牌和批次编号，
//! 已取消或已被替换的评测不会再改动进度板。

use futures::future::join_all;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, StreamError};
use crate::infrastructure::{AppEvent, Notifier};
use crate::models::{AnswerFile, FileProgress, OverallStatus, ProgressBoard};
use crate::services::evaluation_api::{build_document_map, EvaluationBackend};
use crate::services::progress_stream::parse_progress_line;
use crate::utils::logging;

const MISSING_DOCUMENT_REASON: &str = "未找到对应的答卷文档";

/// 进度协调器
pub struct ProgressCoordinator {
    backend: Arc<dyn EvaluationBackend>,
    notifier: Notifier,
    board: Arc<watch::Sender<ProgressBoard>>,
    run_counter: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

/// 一次评测的句柄
#[derive(Debug)]
pub struct RunHandle {
    run_id: u64,
    cancel: CancellationToken,
    board: Arc<watch::Sender<ProgressBoard>>,
    supervisor: JoinHandle<ProgressBoard>,
}

/// 单条进度流任务的上下文
#[derive(Clone)]
struct StreamCtx {
    run_id: u64,
    session_id: String,
    file_id: String,
    cancel: CancellationToken,
    board: Arc<watch::Sender<ProgressBoard>>,
    notifier: Notifier,
}

impl StreamCtx {
    /// 修改本答卷的记录；已取消或进度板已属于其他批次时不做任何修改
    fn update(&self, f: impl FnOnce(&mut FileProgress) -> bool) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.board.send_if_modified(|board| {
            if board.run_id != self.run_id {
                return false;
            }
            board.file_mut(&self.file_id).map(f).unwrap_or(false)
        })
    }

    fn fail(&self, reason: String) {
        let changed = self.update(|file| {
            if file.status.is_terminal() {
                return false;
            }
            file.fail(reason.clone());
            true
        });
        if changed {
            warn!("[文件 {}] ❌ 评测失败: {}", self.file_id, reason);
            self.notifier.publish(AppEvent::FileFailed {
                resource_id: self.file_id.clone(),
                reason,
            });
        }
    }
}

impl ProgressCoordinator {
    pub fn new(backend: Arc<dyn EvaluationBackend>, notifier: Notifier) -> Self {
        let (sender, _) = watch::channel(ProgressBoard::default());
        Self {
            backend,
            notifier,
            board: Arc::new(sender),
            run_counter: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// 订阅进度板
    pub fn subscribe(&self) -> watch::Receiver<ProgressBoard> {
        self.board.subscribe()
    }

    /// 当前进度板快照
    pub fn snapshot(&self) -> ProgressBoard {
        self.board.borrow().clone()
    }

    /// 取消当前评测
    pub fn cancel_current(&self) {
        let token = self.replace_token(None);
        if let Some(token) = token {
            token.cancel();
            let run_id = self.board.borrow().run_id;
            mark_cancelled(&self.board, run_id);
        }
    }

    fn replace_token(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        match self.current.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, token),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), token),
        }
    }

    /// 开始一次评测
    ///
    /// 只有全部答卷都无法解析到文档ID（或解析请求本身失败）时返回错误，
    /// 此时所有答卷已被标记为失败。
    pub async fn start(&self, session_id: &str, files: &[AnswerFile]) -> AppResult<RunHandle> {
        if files.is_empty() {
            return Err(StreamError::NoFiles.into());
        }

        let cancel = CancellationToken::new();
        if let Some(previous) = self.replace_token(Some(cancel.clone())) {
            debug!("取消上一次评测");
            previous.cancel();
        }

        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.board.send_replace(ProgressBoard {
            run_id,
            overall: OverallStatus::Running,
            files: files
                .iter()
                .map(|f| FileProgress::new(&f.resource_id, &f.name))
                .collect(),
        });

        let document_map = match self.resolve(session_id, &cancel).await {
            Ok(map) => map,
            Err(e) => {
                self.abort_run(run_id, &cancel, &e.to_string());
                return Err(e);
            }
        };

        let resolved: Vec<(String, String)> = files
            .iter()
            .filter_map(|f| {
                document_map
                    .get(&f.resource_id)
                    .map(|doc| (f.resource_id.clone(), doc.clone()))
            })
            .collect();

        logging::log_run_start(run_id, files.len(), resolved.len());

        if resolved.is_empty() {
            let err: AppError = StreamError::NoDocumentsResolved {
                session_id: session_id.to_string(),
            }
            .into();
            self.abort_run(run_id, &cancel, MISSING_DOCUMENT_REASON);
            return Err(err);
        }

        let base_ctx = StreamCtx {
            run_id,
            session_id: session_id.to_string(),
            file_id: String::new(),
            cancel: cancel.clone(),
            board: self.board.clone(),
            notifier: self.notifier.clone(),
        };

        // 解析不到文档ID的答卷直接失败，不打开进度流
        for file in files {
            if !document_map.contains_key(&file.resource_id) {
                StreamCtx {
                    file_id: file.resource_id.clone(),
                    ..base_ctx.clone()
                }
                .fail(MISSING_DOCUMENT_REASON.to_string());
            }
        }

        let mut handles = Vec::with_capacity(resolved.len());
        for (file_id, document_id) in resolved {
            let ctx = StreamCtx {
                file_id,
                ..base_ctx.clone()
            };
            let backend = self.backend.clone();
            handles.push(tokio::spawn(async move {
                follow_stream(backend, ctx, document_id).await;
            }));
        }

        let supervisor = tokio::spawn(supervise(run_id, cancel.clone(), self.board.clone(), handles));

        Ok(RunHandle {
            run_id,
            cancel,
            board: self.board.clone(),
            supervisor,
        })
    }

    async fn resolve(&self, session_id: &str, cancel: &CancellationToken) -> AppResult<HashMap<String, String>> {
        let documents = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            documents = self.backend.resolve_documents(session_id) => documents?,
        };
        Ok(build_document_map(&documents))
    }

    /// 整次评测无法继续：所有答卷标记失败，整体结束
    fn abort_run(&self, run_id: u64, cancel: &CancellationToken, reason: &str) {
        if cancel.is_cancelled() {
            return;
        }
        error!("❌ 第 {} 次评测无法继续: {}", run_id, reason);
        self.board.send_if_modified(|board| {
            if board.run_id != run_id {
                return false;
            }
            for file in board.files.iter_mut() {
                file.fail(reason);
            }
            board.overall = OverallStatus::Completed;
            true
        });
    }
}

impl Drop for ProgressCoordinator {
    fn drop(&mut self) {
        if let Some(token) = self.replace_token(None) {
            token.cancel();
        }
    }
}

fn mark_cancelled(board: &watch::Sender<ProgressBoard>, run_id: u64) {
    board.send_if_modified(|board| {
        if board.run_id != run_id || board.overall != OverallStatus::Running {
            return false;
        }
        board.overall = OverallStatus::Cancelled;
        true
    });
}

/// 读取一条进度流直到结束
///
/// - 流出错：该答卷失败
/// - 正常结束但没有收到终态事件：视为完成
/// - 每处理一行让出一次执行权
async fn follow_stream(backend: Arc<dyn EvaluationBackend>, ctx: StreamCtx, document_id: String) {
    let opened = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return,
        opened = backend.open_progress_stream(&ctx.session_id, &document_id) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            ctx.fail(format!("无法打开进度流: {}", e));
            return;
        }
    };
    debug!("[文件 {}] 进度流已打开 (文档 {})", ctx.file_id, document_id);

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                debug!("[文件 {}] 进度流已取消", ctx.file_id);
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                if let Some(event) = parse_progress_line(&line) {
                    ctx.update(|file| file.apply(&event));
                }
            }
            Some(Err(e)) => {
                ctx.fail(e.to_string());
                return;
            }
            None => break,
        }

        if is_settled(&ctx) {
            break;
        }
        tokio::task::yield_now().await;
    }

    ctx.update(|file| {
        if file.status.is_terminal() {
            return false;
        }
        file.complete();
        true
    });
}

fn is_settled(ctx: &StreamCtx) -> bool {
    let board = ctx.board.borrow();
    board.run_id != ctx.run_id
        || board
            .file(&ctx.file_id)
            .map(|f| f.status.is_terminal())
            .unwrap_or(true)
}

/// 等待所有进度流结束（无论成败）后汇总
async fn supervise(
    run_id: u64,
    cancel: CancellationToken,
    board: Arc<watch::Sender<ProgressBoard>>,
    handles: Vec<JoinHandle<()>>,
) -> ProgressBoard {
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("进度流任务异常退出: {}", e);
        }
    }

    if !cancel.is_cancelled() {
        board.send_if_modified(|b| {
            if b.run_id != run_id {
                return false;
            }
            // 任务 panic 时记录可能仍未结束
            for file in b.files.iter_mut() {
                file.fail("进度流意外中断");
            }
            b.overall = OverallStatus::Completed;
            true
        });

        let snapshot = board.borrow().clone();
        if snapshot.run_id == run_id {
            for file in &snapshot.files {
                logging::log_file_settled(file);
            }
            logging::print_run_summary(&snapshot);
        }
    }

    let snapshot = board.borrow().clone();
    info!("第 {} 次评测结束: {:?}", run_id, snapshot.overall);
    snapshot
}

impl RunHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// 取消本次评测
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("⏹️ 取消第 {} 次评测", self.run_id);
            self.cancel.cancel();
            mark_cancelled(&self.board, self.run_id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 等待所有答卷结束，返回最终进度板
    pub async fn wait(self) -> AppResult<ProgressBoard> {
        self.supervisor
            .await
            .map_err(|e| AppError::Other(format!("评测任务异常退出: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::LineStream;
    use crate::models::{AnswerDocument, EvaluationResult, FileStatus, ProgressStep};
    use async_trait::async_trait;
    use futures::stream;

    /// 内存中的评测后端
    #[derive(Default)]
    struct FakeBackend {
        documents: Vec<AnswerDocument>,
        /// 文档ID → 流内容；None 表示流出错
        streams: HashMap<String, Vec<Option<&'static str>>>,
        /// 永不结束的流
        hanging: Vec<String>,
    }

    impl FakeBackend {
        fn document(mut self, resource_id: &str, document_id: &str) -> Self {
            self.documents.push(AnswerDocument {
                id: document_id.to_string(),
                resource_id: resource_id.to_string(),
            });
            self
        }

        fn stream(mut self, document_id: &str, lines: Vec<Option<&'static str>>) -> Self {
            self.streams.insert(document_id.to_string(), lines);
            self
        }

        fn hanging(mut self, document_id: &str) -> Self {
            self.hanging.push(document_id.to_string());
            self
        }
    }

    #[async_trait]
    impl EvaluationBackend for FakeBackend {
        async fn resolve_documents(&self, _session_id: &str) -> AppResult<Vec<AnswerDocument>> {
            Ok(self.documents.clone())
        }

        async fn open_progress_stream(&self, _session_id: &str, document_id: &str) -> AppResult<LineStream> {
            if self.hanging.iter().any(|d| d == document_id) {
                return Ok(stream::pending().boxed());
            }
            let lines = self.streams.get(document_id).cloned().unwrap_or_default();
            let items: Vec<AppResult<String>> = lines
                .into_iter()
                .map(|line| match line {
                    Some(l) => Ok(l.to_string()),
                    None => Err(AppError::stream_read_failed(document_id, "connection reset")),
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }

        async fn fetch_results(&self, _session_id: &str) -> AppResult<Vec<EvaluationResult>> {
            Ok(Vec::new())
        }
    }

    fn answer_files(ids: &[&str]) -> Vec<AnswerFile> {
        ids.iter()
            .map(|id| AnswerFile::new(*id, format!("{}.pdf", id)))
            .collect()
    }

    fn coordinator(backend: FakeBackend) -> ProgressCoordinator {
        ProgressCoordinator::new(Arc::new(backend), Notifier::new())
    }

    #[tokio::test]
    async fn test_unresolved_file_fails_but_run_completes() {
        let backend = FakeBackend::default()
            .document("r1", "d1")
            .document("r2", "d2")
            .stream(
                "d1",
                vec![
                    Some(r#"data: {"step": "analyzing", "progress": 10}"#),
                    Some(r#"data: {"step": "grading"}"#),
                    Some(r#"data: {"status": "completed"}"#),
                ],
            )
            .stream("d2", vec![Some(r#"data: {"progress": 30}"#), None]);
        let coordinator = coordinator(backend);
        let mut notifier_rx = coordinator.notifier.subscribe();

        let handle = coordinator
            .start("s1", &answer_files(&["r1", "r2", "r3"]))
            .await
            .unwrap();
        let board = handle.wait().await.unwrap();

        assert_eq!(board.overall, OverallStatus::Completed);
        let r1 = board.file("r1").unwrap();
        assert_eq!(r1.status, FileStatus::Completed);
        assert_eq!(r1.progress, 100);
        assert_eq!(r1.step, ProgressStep::Done);
        assert_eq!(board.file("r2").unwrap().status, FileStatus::Failed);
        let r3 = board.file("r3").unwrap();
        assert_eq!(r3.status, FileStatus::Failed);
        assert_eq!(r3.error.as_deref(), Some(MISSING_DOCUMENT_REASON));

        let mut failed = Vec::new();
        while let Ok(event) = notifier_rx.try_recv() {
            if let AppEvent::FileFailed { resource_id, .. } = event {
                failed.push(resource_id);
            }
        }
        failed.sort();
        assert_eq!(failed, vec!["r2", "r3"]);
    }

    #[tokio::test]
    async fn test_clean_eof_completes_file() {
        let backend = FakeBackend::default()
            .document("r1", "d1")
            .stream("d1", vec![Some("Evaluating answer sheet"), Some(": ping")]);
        let coordinator = coordinator(backend);

        let board = coordinator
            .start("s1", &answer_files(&["r1"]))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(board.file("r1").unwrap().status, FileStatus::Completed);
    }

    #[tokio::test]
    async fn test_nothing_resolved_is_fatal() {
        let coordinator = coordinator(FakeBackend::default().document("other", "d9"));

        let err = coordinator
            .start("s1", &answer_files(&["r1", "r2"]))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AppError::Stream(StreamError::NoDocumentsResolved { .. })
        ));

        let board = coordinator.snapshot();
        assert_eq!(board.overall, OverallStatus::Completed);
        assert!(board.files.iter().all(|f| f.status == FileStatus::Failed));
    }

    #[tokio::test]
    async fn test_empty_file_list_rejected() {
        let coordinator = coordinator(FakeBackend::default());
        let err = coordinator.start("s1", &[]).await.err().unwrap();
        assert!(matches!(err, AppError::Stream(StreamError::NoFiles)));
    }

    #[tokio::test]
    async fn test_cancel_suppresses_further_updates() {
        let backend = FakeBackend::default().document("r1", "d1").hanging("d1");
        let coordinator = coordinator(backend);

        let handle = coordinator.start("s1", &answer_files(&["r1"])).await.unwrap();
        handle.cancel();
        let board = handle.wait().await.unwrap();

        assert_eq!(board.overall, OverallStatus::Cancelled);
        assert_eq!(board.file("r1").unwrap().status, FileStatus::Pending);
    }

    #[tokio::test]
    async fn test_new_run_replaces_previous_board() {
        let backend = FakeBackend::default()
            .document("r1", "d1")
            .document("r2", "d2")
            .hanging("d1")
            .stream("d2", vec![Some(r#"{"status": "done"}"#)]);
        let coordinator = coordinator(backend);
        let mut rx = coordinator.subscribe();

        let first = coordinator.start("s1", &answer_files(&["r1"])).await.unwrap();
        let second = coordinator.start("s1", &answer_files(&["r2"])).await.unwrap();
        assert!(first.is_cancelled());
        assert!(second.run_id() > first.run_id());

        let stale = first.wait().await.unwrap();
        assert_eq!(stale.run_id, 2);

        let board = second.wait().await.unwrap();
        assert_eq!(board.files.len(), 1);
        assert_eq!(board.files[0].id, "r2");
        assert_eq!(board.files[0].status, FileStatus::Completed);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().run_id, 2);
    }
}
