/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{FileProgress, FileStatus, ProgressBoard};

/// 未设置 `LOG_LEVEL` 时的过滤规则
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,evaluation_assistant=debug"
    } else {
        "info,evaluation_assistant=info"
    }
}

/// 初始化日志
///
/// `LOG_LEVEL` 控制过滤规则（如 "debug" 或 "info,evaluation_assistant=debug"），
/// 未设置时由 `verbose` 决定本 crate 是否输出 debug 日志。重复调用不会报错。
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(session_id: &str, max_files: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 评测助手启动 - 会话 {}", session_id);
    info!("📊 单次最多答卷数: {}", max_files);
    info!("{}", "=".repeat(60));
}

/// 记录一次评测开始
///
/// # 参数
/// - `run_id`: 评测批次编号
/// - `total`: 答卷总数
/// - `resolved`: 成功匹配文档ID的数量
pub fn log_run_start(run_id: u64, total: usize, resolved: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始第 {} 次评测", run_id);
    info!("📄 答卷: {} 份，已匹配文档: {} 份", total, resolved);
    info!("{}", "=".repeat(60));
}

/// 记录单份答卷的最终状态
pub fn log_file_settled(file: &FileProgress) {
    info!(
        "[文件 {}] 结束: 状态 {:?}, 步骤 {:?}, 进度 {}%",
        short_file_name(&file.name, 40),
        file.status,
        file.step,
        file.progress
    );
}

/// 一次评测结束后的汇总
pub fn print_run_summary(board: &ProgressBoard) {
    let completed = board.count(FileStatus::Completed);
    let failed = board.count(FileStatus::Failed);
    info!("{}", "-".repeat(60));
    info!(
        "🏁 第 {} 次评测汇总 ({})",
        board.run_id,
        chrono::Local::now().format("%H:%M:%S")
    );
    info!("   答卷 {} 份 | 评完 {} | 失败 {}", board.files.len(), completed, failed);
    for file in board.files.iter().filter(|f| f.status == FileStatus::Failed) {
        info!(
            "   ❌ {}: {}",
            short_file_name(&file.name, 40),
            file.error.as_deref().unwrap_or("未知错误")
        );
    }
    info!("{}", "-".repeat(60));
}

/// 缩短答卷文件名用于日志显示，保留扩展名
pub fn short_file_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().count() < max_len => (stem, Some(ext)),
        _ => (name, None),
    };
    let keep = max_len.saturating_sub(ext.map_or(0, |e| e.chars().count() + 1));
    let head: String = stem.chars().take(keep).collect();
    match ext {
        Some(ext) => format!("{}….{}", head, ext),
        None => format!("{}…", head),
    }
}
