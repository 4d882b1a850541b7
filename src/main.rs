use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use evaluation_assistant::models::UploadFile;
use evaluation_assistant::utils::logging;
use evaluation_assistant::{Config, EvaluationSession};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "evaluation-assistant")]
#[command(about = "上传材料、确认分值并跟踪答卷评测进度")]
#[command(version)]
struct Args {
    /// 答卷文件
    #[arg(required = true)]
    answers: Vec<PathBuf>,

    /// 教学大纲文件（可重复）
    #[arg(long)]
    syllabus: Vec<PathBuf>,

    /// 试卷文件
    #[arg(long)]
    paper: Option<PathBuf>,

    /// 输出本程序的 debug 日志（也可用 VERBOSE_LOGGING=true）
    #[arg(short, long)]
    verbose: bool,
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }
    Ok(files)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置
    let mut config = Config::from_env();
    config.verbose_logging |= args.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    let mut session = EvaluationSession::connect(config)?;

    // 准备材料
    session.select_rubric(true);
    if !args.syllabus.is_empty() {
        session.upload_syllabus(read_files(&args.syllabus).await?).await?;
    }
    if let Some(paper) = &args.paper {
        session
            .upload_question_paper(UploadFile::from_path(paper).await?)
            .await?;
    }
    let outcome = session
        .upload_answer_sheets(read_files(&args.answers).await?)
        .await?;
    info!("📄 已上传 {} 份答卷，剩余名额 {}", outcome.accepted, outcome.remaining);

    // 处理并确认分值
    let paper = session.process().await?;
    if let Err(errors) = session.confirm_marks(paper) {
        for error in &errors {
            warn!("⚠️ {}", error);
        }
        bail!("分值配置未通过校验，请修改后重试");
    }

    // 评测
    let handle = session.start_evaluation().await?;
    let mut progress = session.progress();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let board = progress.borrow_and_update().clone();
            for file in &board.files {
                info!("[文件 {}] {:?} {:?} {}%", file.name, file.status, file.step, file.progress);
            }
        }
    });

    handle.wait().await?;
    watcher.abort();

    session.view_results().await?;
    if let Some(entry) = session.router().history().first() {
        info!("🏁 平均分: {}", entry.average_score);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_syllabus_and_answers() {
        let args = Args::try_parse_from([
            "evaluation-assistant",
            "--syllabus",
            "unit1.pdf",
            "--paper",
            "paper.pdf",
            "a.pdf",
            "--syllabus",
            "unit2.pdf",
            "b.pdf",
        ])
        .unwrap();
        assert_eq!(args.syllabus, vec![PathBuf::from("unit1.pdf"), PathBuf::from("unit2.pdf")]);
        assert_eq!(args.paper, Some(PathBuf::from("paper.pdf")));
        assert_eq!(args.answers, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
        assert!(!args.verbose);
    }

    #[test]
    fn test_answers_are_required() {
        assert!(Args::try_parse_from(["evaluation-assistant", "--paper", "paper.pdf"]).is_err());
        assert!(Args::try_parse_from(["evaluation-assistant", "--syllabus"]).is_err());
    }
}
