//! # Evaluation Assistant
//!
//! 答卷评测助手的客户端编排核心：准备材料、后端处理、分值确认、多答卷进度跟踪与结果查看
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP client），只暴露能力
//! - `ApiExecutor` - 唯一的 client owner，提供 JSON / multipart / 行流请求
//! - `Notifier` - 事件总线（toast、登录失效、答卷失败）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `UploadService` - 上传评分材料与答卷
//! - `paper_normalizer` - 试卷结构规范化与合并（纯函数）
//! - `PaperService` - 触发处理、拉取试卷结构
//! - `progress_stream` - 进度流单行解析
//! - `EvaluationBackend` - 文档解析 / 进度流 / 结果
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"准备一次评测"的规则
//! - `SetupTracker` - 步骤解锁、答卷数量上限、处理状态机
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/progress_coordinator` - 多答卷并发进度流与汇总
//! - `orchestrator/screen_router` - 页面状态机与历史记录
//! - `orchestrator/evaluation_session` - 串起完整流程
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ApiExecutor, AppEvent, Notifier};
pub use models::{FileProgress, PaperConfig, PaperPart, ProgressBoard, Question};
pub use orchestrator::{EvaluationSession, ProgressCoordinator, RunHandle, Screen, ScreenRouter};
pub use services::EvaluationBackend;
pub use workflow::SetupTracker;
