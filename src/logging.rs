// ============================================
// src/logging.rs
// ログ出力の初期化（画面は TUI が使うのでファイルに書く）
// ============================================

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "immerse.log";

/// drop されるまでログを書き出し続ける
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// ログディレクトリを作れなければ None（ログなしで続行）
pub fn init_tracing(log_level: &str, log_dir: &Path) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!("failed to create log directory {}: {err}", log_dir.display());
        return None;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Some(FileLogGuard { _guard: guard })
}
