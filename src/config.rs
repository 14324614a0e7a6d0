// ============================================
// src/config.rs
// コマンドライン引数と設定
// ============================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::gemini::{DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};

#[derive(Debug, Parser)]
#[command(name = "immerse", version, about = "Learn English words by association, right in your terminal.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Gemini API キー（未設定なら API_KEY も見る）
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// カード生成に使うモデル
    #[arg(long, default_value = DEFAULT_TEXT_MODEL)]
    pub text_model: String,

    /// イラスト生成に使うモデル
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// イラスト生成をしない
    #[arg(long)]
    pub no_images: bool,

    /// 選択肢を並べ替えない（モデルが返した順で出す）
    #[arg(long)]
    pub no_shuffle: bool,

    /// 指定した問題数で終了する
    #[arg(long)]
    pub rounds: Option<u32>,

    /// スコアとログの保存先
    #[arg(long, env = "IMMERSE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// ログレベル（tracing の EnvFilter 形式）
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// カードで遊ぶ（既定）
    Play,
    /// 現在のスコアとストリークを表示する
    Stats,
    /// スコアとストリークをリセットする
    Reset {
        /// 確認なしでリセットする
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Play)
    }

    /// API キー（--api-key / GEMINI_API_KEY / API_KEY の順）
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn image_model(&self) -> Option<String> {
        (!self.no_images).then(|| self.image_model.clone())
    }

    // MARK:保存先ディレクトリを決める
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Some(proj_dirs) = ProjectDirs::from("jp", "Fukumoto0141", "IMMERSE") {
            return proj_dirs.data_dir().to_path_buf();
        }
        // 取得できなかったらカレントディレクトリに（フォールバック）
        PathBuf::from(".immerse")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}
