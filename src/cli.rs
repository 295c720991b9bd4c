use crate::backend::VisionBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fuel-vision")]
#[command(about = "燃料計画像のVLMバッチ解析・正解ラベル入力・HTTPサーバ", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 推論バックエンド (openai/command)。省略時は設定ファイルの値
    #[arg(long, global = true)]
    pub backend: Option<VisionBackend>,

    /// ログファイル（stderrに加えて追記）
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// フォルダ内の全画像に質問してJSONを出力
    Run {
        /// 画像フォルダのパス
        #[arg(default_value = "images")]
        folder: PathBuf,

        /// 出力ディレクトリ（results_<timestamp>.json を作成）
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// 質問文（省略時は設定の question）
        #[arg(short, long)]
        question: Option<String>,

        /// 対象拡張子（複数指定可、省略時は設定の extensions）
        #[arg(long = "ext")]
        extensions: Vec<String>,

        /// 進捗バーを表示しない
        #[arg(long)]
        no_progress: bool,
    },

    /// 対話的に正解ラベルを入力
    Label {
        /// 画像フォルダのパス（無ければ作成）
        #[arg(default_value = "images")]
        folder: PathBuf,

        /// ラベルファイル
        #[arg(long, default_value = "ground_truth_labels.json")]
        labels: PathBuf,

        /// 画像ビューアを開かない
        #[arg(long)]
        no_viewer: bool,
    },

    /// HTTPサーバを起動
    Serve {
        /// 待ち受けアドレス
        #[arg(long)]
        host: Option<String>,

        /// 待ち受けポート
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// モデルIDを設定
        #[arg(long)]
        set_model: Option<String>,

        /// エンドポイントURLを設定
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
