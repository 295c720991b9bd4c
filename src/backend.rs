use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 推論バックエンドの種類
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionBackend {
    /// OpenAI互換の /v1/chat/completions エンドポイント
    #[default]
    #[value(name = "openai")]
    OpenAi,
    /// 外部CLIを画像ごとに起動
    Command,
}

impl VisionBackend {
    pub fn name(&self) -> &'static str {
        match self {
            VisionBackend::OpenAi => "openai",
            VisionBackend::Command => "command",
        }
    }
}

impl std::str::FromStr for VisionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "http" => Ok(VisionBackend::OpenAi),
            "command" | "cli" => Ok(VisionBackend::Command),
            _ => Err(format!("Unknown backend: {}. Use openai or command", s)),
        }
    }
}

impl std::fmt::Display for VisionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
