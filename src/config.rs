use crate::backend::VisionBackend;
use crate::error::{FuelVisionError, Result};
use fuel_vision_common::{GenerationParams, DEFAULT_QUESTION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Qwen2-VL系のプロセッサ既定値（28x28パッチ単位）
pub const DEFAULT_MIN_PIXELS: u32 = 256 * 28 * 28;
pub const DEFAULT_MAX_PIXELS: u32 = 1280 * 28 * 28;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: VisionBackend,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub command: CommandConfig,
    pub question: String,
    pub extensions: Vec<String>,
    pub generation: GenerationParams,
    pub min_pixels: u32,
    pub max_pixels: u32,
    pub timeout_seconds: u64,
    pub server: ServerConfig,
}

/// command バックエンドで起動する外部CLI
///
/// `args` 中の `{prompt}` / `{image}` / `{question}` は画像ごとに置換される。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_concurrent_requests: usize,
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: VisionBackend::OpenAi,
            model: "Qwen/Qwen2-VL-7B-Instruct".into(),
            endpoint: "http://localhost:1234/v1/".into(),
            api_key: None,
            command: CommandConfig::default(),
            question: DEFAULT_QUESTION.into(),
            extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            generation: GenerationParams::default(),
            min_pixels: DEFAULT_MIN_PIXELS,
            max_pixels: DEFAULT_MAX_PIXELS,
            timeout_seconds: 120,
            server: ServerConfig::default(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: "claude".into(),
            args: vec![
                "-p".into(),
                "{prompt}".into(),
                "--output-format".into(),
                "text".into(),
            ],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            max_concurrent_requests: 1,
            body_limit_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    /// 設定ファイル → 環境変数の順に読み込む
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `FUEL_VISION_CONFIG` があればそれを、なければ `~/.config/fuel-vision/config.json`
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("FUEL_VISION_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| FuelVisionError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("fuel-vision").join("config.json"))
    }

    /// 環境変数で上書き（`.env` は呼び出し前に読み込み済みであること）
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("FUEL_VISION_BACKEND") {
            self.backend = backend.parse().map_err(FuelVisionError::Config)?;
        }
        if let Some(model) = lookup("FUEL_VISION_MODEL") {
            self.model = model;
        }
        if let Some(endpoint) = lookup("FUEL_VISION_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(key) = lookup("FUEL_VISION_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(question) = lookup("FUEL_VISION_QUESTION") {
            self.question = question;
        }
        if let Some(exts) = lookup("FUEL_VISION_EXTENSIONS") {
            self.extensions = exts
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(v) = lookup("FUEL_VISION_MIN_PIXELS") {
            self.min_pixels = parse_number("FUEL_VISION_MIN_PIXELS", &v)?;
        }
        if let Some(v) = lookup("FUEL_VISION_MAX_PIXELS") {
            self.max_pixels = parse_number("FUEL_VISION_MAX_PIXELS", &v)?;
        }
        if let Some(v) = lookup("FUEL_VISION_MAX_TOKENS") {
            self.generation.max_output_length = parse_number("FUEL_VISION_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("FUEL_VISION_TIMEOUT") {
            self.timeout_seconds = parse_number("FUEL_VISION_TIMEOUT", &v)?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_pixels > self.max_pixels {
            return Err(FuelVisionError::Config(format!(
                "min_pixels ({}) が max_pixels ({}) を超えています",
                self.min_pixels, self.max_pixels
            )));
        }
        if self.extensions.is_empty() {
            return Err(FuelVisionError::Config("対象拡張子が空です".into()));
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(FuelVisionError::Config("server.max_concurrent_requests は1以上".into()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FuelVisionError::Config(format!("{} の値が数値ではありません: {}", key, value)))
}
