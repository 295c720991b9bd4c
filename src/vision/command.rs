//! 外部CLI連携バックエンド
//!
//! 画像を一時ファイルに書き出し、`claude -p "<prompt>"` のようなCLIを1枚ごとに起動して
//! 標準出力を回答として受け取る。

use super::{InferenceResult, ServiceInfo, VisionQueryService};
use crate::config::{CommandConfig, Config};
use crate::error::InferenceError;
use async_trait::async_trait;
use fuel_vision_common::extract_answer;
use std::io::Write;
use std::path::Path;
use tokio::process::Command;

pub struct CommandVisionService {
    program: String,
    args: Vec<String>,
    model: String,
}

impl CommandVisionService {
    pub fn new(command: &CommandConfig, model: impl Into<String>) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.command, config.model.clone())
    }

    fn render_args(&self, image_path: &Path, question: &str) -> Vec<String> {
        let image = image_path.display().to_string().replace('\\', "/");
        let prompt = format!(
            "Read the following image file and answer the question: {}\n\n{}",
            image, question
        );

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{prompt}", &prompt)
                    .replace("{image}", &image)
                    .replace("{question}", question)
            })
            .collect()
    }
}

#[async_trait]
impl VisionQueryService for CommandVisionService {
    async fn ask(&self, image: &[u8], question: &str) -> InferenceResult<String> {
        // 一時ファイルはスコープを抜けると削除される
        let mut temp = tempfile::Builder::new()
            .prefix("fuel-vision-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| InferenceError::new(format!("一時ファイル作成エラー: {}", e)))?;
        temp.write_all(image)
            .and_then(|_| temp.flush())
            .map_err(|e| InferenceError::new(format!("一時ファイル書き込みエラー: {}", e)))?;

        let args = self.render_args(temp.path(), question);

        // Windowsではcmd /c経由
        #[cfg(windows)]
        let output = Command::new("cmd")
            .arg("/c")
            .arg(&self.program)
            .args(&args)
            .output()
            .await;

        #[cfg(not(windows))]
        let output = Command::new(&self.program).args(&args).output().await;

        let output = output
            .map_err(|e| InferenceError::new(format!("{} の実行エラー: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InferenceError::new(format!(
                "{} failed (code {:?}): {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let answer = extract_answer(&stdout);
        if answer.is_empty() {
            return Err(InferenceError::new("モデルの回答が空です"));
        }

        Ok(answer.to_string())
    }

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            backend: "command".into(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(program: &str, args: &[&str]) -> CommandVisionService {
        let command = CommandConfig {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        };
        CommandVisionService::new(&command, "test-model")
    }

    #[test]
    fn test_render_args_placeholders() {
        let svc = service("claude", &["-p", "{prompt}", "--image={image}", "{question}"]);
        let args = svc.render_args(Path::new("/tmp/x.png"), "How many?");

        assert_eq!(args[0], "-p");
        assert!(args[1].contains("/tmp/x.png"));
        assert!(args[1].ends_with("How many?"));
        assert_eq!(args[2], "--image=/tmp/x.png");
        assert_eq!(args[3], "How many?");
    }

    /// 既定の設定では `claude -p "<指示> <画像パス>\n\n<質問>" --output-format text`
    #[test]
    fn test_default_command_line() {
        let svc = CommandVisionService::new(&CommandConfig::default(), "test-model");
        let args = svc.render_args(Path::new("/tmp/x.png"), "How many gallons?");

        assert_eq!(svc.program, "claude");
        assert_eq!(
            args,
            vec![
                "-p".to_string(),
                "Read the following image file and answer the question: /tmp/x.png\n\nHow many gallons?"
                    .to_string(),
                "--output-format".to_string(),
                "text".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ask_returns_stdout() {
        let svc = service("sh", &["-c", "echo \"Assistant: 14 gallons\"", "{image}"]);
        let answer = svc.ask(b"bytes", "How many?").await.unwrap();
        assert_eq!(answer, "14 gallons");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ask_sees_image_file() {
        let svc = service("sh", &["-c", "wc -c < \"$0\"", "{image}"]);
        let answer = svc.ask(b"12345", "q").await.unwrap();
        assert_eq!(answer, "5");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ask_failure_carries_stderr() {
        let svc = service("sh", &["-c", "echo decode error >&2; exit 3"]);
        let err = svc.ask(b"bytes", "q").await.unwrap_err();
        assert!(err.cause.contains("decode error"));
        assert!(err.cause.contains("3"));
    }

    #[tokio::test]
    async fn test_ask_missing_program() {
        let svc = service("fuel-vision-no-such-binary", &[]);
        assert!(svc.ask(b"bytes", "q").await.is_err());
    }
}
