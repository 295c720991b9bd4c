//! バッチ実行
//!
//! 1つの質問をフォルダ内の全画像に順番に投げる。1枚の失敗はその画像の結果として記録し、
//! 残りの処理は続ける。致命的なのは画像の列挙に失敗した場合だけ。

use crate::error::Result;
use crate::scanner::ImageSource;
use crate::vision::SharedVisionService;
use chrono::Local;
use fuel_vision_common::{BatchReport, ImageRecord, QueryResult};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct BatchRunner {
    source: ImageSource,
    service: SharedVisionService,
    question: String,
    cancel: CancellationToken,
    progress: bool,
    records: Vec<ImageRecord>,
}

impl BatchRunner {
    pub fn new(source: ImageSource, service: SharedVisionService, question: impl Into<String>) -> Self {
        Self {
            source,
            service,
            question: question.into(),
            cancel: CancellationToken::new(),
            progress: false,
            records: Vec::new(),
        }
    }

    /// 画像と画像の間で確認されるキャンセルトークン（推論中には割り込まない）
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 進捗バーを表示する
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// 直前の実行で列挙された画像と最終状態
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub async fn run(&mut self, folder: &Path) -> Result<BatchReport> {
        let images = self.source.list(folder)?;
        tracing::info!("{}枚の画像を検出: {}", images.len(), folder.display());

        self.records = images
            .iter()
            .map(|p| ImageRecord::new(p.display().to_string()))
            .collect();

        if images.is_empty() {
            return Ok(BatchReport::empty(Local::now()));
        }

        let bar = self.progress_bar(images.len() as u64);
        let mut results = Vec::with_capacity(images.len());

        for (i, path) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("cancelled: {}/{}枚で中断", i, images.len());
                break;
            }

            let image_path = path.display().to_string();
            bar.set_message(image_path.clone());
            tracing::info!("Processing image {}/{}: {}", i + 1, images.len(), image_path);

            let result = match tokio::fs::read(path).await {
                Ok(bytes) => match self.service.ask(&bytes, &self.question).await {
                    Ok(answer) => QueryResult::success(&image_path, answer),
                    Err(e) => QueryResult::error(&image_path, e.to_string()),
                },
                Err(e) => QueryResult::error(&image_path, format!("画像を読み込めません: {}", e)),
            };

            if let Some(message) = result.error_message() {
                tracing::warn!("{}: {}", image_path, message);
            }

            self.records[i].complete(result.status());
            results.push(result);
            bar.inc(1);
        }

        bar.finish_and_clear();

        Ok(BatchReport::new(results, Local::now()))
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
            bar.set_style(style);
        }
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FuelVisionError, InferenceError};
    use crate::vision::{InferenceResult, ServiceInfo, VisionQueryService};
    use async_trait::async_trait;
    use fuel_vision_common::{ItemStatus, QueryStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// ファイル内容が "bad" のときだけ失敗する
    struct FakeService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionQueryService for FakeService {
        async fn ask(&self, image: &[u8], question: &str) -> InferenceResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if image == b"bad" {
                return Err(InferenceError::new("decode error"));
            }
            Ok(format!("{} -> {}", question, String::from_utf8_lossy(image)))
        }

        fn info(&self) -> ServiceInfo {
            ServiceInfo { backend: "fake".into(), model: "fake".into() }
        }
    }

    fn fake() -> Arc<FakeService> {
        Arc::new(FakeService { calls: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn test_records_track_outcome() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"ok").unwrap();
        std::fs::write(dir.path().join("b.png"), b"bad").unwrap();

        let mut runner = BatchRunner::new(ImageSource::default(), fake(), "q");
        let report = runner.run(dir.path()).await.unwrap();

        assert_eq!(report.total(), 2);
        let statuses: Vec<_> = runner.records().iter().map(|r| r.status()).collect();
        assert_eq!(statuses, vec![ItemStatus::Success, ItemStatus::Error]);
    }

    #[tokio::test]
    async fn test_cancel_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"ok").unwrap();

        let service = fake();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut runner = BatchRunner::new(ImageSource::default(), service.clone(), "q")
            .with_cancellation(cancel);
        let report = runner.run(dir.path()).await.unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.records()[0].status(), ItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_folder_is_fatal() {
        let mut runner = BatchRunner::new(ImageSource::default(), fake(), "q");
        let result = runner.run(Path::new("/nonexistent/images")).await;
        assert!(matches!(result, Err(FuelVisionError::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_question_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"gauge").unwrap();

        let mut runner = BatchRunner::new(ImageSource::default(), fake(), "How much fuel?");
        let report = runner.run(dir.path()).await.unwrap();

        assert_eq!(report.results()[0].answer(), Some("How much fuel? -> gauge"));
        assert_eq!(report.results()[0].status(), QueryStatus::Success);
    }
}
