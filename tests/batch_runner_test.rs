//! バッチ実行テスト
//!
//! 1枚の失敗がバッチを止めないこと、件数の整合、結果ファイルの形を検証

use async_trait::async_trait;
use fuel_vision::error::InferenceError;
use fuel_vision::report::{load_report, ReportWriter};
use fuel_vision::runner::BatchRunner;
use fuel_vision::scanner::ImageSource;
use fuel_vision::vision::{InferenceResult, ServiceInfo, VisionQueryService};
use fuel_vision_common::QueryStatus;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

/// 画像の中身（テストではファイル名を書いておく）で失敗を決めるフェイク
struct ScriptedService {
    fail_on: HashSet<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    cancel_after_first: Option<CancellationToken>,
}

impl ScriptedService {
    fn new(fail_on: &[&str]) -> Self {
        Self {
            fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            cancel_after_first: None,
        }
    }
}

#[async_trait]
impl VisionQueryService for ScriptedService {
    async fn ask(&self, image: &[u8], _question: &str) -> InferenceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = String::from_utf8_lossy(image).to_string();
        self.seen.lock().unwrap().push(name.clone());

        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }

        if self.fail_on.contains(&name) {
            Err(InferenceError::new("decode error"))
        } else {
            Ok(format!("{} gallons", name.len()))
        }
    }

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            backend: "scripted".into(),
            model: "none".into(),
        }
    }
}

fn write_images(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }
}

/// a/b/c のうち b だけ失敗
#[tokio::test]
async fn test_single_failure_is_isolated() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_images(dir.path(), &["a.png", "b.png", "c.png"]);

    let service = Arc::new(ScriptedService::new(&["b.png"]));
    let mut runner = BatchRunner::new(ImageSource::default(), service.clone(), "How much fuel?");
    let report = runner.run(dir.path()).await.expect("バッチは最後まで完了する");

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);

    let b = &report.results()[1];
    assert_eq!(b.image_path(), dir.path().join("b.png").display().to_string());
    assert_eq!(b.answer(), None);
    assert_eq!(b.status(), QueryStatus::Error);
    assert_eq!(b.error_message(), Some("decode error"));

    assert_eq!(report.results()[0].status(), QueryStatus::Success);
    assert_eq!(report.results()[2].status(), QueryStatus::Success);
    assert_eq!(service.calls.load(Ordering::SeqCst), 3);
}

/// 失敗位置の集合と結果の error 位置が一致する
#[tokio::test]
async fn test_failures_match_positions() {
    let dir = tempdir().expect("Failed to create temp dir");
    let names = ["01.png", "02.jpg", "03.jpeg", "04.png", "05.png", "06.jpg"];
    write_images(dir.path(), &names);

    let service = Arc::new(ScriptedService::new(&["01.png", "04.png", "06.jpg"]));
    let mut runner = BatchRunner::new(ImageSource::default(), service, "q");
    let report = runner.run(dir.path()).await.unwrap();

    let failed: Vec<usize> = report
        .results()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status() == QueryStatus::Error)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(failed, vec![0, 3, 5]);
    assert_eq!(report.total(), report.succeeded() + report.failed());
    assert_eq!(report.total(), report.results().len());
}

#[tokio::test]
async fn test_all_success() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_images(dir.path(), &["x.png", "y.jpg", "z.jpeg"]);

    let mut runner = BatchRunner::new(ImageSource::default(), Arc::new(ScriptedService::new(&[])), "q");
    let report = runner.run(dir.path()).await.unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.failed(), 0);
    assert!(report
        .results()
        .iter()
        .all(|r| r.answer().is_some_and(|a| !a.is_empty())));
}

/// 空フォルダではサービスを呼ばない
#[tokio::test]
async fn test_empty_folder_does_not_call_service() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("readme.txt"), "not an image").unwrap();

    let service = Arc::new(ScriptedService::new(&[]));
    let mut runner = BatchRunner::new(ImageSource::default(), service.clone(), "q");
    let report = runner.run(dir.path()).await.unwrap();

    assert_eq!((report.total(), report.succeeded(), report.failed()), (0, 0, 0));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

/// 処理順は一覧の順（パスの辞書順）
#[tokio::test]
async fn test_processing_order() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_images(dir.path(), &["c.png", "a.png", "b.png"]);

    let service = Arc::new(ScriptedService::new(&[]));
    let mut runner = BatchRunner::new(ImageSource::default(), service.clone(), "q");
    runner.run(dir.path()).await.unwrap();

    assert_eq!(*service.seen.lock().unwrap(), vec!["a.png", "b.png", "c.png"]);
}

#[test]
fn test_listing_is_idempotent() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_images(dir.path(), &["b.png", "a.jpg", "c.jpeg"]);

    let source = ImageSource::default();
    let first = source.list(dir.path()).unwrap();
    let second = source.list(dir.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

/// 推論中にキャンセルされても、その画像は最後まで処理して次で止まる
#[tokio::test]
async fn test_cancel_between_items() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_images(dir.path(), &["a.png", "b.png", "c.png"]);

    let cancel = CancellationToken::new();
    let mut service = ScriptedService::new(&[]);
    service.cancel_after_first = Some(cancel.clone());
    let service = Arc::new(service);

    let mut runner = BatchRunner::new(ImageSource::default(), service.clone(), "q")
        .with_cancellation(cancel);
    let report = runner.run(dir.path()).await.unwrap();

    assert_eq!(report.total(), 1);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
}

/// 実行 → 保存 → 読み込み
#[tokio::test]
async fn test_report_written_and_reloaded() {
    let images = tempdir().expect("Failed to create temp dir");
    let out = tempdir().expect("Failed to create temp dir");
    write_images(images.path(), &["a.png", "b.png", "c.png"]);

    let mut runner = BatchRunner::new(ImageSource::default(), Arc::new(ScriptedService::new(&["b.png"])), "q");
    let report = runner.run(images.path()).await.unwrap();

    let path = ReportWriter::new(out.path()).write(&report).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let entries = raw.as_array().expect("結果ファイルは配列");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1]["result"], serde_json::Value::Null);
    assert_eq!(entries[1]["status"], "error");
    assert_eq!(entries[1]["error_message"], "decode error");
    assert_eq!(entries[0]["status"], "success");
    assert!(entries[0].get("error_message").is_none());

    let loaded = load_report(&path).unwrap();
    assert_eq!(loaded.results(), report.results());
    assert_eq!(loaded.failed(), 1);
}
