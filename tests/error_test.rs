//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use fuel_vision::error::{FuelVisionError, InferenceError};
use fuel_vision::scanner::{ImageSource, MissingDirPolicy};
use std::path::Path;
use tempfile::tempdir;

/// 存在しないフォルダをスキャンした場合
#[test]
fn test_scan_nonexistent_folder() {
    let result = ImageSource::default().list(Path::new("/nonexistent/path/12345"));
    assert!(matches!(result, Err(FuelVisionError::DirectoryNotFound(_))));
}

/// 空のフォルダはエラーではなく空のVec
#[test]
fn test_scan_empty_folder() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = ImageSource::default().list(dir.path());
    assert!(result.unwrap().is_empty());
}

/// Create ポリシーでは作成して空を返す
#[test]
fn test_scan_creates_folder() {
    let dir = tempdir().expect("Failed to create temp dir");
    let target = dir.path().join("images");

    let source = ImageSource::default().with_missing_dir(MissingDirPolicy::Create);
    assert!(source.list(&target).unwrap().is_empty());
    assert!(target.exists());
}

#[test]
fn test_error_display() {
    let errors = vec![
        FuelVisionError::Config("テスト設定エラー".to_string()),
        FuelVisionError::DirectoryNotFound("/path/to/folder".to_string()),
        FuelVisionError::DirectoryEmpty("images".to_string()),
        FuelVisionError::InvalidImage("bad header".to_string()),
        FuelVisionError::CliExecution("interrupted".to_string()),
        FuelVisionError::Persistence {
            path: "results.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        },
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

#[test]
fn test_persistence_keeps_path_and_source() {
    let err = FuelVisionError::Persistence {
        path: "/readonly/results.json".into(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    };
    let display = format!("{}", err);
    assert!(display.contains("/readonly/results.json"));
    assert!(std::error::Error::source(&err).is_some());
}

/// 推論エラーはメッセージだけを表示する（結果ファイルに記録される文字列）
#[test]
fn test_inference_error_message() {
    let err = InferenceError::new("decode error");
    assert_eq!(err.to_string(), "decode error");
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: FuelVisionError = io_err.into();
    assert!(matches!(err, FuelVisionError::Io(_)));
    assert!(format!("{}", err).contains("IO"));
}

#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: FuelVisionError = json_err.into();
    assert!(matches!(err, FuelVisionError::JsonParse(_)));
}

/// common::Errorは透過的に表示される
#[test]
fn test_common_error_transparent() {
    let common_err = fuel_vision_common::Error::Parse("パースエラー".to_string());
    let err: FuelVisionError = common_err.into();

    assert!(matches!(err, FuelVisionError::Common(_)));
    assert!(format!("{}", err).contains("パースエラー"));
}
