//! 入力画像の列挙
//!
//! フォルダ直下のみを対象にし（再帰しない）、拡張子は大文字小文字を区別して照合する。

use crate::error::{FuelVisionError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// フォルダが存在しないときの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingDirPolicy {
    /// DirectoryNotFound を返す
    #[default]
    Fail,
    /// フォルダを作成して空の一覧を返す
    Create,
}

#[derive(Debug, Clone)]
pub struct ImageSource {
    extensions: Vec<String>,
    missing_dir: MissingDirPolicy,
}

impl ImageSource {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_string())
                .collect(),
            missing_dir: MissingDirPolicy::Fail,
        }
    }

    pub fn with_missing_dir(mut self, policy: MissingDirPolicy) -> Self {
        self.missing_dir = policy;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// 対象画像をパスの辞書順で返す
    pub fn list(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        if !folder.is_dir() {
            match self.missing_dir {
                MissingDirPolicy::Fail => {
                    return Err(FuelVisionError::DirectoryNotFound(folder.display().to_string()));
                }
                MissingDirPolicy::Create => {
                    tracing::info!("画像フォルダを作成: {}", folder.display());
                    std::fs::create_dir_all(folder)?;
                    return Ok(Vec::new());
                }
            }
        }

        let mut images = Vec::new();
        let walker = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1);  // 直下のみ（再帰しない）

        // 読めないフォルダを空扱いにしない
        for entry in walker {
            let entry = entry.map_err(|e| FuelVisionError::Io(e.into()))?;
            let is_file = entry.file_type().is_file()
                || (entry.file_type().is_symlink() && entry.path().is_file());
            if is_file && self.accepts(entry.path()) {
                images.push(entry.into_path());
            }
        }

        images.sort();

        Ok(images)
    }
}

impl Default for ImageSource {
    fn default() -> Self {
        Self::new(["png", "jpg", "jpeg"])
    }
}
