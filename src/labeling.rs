//! 対話式の正解ラベル入力
//!
//! 画像をビューアで開き、燃料量を1枚ずつ入力して `ground_truth_labels.json` に保存する。
//! 保存時は最新版とタイムスタンプ付きスナップショットの両方を書く。

use crate::error::{FuelVisionError, Result};
use chrono::Local;
use dialoguer::Input;
use fuel_vision_common::{format_stamp, parse_label_input, LabelInput, LabelSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard};

/// ラベルファイルの置き場所
#[derive(Debug, Clone)]
pub struct LabelStore {
    current: PathBuf,
}

impl LabelStore {
    pub fn new(current: impl Into<PathBuf>) -> Self {
        Self {
            current: current.into(),
        }
    }

    pub fn current_path(&self) -> &Path {
        &self.current
    }

    /// 既存ラベルを読み込む。無い・壊れている場合は空
    pub fn load(&self) -> LabelSet {
        if !self.current.exists() {
            return LabelSet::new();
        }

        let loaded = std::fs::read_to_string(&self.current)
            .map_err(FuelVisionError::from)
            .and_then(|s| LabelSet::from_json(&s).map_err(FuelVisionError::from));

        match loaded {
            Ok(labels) => {
                tracing::info!("Loaded {} existing labels", labels.len());
                labels
            }
            Err(e) => {
                tracing::error!("Error loading labels: {}", e);
                LabelSet::new()
            }
        }
    }

    /// 最新版とスナップショットを書き込み、スナップショットのパスを返す
    pub fn save(&self, labels: &LabelSet) -> Result<PathBuf> {
        let json = labels.to_json()?;
        let snapshot = self.snapshot_path();

        for path in [&self.current, &snapshot] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| FuelVisionError::Persistence {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(path, &json).map_err(|source| FuelVisionError::Persistence {
                path: path.clone(),
                source,
            })?;
        }

        tracing::info!("Labels saved to {}", snapshot.display());
        Ok(snapshot)
    }

    fn snapshot_path(&self) -> PathBuf {
        let stem = self
            .current
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "ground_truth_labels".into());
        let name = format!("{}_{}.json", stem, format_stamp(&Local::now()));
        self.current.with_file_name(name)
    }
}

/// 入力の取得。`Err` は中断（Ctrl-C / EOF）
pub trait LabelPrompt {
    fn ask(&mut self, prompt: &str) -> std::io::Result<String>;
}

/// 画像の表示
pub trait ImageViewer {
    fn show(&self, path: &Path) -> bool;
}

pub struct TerminalPrompt;

impl LabelPrompt for TerminalPrompt {
    fn ask(&mut self, prompt: &str) -> std::io::Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))
    }
}

/// OS既定のビューアで開く
pub struct SystemViewer;

impl ImageViewer for SystemViewer {
    fn show(&self, path: &Path) -> bool {
        let abs_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        #[cfg(windows)]
        let status = Command::new("cmd")
            .args(["/c", "start", ""])
            .arg(&abs_path)
            .status();

        #[cfg(target_os = "macos")]
        let status = Command::new("open").arg(&abs_path).status();

        #[cfg(all(unix, not(target_os = "macos")))]
        let status = Command::new("xdg-open").arg(&abs_path).status();

        match status {
            Ok(s) if s.success() => true,
            Ok(s) => {
                tracing::error!("Error showing image {}: exit {:?}", abs_path.display(), s.code());
                false
            }
            Err(e) => {
                tracing::error!("Error showing image {}: {}", abs_path.display(), e);
                false
            }
        }
    }
}

/// 表示しない（`--no-viewer`）
pub struct NoViewer;

impl ImageViewer for NoViewer {
    fn show(&self, _path: &Path) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelSummary {
    pub labeled: usize,
    pub snapshot: PathBuf,
    pub quit_early: bool,
}

pub struct LabelSession {
    images: Vec<PathBuf>,
    labels: Arc<Mutex<LabelSet>>,
    store: LabelStore,
}

impl LabelSession {
    /// 画像が無ければ DirectoryEmpty
    pub fn new(folder: &Path, images: Vec<PathBuf>, store: LabelStore) -> Result<Self> {
        if images.is_empty() {
            return Err(FuelVisionError::DirectoryEmpty(folder.display().to_string()));
        }

        let labels = store.load();
        Ok(Self {
            images,
            labels: Arc::new(Mutex::new(labels)),
            store,
        })
    }

    pub fn store(&self) -> &LabelStore {
        &self.store
    }

    /// シグナルハンドラから保存するための共有ハンドル
    pub fn labels_handle(&self) -> Arc<Mutex<LabelSet>> {
        Arc::clone(&self.labels)
    }

    pub fn labels(&self) -> LabelSet {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, LabelSet> {
        lock_labels(&self.labels)
    }

    fn save(&self) -> Result<PathBuf> {
        let labels = self.lock().clone();
        self.store.save(&labels)
    }

    pub fn run(&self, prompt: &mut dyn LabelPrompt, viewer: &dyn ImageViewer) -> Result<LabelSummary> {
        println!("\n画像ラベリング");
        println!("------------------");
        println!("Ctrl+C でいつでも保存して終了");
        println!("q: 保存して終了 / s: 途中保存 / Enter: スキップ\n");

        let total = self.images.len();
        let mut index = 0;
        let mut quit_early = false;

        while index < total {
            let image_path = &self.images[index];
            let key = image_path.display().to_string();
            let file_name = image_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| key.clone());

            println!("\n[{}/{}] {}", index + 1, total, file_name);

            if let Some(current) = self.lock().get(&key) {
                println!("  現在のラベル: {}", current);
            }

            if !viewer.show(image_path) {
                println!("  画像を表示できません、スキップ");
                index += 1;
                continue;
            }

            let input = match prompt.ask("燃料量 (q:終了 s:保存)") {
                Ok(input) => input,
                Err(e) => {
                    tracing::error!("Error during labeling: {}", e);
                    self.save()?;
                    return Err(FuelVisionError::CliExecution(e.to_string()));
                }
            };

            match parse_label_input(&input) {
                LabelInput::Quit => {
                    quit_early = true;
                    break;
                }
                LabelInput::Save => {
                    if let Err(e) = self.save() {
                        tracing::error!("Error saving labels: {}", e);
                    }
                    continue;
                }
                LabelInput::Skip => println!("  → スキップ"),
                LabelInput::Value(v) => {
                    self.lock().insert(key.clone(), v);
                    tracing::info!("{} = {}", key, v);
                    println!("  → {}", v);
                }
                LabelInput::Invalid(raw) => {
                    println!("  数値かコマンドを入力してください: {}", raw);
                    continue;
                }
            }

            index += 1;
        }

        let snapshot = self.save()?;
        let labeled = self.lock().len();

        println!("\n✔ ラベリング完了: {}枚", labeled);

        Ok(LabelSummary {
            labeled,
            snapshot,
            quit_early,
        })
    }
}

/// 毒化していてもラベル自体は有効なので中身を使う
pub fn lock_labels(labels: &Mutex<LabelSet>) -> MutexGuard<'_, LabelSet> {
    labels.lock().unwrap_or_else(|e| e.into_inner())
}
