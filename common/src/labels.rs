//! 正解ラベル（画像パス → 燃料量）
//!
//! バッチ結果とは別のスキーマで保存する。JSONはパスをキーにしたオブジェクト。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: BTreeMap<String, f64>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, image_path: &str) -> Option<f64> {
        self.labels.get(image_path).copied()
    }

    pub fn insert(&mut self, image_path: impl Into<String>, value: f64) -> Option<f64> {
        self.labels.insert(image_path.into(), value)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// ラベリング中の1回分の入力
#[derive(Debug, Clone, PartialEq)]
pub enum LabelInput {
    /// 保存して終了
    Quit,
    /// 保存して同じ画像にとどまる
    Save,
    /// この画像をスキップ
    Skip,
    /// 燃料量
    Value(f64),
    /// 数値でもコマンドでもない
    Invalid(String),
}

/// 入力文字列を解釈する
///
/// 前後の空白を除き小文字化したうえで `q` / `s` / 空文字 / 数値（小数点は1つまで）を受け付ける。
pub fn parse_label_input(raw: &str) -> LabelInput {
    let value = raw.trim().to_lowercase();

    match value.as_str() {
        "q" => LabelInput::Quit,
        "s" => LabelInput::Save,
        "" => LabelInput::Skip,
        _ if is_decimal(&value) => match value.parse::<f64>() {
            Ok(v) => LabelInput::Value(v),
            Err(_) => LabelInput::Invalid(value),
        },
        _ => LabelInput::Invalid(value),
    }
}

fn is_decimal(s: &str) -> bool {
    let dots = s.chars().filter(|&c| c == '.').count();
    dots <= 1 && s.chars().any(|c| c.is_ascii_digit()) && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}
