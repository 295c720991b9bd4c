//! 質問文の定義

/// バッチ実行で全画像に投げる既定の質問
pub const DEFAULT_QUESTION: &str = "How many gallons of fuel was consumed?";
