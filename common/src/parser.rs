//! モデル応答のパーサー

/// チャットテンプレートの残骸を取り除いて回答本文だけを返す
///
/// デコード結果にプロンプトごと含まれる場合があるため、
/// `Assistant:` / `assistant\n` マーカーがあればその後ろだけを採用する。
///
/// # Examples
/// ```
/// use fuel_vision_common::extract_answer;
///
/// assert_eq!(extract_answer("User: how much?\nAssistant: 12 gallons"), "12 gallons");
/// assert_eq!(extract_answer("  12 gallons \n"), "12 gallons");
/// ```
pub fn extract_answer(response: &str) -> &str {
    const MARKERS: &[&str] = &["Assistant:", "assistant\n"];

    for marker in MARKERS {
        if let Some(pos) = response.find(marker) {
            return response[pos + marker.len()..].trim();
        }
    }

    response.trim()
}
