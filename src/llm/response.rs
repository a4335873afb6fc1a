// モデル応答テキストの後処理
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::ModelError;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?\s*").unwrap());
// 改行・タブ以外の制御文字
static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").unwrap());

/// コードフェンスと制御文字を取り除く
pub fn clean_json_text(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = CONTROL_CHARS.replace_all(&text, "");
    escape_raw_newlines(text.trim())
}

/// 文字列リテラル内の生の改行・タブをエスケープする
fn escape_raw_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}

/// 応答テキストを JSON 値として読む
pub fn parse_json(text: &str) -> Result<Value, ModelError> {
    let cleaned = clean_json_text(text);
    if cleaned.is_empty() {
        return Err(ModelError::Malformed("空の応答".to_string()));
    }
    Ok(serde_json::from_str(&cleaned)?)
}

/// 生成応答から問題オブジェクトの配列を取り出す
///
/// 配列ならそのまま。オブジェクトの場合はレベル名のキー ({"N5": [...]}) を優先し、
/// なければ配列値をすべて連結する。
pub fn extract_items(value: Value, level: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(level) {
                return items;
            }
            map.into_iter()
                .filter_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .flatten()
                .collect()
        }
        _ => Vec::new(),
    }
}
