// 問題レコードのスキーマ定義
//
// AIが生成した下書きも、題庫に保存済みのレコードも同じ構造体で扱う。
// 欠けたフィールドや型の揺れはデシリアライズ時に一度だけ吸収し、
// 使う側では既定値を気にしなくてよいようにする。

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

// インラインのマークアップ (<ruby> など)
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// 問題カテゴリ
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[default]
    Vocabulary,
    Grammar,
    Reading,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Vocabulary, Category::Grammar, Category::Reading];

    /// 生成AIが返すラベルを解釈する (未知のラベルは語彙扱い)
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.contains("reading") || label.contains("讀解") || label.contains("読解") {
            Category::Reading
        } else if label.contains("grammar") || label.contains("文法") {
            Category::Grammar
        } else {
            Category::Vocabulary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vocabulary => "vocabulary",
            Category::Grammar => "grammar",
            Category::Reading => "reading",
        }
    }

    /// ID に埋め込む表示名
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Vocabulary => "語彙",
            Category::Grammar => "文法",
            Category::Reading => "讀解",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Category::from_label).unwrap_or_default())
    }
}

/// 生成時のメタデータ (欠けたキーは空文字)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub generated_at: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub batch: String,
}

/// JLPT 四択問題
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 例: `N5-文法-v01-09`。未採用の候補は None
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub category: Category,
    /// 問題文 (読解は本文+設問)
    #[serde(rename = "question", default, deserialize_with = "lenient_string")]
    pub prompt: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub options: Vec<String>,
    /// 正解の 0 始まりインデックス。解釈できない値は None
    #[serde(default, deserialize_with = "lenient_answer", skip_serializing_if = "Option::is_none")]
    pub answer: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub explanation: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub tags: Vec<String>,
    /// オブジェクト以外は None
    #[serde(default, deserialize_with = "lenient_metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GenerationMetadata>,
    /// review コマンドで確認済みかどうか (true 以外は未確認)
    #[serde(default, deserialize_with = "lenient_flag", skip_serializing_if = "is_false")]
    pub verified: bool,
    /// type や section など、そのまま保存し直すフィールド
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Question {
    /// JSON 値から 1 問を読む
    ///
    /// category がない古いレコードは section ("N5-讀解" など) からカテゴリを決める。
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(map) = &mut value {
            let has_category = map.get("category").is_some_and(Value::is_string);
            let section = map.get("section").and_then(Value::as_str).map(Category::from_label);
            if let Some(category) = section.filter(|_| !has_category) {
                map.insert("category".to_string(), Value::String(category.as_str().to_string()));
            }
        }
        serde_json::from_value(value)
    }

    /// 旧形式の section ("N5-文法" など)
    pub fn section(&self) -> Option<&str> {
        self.extra.get("section").and_then(Value::as_str)
    }

    /// 正解インデックスが選択肢の範囲内ならそれを返す
    pub fn answer_index(&self) -> Option<usize> {
        let idx = usize::try_from(self.answer?).ok()?;
        (idx < self.options.len()).then_some(idx)
    }

    /// 正解の選択肢テキスト
    pub fn correct_option(&self) -> Option<&str> {
        self.answer_index().map(|idx| self.options[idx].as_str())
    }

    /// マークアップを除いた問題文
    pub fn plain_prompt(&self) -> String {
        strip_markup(&self.prompt)
    }

    pub fn id_or_placeholder(&self) -> &str {
        self.id.as_deref().unwrap_or("(ID なし)")
    }
}

/// `<...>` 形式のタグを取り除き、前後の空白を削る
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").trim().to_string()
}

/// 先頭 n 文字 (ログ表示用)
pub fn preview(text: &str, n: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(n).collect();
    if chars.next().is_some() { format!("{}...", head) } else { head }
}

fn is_false(value: &bool) -> bool {
    !*value
}

pub(crate) fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(value))
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().map(value_to_string).collect(),
        _ => Vec::new(),
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_bool().unwrap_or(false))
}

fn lenient_metadata<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<GenerationMetadata>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

fn lenient_answer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_index(&value))
}

/// 整数、または数字だけの文字列をインデックスとして解釈する
pub(crate) fn parse_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_prefix('-').unwrap_or(s);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_labels_are_resolved_once() {
        assert_eq!(Category::from_label("Reading"), Category::Reading);
        assert_eq!(Category::from_label("N5-讀解"), Category::Reading);
        assert_eq!(Category::from_label("読解"), Category::Reading);
        assert_eq!(Category::from_label("grammar"), Category::Grammar);
        assert_eq!(Category::from_label("N4-文法"), Category::Grammar);
        assert_eq!(Category::from_label("kanji"), Category::Vocabulary);
    }

    #[test]
    fn defaults_are_filled_at_parse_time() {
        let q: Question = serde_json::from_value(json!({
            "question": "「水」の読み方はどれですか。",
            "answer": "2",
            "options": ["みず", "みち", "みせ", "みみ"]
        }))
        .unwrap();

        assert_eq!(q.id, None);
        assert_eq!(q.category, Category::Vocabulary);
        assert_eq!(q.answer, Some(2));
        assert_eq!(q.correct_option(), Some("みせ"));
        assert!(q.tags.is_empty());
        assert!(!q.verified);
    }

    #[test]
    fn numeric_ids_and_bad_answers_are_tolerated() {
        let q: Question = serde_json::from_value(json!({
            "id": 12,
            "category": null,
            "answer": "two",
            "options": "not a list"
        }))
        .unwrap();

        assert_eq!(q.id.as_deref(), Some("12"));
        assert_eq!(q.category, Category::Vocabulary);
        assert_eq!(q.answer, None);
        assert!(q.options.is_empty());
        assert_eq!(q.correct_option(), None);
    }

    #[test]
    fn unknown_fields_survive_a_rewrite() {
        let raw = json!({
            "id": "N5-文法-v01-01",
            "category": "grammar",
            "type": "star_ordering",
            "question": "q",
            "options": ["a", "b", "c", "d"],
            "answer": 1,
            "explanation": "e",
            "tags": ["N5"]
        });
        let q: Question = serde_json::from_value(raw).unwrap();
        assert_eq!(q.extra.get("type"), Some(&json!("star_ordering")));

        let out = serde_json::to_value(&q).unwrap();
        assert_eq!(out["type"], json!("star_ordering"));
        assert_eq!(out["category"], json!("grammar"));
        assert!(out.get("verified").is_none());
        assert!(out.get("metadata").is_none());
    }

    #[test]
    fn odd_flags_and_metadata_do_not_fail_the_record() {
        let q: Question = serde_json::from_value(json!({
            "id": "N5-語彙-v01-01",
            "question": "q",
            "verified": null,
            "metadata": {"generated_at": "2025-01-01 00:00:00", "model": "m"}
        }))
        .unwrap();
        assert!(!q.verified);
        assert_eq!(q.metadata.as_ref().map(|m| m.batch.as_str()), Some(""));

        let q: Question = serde_json::from_value(json!({"verified": "yes", "metadata": "v01"})).unwrap();
        assert!(!q.verified);
        assert_eq!(q.metadata, None);
    }

    #[test]
    fn section_decides_the_category_of_older_records() {
        let q = Question::from_value(json!({
            "id": 12,
            "section": "N5-讀解",
            "question": "質問：田中さんは？",
            "options": ["a", "b", "c", "d"],
            "answer": 1
        }))
        .unwrap();
        assert_eq!(q.category, Category::Reading);
        assert_eq!(q.section(), Some("N5-讀解"));

        let q = Question::from_value(json!({"category": "grammar", "section": "N5-讀解"})).unwrap();
        assert_eq!(q.category, Category::Grammar);
    }

    #[test]
    fn missing_answer_is_not_written_as_null() {
        let q: Question = serde_json::from_value(json!({"question": "q", "answer": "two"})).unwrap();
        let out = serde_json::to_value(&q).unwrap();
        assert!(out.get("answer").is_none());
    }

    #[test]
    fn markup_is_stripped() {
        assert_eq!(strip_markup(" <b>水</b>を<ruby>飲<rt>の</rt></ruby>む "), "水を飲のむ");
        assert_eq!(preview("あいうえお", 3), "あいう...");
        assert_eq!(preview("あい", 3), "あい");
    }
}
