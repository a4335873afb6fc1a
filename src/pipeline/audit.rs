// AI による模擬受験チェック
//
// 正解を伏せた問題をモデルに解かせ、モデルの答えが保存されている正解と
// 一致した問題だけを通す。応答が壊れていれば通さない。
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ModelError;
use crate::llm::LanguageModel;
use crate::llm::prompts::{self, Templates};
use crate::llm::response::parse_json;
use crate::question::{Category, Question, parse_index, preview};

/// モデルに渡す問題 (正解は含めない)
#[derive(Debug, Serialize)]
struct AuditItem<'a> {
    index: usize,
    category: Category,
    question: &'a str,
    options: &'a [String],
}

pub fn build_audit_prompt(templates: &Templates, candidates: &[Question]) -> String {
    let items: Vec<AuditItem<'_>> = candidates
        .iter()
        .enumerate()
        .map(|(index, q)| AuditItem {
            index,
            category: q.category,
            question: &q.prompt,
            options: &q.options,
        })
        .collect();

    // Vec<AuditItem> のシリアライズは失敗しない
    let questions = serde_json::to_string_pretty(&items).unwrap_or_default();
    templates.render(prompts::AUDIT, &vec![("questions".to_string(), questions)])
}

/// 応答を「インデックス → モデルの答え」に変換する
///
/// 答えが整数でない場合は None (-1 と同じく不一致扱い)。同じインデックスが
/// 複数あれば最初のものを使う。
pub fn parse_claims(text: &str) -> Result<HashMap<usize, Option<i64>>, ModelError> {
    let value = parse_json(text)?;
    let results: &[Value] = match &value {
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => return Err(ModelError::Malformed("results が配列ではありません".to_string())),
            // passed_indices だけの応答には答えがないので何も通さない
            None if map.contains_key("passed_indices") => &[],
            None => return Err(ModelError::Malformed("results がありません".to_string())),
        },
        Value::Array(items) => items.as_slice(),
        _ => return Err(ModelError::Malformed("想定外の JSON 形式".to_string())),
    };

    let mut claims = HashMap::new();
    for item in results {
        let Some(index) = item.get("index").and_then(parse_index) else {
            continue;
        };
        let Ok(index) = usize::try_from(index) else {
            continue;
        };
        let claimed = item
            .get("my_answer")
            .or_else(|| item.get("answer"))
            .and_then(parse_index);
        claims.entry(index).or_insert(claimed);
    }

    Ok(claims)
}

/// 模擬受験を通過した問題だけを返す
pub async fn audit<M>(
    model: &M,
    templates: &Templates,
    candidates: Vec<Question>,
    temperature: f32,
) -> Vec<Question>
where
    M: LanguageModel + ?Sized,
{
    if candidates.is_empty() {
        return Vec::new();
    }

    info!("🔍 AI 模擬受験チェック中 ({} 問)...", candidates.len());
    let prompt = build_audit_prompt(templates, &candidates);

    let claims = match model.complete_json(&prompt, temperature).await {
        Ok(text) => match parse_claims(&text) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("⚠️ 審査応答の解析に失敗、全問不合格とします: {}", e);
                return Vec::new();
            }
        },
        Err(e) => {
            error!("❌ 審査呼び出しに失敗、全問不合格とします: {}", e);
            return Vec::new();
        }
    };

    let total = candidates.len();
    let passed: Vec<Question> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, q)| {
            let claimed = claims.get(&index).copied().flatten();
            if claimed.is_some() && claimed == q.answer {
                Some(q)
            } else {
                info!(
                    "  [除外] #{} AI ({}) vs 正解 ({}) - {}",
                    index,
                    claimed.map(|c| c.to_string()).unwrap_or_else(|| "なし".to_string()),
                    q.answer.map(|a| a.to_string()).unwrap_or_else(|| "なし".to_string()),
                    preview(&q.plain_prompt(), 20)
                );
                None
            }
        })
        .collect();

    info!("✅ 審査完了: 合格 {} / {}", passed.len(), total);
    passed
}
