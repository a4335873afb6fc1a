// バージョン番号と ID の割り当て
use chrono::Local;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::question::{Category, GenerationMetadata, Question};
use crate::store::Level;

static ID_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-v(\d+)-").unwrap());
static TAG_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v(\d+)$").unwrap());

/// 収集ループの結果
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<Question>,
    /// 実際に行った生成の回数
    pub attempts: usize,
    /// 試行回数の上限に達しても目標数に届かなかった
    pub exhausted: bool,
}

/// 既存の最大バージョン + 1 (`v01` 形式)
pub fn next_batch_version(existing: &[Question]) -> String {
    let max = existing
        .iter()
        .flat_map(|q| {
            let from_id = q
                .id
                .as_deref()
                .and_then(|id| ID_VERSION.captures(id))
                .and_then(|c| c[1].parse::<u32>().ok());
            let from_tags = q
                .tags
                .iter()
                .filter_map(|t| TAG_VERSION.captures(t))
                .filter_map(|c| c[1].parse::<u32>().ok());
            from_id.into_iter().chain(from_tags)
        })
        .max()
        .unwrap_or(0);

    format!("v{:02}", max.saturating_add(1))
}

/// 採用した問題に ID・タグ・メタデータを付ける
///
/// ID はカテゴリごとに 1 から数える。
pub fn assign_ids(level: Level, version: &str, model_name: &str, questions: &mut [Question]) {
    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut counters: HashMap<Category, usize> = HashMap::new();

    for q in questions.iter_mut() {
        let counter = counters.entry(q.category).or_insert(0);
        *counter += 1;

        let id = format!("{}-{}-{}-{:02}", level, q.category.display_name(), version, counter);

        let reserved = [level.as_str(), version, id.as_str()];
        q.tags.retain(|t| !reserved.contains(&t.as_str()));
        q.tags.extend(reserved.iter().map(|t| t.to_string()));

        q.metadata = Some(GenerationMetadata {
            generated_at: generated_at.clone(),
            model: model_name.to_string(),
            batch: version.to_string(),
        });
        q.id = Some(id);
        // 新しい問題は必ず review を通す
        q.verified = false;
    }
}
