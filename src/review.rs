// 登録済み問題のレビュー
//
// 未確認の問題を少しずつ取り出し、ローカルの検査と AI の校閲にかける。
// 削除するかどうかは必ずオペレーターが決める。
use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use crate::config::ReviewConfig;
use crate::console::Console;
use crate::error::ModelError;
use crate::llm::LanguageModel;
use crate::llm::prompts::{self, Templates};
use crate::llm::response::{extract_items, parse_json};
use crate::question::{Category, Question, lenient_id, lenient_string, preview};
use crate::store::{Level, QuestionStore};

/// 校閲結果 1 件
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Verdict {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub new_explanation: String,
}

impl Verdict {
    pub fn failed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("FAIL")
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub reviewed: usize,
    pub deleted: usize,
    /// 解説を書き換えた数
    pub modified: usize,
    /// AI の応答がなく未確認のまま残ったバッチ数
    pub skipped_batches: usize,
}

/// AI に渡す前の機械的な検査
pub fn local_issues(q: &Question, level: Level, min_reading_chars: usize) -> Vec<String> {
    let mut issues = Vec::new();

    // section を持つ古い形式の記録は section の接頭辞で見る
    if let Some(section) = q.section() {
        let known = Level::ALL
            .iter()
            .any(|l| section.starts_with(&format!("{}-", l)));
        if !known {
            issues.push(format!("section の形式が不正: {} (N5-xxx または N4-xxx であること)", section));
        }
    } else {
        let prefix = format!("{}-", level);
        match q.id.as_deref() {
            Some(id) if id.starts_with(&prefix) => {}
            Some(id) => issues.push(format!("ID の形式が不正: {} ({}xxx であること)", id, prefix)),
            None => issues.push("ID がない".to_string()),
        }
    }

    match q.answer {
        Some(_) if q.answer_index().is_some() => {}
        Some(answer) => issues.push(format!(
            "正解インデックスが不正: answer={}, 選択肢数={}",
            answer,
            q.options.len()
        )),
        None => issues.push("正解の形式が不正".to_string()),
    }

    if q.category == Category::Reading && q.plain_prompt().chars().count() < min_reading_chars {
        issues.push("読解問題に本文がないようです".to_string());
    }

    issues
}

/// 校閲応答を読む。配列でもオブジェクトに包まれていてもよい
pub fn parse_verdicts(text: &str, level: Level) -> Result<Vec<Verdict>, ModelError> {
    let value = parse_json(text)?;
    Ok(extract_items(value, level.as_str())
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Verdict>(item).ok())
        .collect())
}

pub struct Reviewer<'a, M: LanguageModel + ?Sized> {
    model: &'a M,
    templates: &'a Templates,
    config: &'a ReviewConfig,
}

impl<'a, M: LanguageModel + ?Sized> Reviewer<'a, M> {
    pub fn new(model: &'a M, templates: &'a Templates, config: &'a ReviewConfig) -> Self {
        Reviewer {
            model,
            templates,
            config,
        }
    }

    /// 未確認の問題をすべてレビューする。バッチごとに題庫を保存する
    pub async fn run<R: BufRead, W: Write>(
        &self,
        store: &mut QuestionStore,
        console: &mut Console<R, W>,
    ) -> Result<ReviewSummary> {
        let mut summary = ReviewSummary::default();
        let pending: Vec<usize> = (0..store.len()).filter(|&i| !store.questions[i].verified).collect();
        info!("📊 未確認の問題: {} 問", pending.len());

        if pending.is_empty() {
            info!("🎉 すべての問題が確認済みです");
            return Ok(summary);
        }

        // 位置がずれないよう、削除はバッチの終わりにまとめて反映する
        let mut records = store.questions.clone();
        let mut removed: BTreeSet<usize> = BTreeSet::new();
        let batch_size = self.config.batch_size.max(1);

        for (n, batch) in pending.chunks(batch_size).enumerate() {
            let first = n * batch_size + 1;
            info!(
                "🔍 {}〜{} 問目を確認中 ({})...",
                first,
                first + batch.len() - 1,
                self.model.name()
            );
            summary.reviewed += batch.len();

            for &pos in batch {
                self.pre_check(&mut records[pos], pos, store.level, console, &mut removed)?;
            }

            let ai_batch: Vec<usize> = batch.iter().copied().filter(|p| !removed.contains(p)).collect();
            if !ai_batch.is_empty() {
                match self.ask(&records, &ai_batch, store.level).await {
                    Some(verdicts) => {
                        self.apply(verdicts, &mut records, &ai_batch, console, &mut removed, &mut summary)?
                    }
                    None => {
                        warn!("⚠️ AI の応答がないため、このバッチはスキップします");
                        summary.skipped_batches += 1;
                    }
                }
            }

            store.questions = records
                .iter()
                .enumerate()
                .filter(|(i, _)| !removed.contains(i))
                .map(|(_, q)| q.clone())
                .collect();
            store.save().await?;
        }

        summary.deleted = removed.len();
        info!(
            "✅ レビュー終了: 削除 {} 問、解説の改善 {} 問",
            summary.deleted, summary.modified
        );
        Ok(summary)
    }

    fn pre_check<R: BufRead, W: Write>(
        &self,
        q: &mut Question,
        pos: usize,
        level: Level,
        console: &mut Console<R, W>,
        removed: &mut BTreeSet<usize>,
    ) -> Result<()> {
        let issues = local_issues(q, level, self.config.min_reading_chars);
        if issues.is_empty() {
            return Ok(());
        }

        console.say(&format!("\n🚩 [検査で検出] ID: {}", q.id_or_placeholder()))?;
        console.say(&format!("   問題点: {}", issues.join(", ")))?;
        console.say(&format!("   問題文: {}", q.prompt))?;
        if console.confirm("👉 削除しますか (y/n)? ")? {
            removed.insert(pos);
        } else {
            q.verified = true;
        }
        Ok(())
    }

    /// 校閲を依頼する。呼び出しの失敗や空の応答は None
    async fn ask(&self, records: &[Question], batch: &[usize], level: Level) -> Option<Vec<Verdict>> {
        let items: Vec<&Question> = batch.iter().map(|&p| &records[p]).collect();
        let questions = serde_json::to_string_pretty(&items).ok()?;
        let prompt = self.templates.render(
            prompts::REVIEW,
            &vec![
                ("count".to_string(), items.len().to_string()),
                ("questions".to_string(), questions),
            ],
        );

        let verdicts = match self.model.complete_json(&prompt, self.config.temperature).await {
            Ok(text) => parse_verdicts(&text, level),
            Err(e) => Err(e),
        };
        match verdicts {
            Ok(verdicts) if !verdicts.is_empty() => Some(verdicts),
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️ 校閲に失敗: {}", e);
                None
            }
        }
    }

    fn apply<R: BufRead, W: Write>(
        &self,
        verdicts: Vec<Verdict>,
        records: &mut [Question],
        batch: &[usize],
        console: &mut Console<R, W>,
        removed: &mut BTreeSet<usize>,
        summary: &mut ReviewSummary,
    ) -> Result<()> {
        let mut handled: BTreeSet<usize> = BTreeSet::new();

        for verdict in verdicts {
            let Some(id) = verdict.id.as_deref() else {
                continue;
            };
            let Some(&pos) = batch
                .iter()
                .find(|&&p| records[p].id.as_deref() == Some(id) && !handled.contains(&p))
            else {
                continue;
            };
            handled.insert(pos);
            let q = &mut records[pos];

            if verdict.failed() {
                console.say(&format!("\n🤖 [AI の指摘] ID: {}", id))?;
                console.say(&format!("   理由: {}", verdict.reason))?;
                console.say(&format!("   問題文: {}", q.prompt))?;
                console.say(&format!(
                    "   選択肢: {} (正解: {})",
                    q.options.join(" / "),
                    q.correct_option().unwrap_or("?")
                ))?;
                if console.confirm("👉 削除(y) / 保留(n)? ")? {
                    removed.insert(pos);
                    console.say("🗑️ 削除対象にしました")?;
                } else {
                    q.verified = true;
                    console.say("🛡️ 保留しました")?;
                }
                continue;
            }

            if verdict.new_explanation.chars().count() > 5 {
                info!("📝 [解説を改善] ID: {}", id);
                info!("   旧: {}", preview(&q.explanation, 30));
                info!("   新: {}", preview(&verdict.new_explanation, 30));
                q.explanation = verdict.new_explanation;
                summary.modified += 1;
            }
            q.verified = true;
        }

        Ok(())
    }
}
