// 問題の取り込みパイプライン
//
// 生成 → 重複除去 → 構造ルール → AI 模擬受験 の順に候補を絞り込み、
// 目標数に届くか試行回数の上限に達するまで繰り返す。
pub mod audit;
pub mod batch;
pub mod duplicate;
pub mod generate;
pub mod hard_rules;

use log::{error, info, warn};

use crate::config::PipelineConfig;
use crate::llm::LanguageModel;
use crate::llm::prompts::Templates;
use crate::question::Question;
use crate::store::{Level, QuestionStore};

pub use batch::BatchOutcome;
use generate::GenerationRequest;
use hard_rules::HardRules;

/// 1レベル分の処理結果
#[derive(Debug)]
pub struct LevelReport {
    pub level: Level,
    pub version: String,
    pub accepted: usize,
    pub attempts: usize,
    pub exhausted: bool,
    /// ファイルに書き込んだか (ドライランや保存失敗なら false)
    pub saved: bool,
}

pub struct Pipeline<'a, M: LanguageModel + ?Sized> {
    model: &'a M,
    templates: &'a Templates,
    config: &'a PipelineConfig,
}

impl<'a, M: LanguageModel + ?Sized> Pipeline<'a, M> {
    pub fn new(model: &'a M, templates: &'a Templates, config: &'a PipelineConfig) -> Self {
        Pipeline {
            model,
            templates,
            config,
        }
    }

    /// 目標数に届くまで生成と絞り込みを繰り返す
    pub async fn collect(&self, level: Level, existing: &[Question]) -> BatchOutcome {
        let config = self.config;
        let target = config.targets.total();
        let rules = HardRules {
            min_reading_chars: config.min_reading_chars,
        };
        let context = generate::sample_context(existing, config.context_samples, &mut rand::thread_rng());
        let request = GenerationRequest {
            level,
            targets: config.targets,
            context: &context,
            min_reading_chars: config.min_reading_chars,
            temperature: config.generation_temperature,
        };

        let mut outcome = BatchOutcome::default();
        while outcome.accepted.len() < target && outcome.attempts < config.max_attempts {
            outcome.attempts += 1;
            info!(
                "🔄 試行 {}/{}: 残り約 {} 問",
                outcome.attempts,
                config.max_attempts,
                target - outcome.accepted.len()
            );

            let batch = generate::request_batch(self.model, self.templates, &request).await;
            let generated = batch.len();

            let unique = duplicate::filter_duplicates(batch, existing, &outcome.accepted, &config.thresholds);
            info!("生成 {} 問、重複除去後 {} 問", generated, unique.len());

            let validated = rules.validate(unique);
            if validated.rejected > 0 {
                info!("構造ルールで {} 問を除外", validated.rejected);
            }

            let passed =
                audit::audit(self.model, self.templates, validated.kept, config.audit_temperature).await;
            outcome.accepted.extend(passed);
        }

        outcome.exhausted = outcome.accepted.len() < target;
        outcome
    }

    /// 1レベル分を生成して題庫に追加する
    pub async fn run_level(&self, store: &mut QuestionStore) -> LevelReport {
        let level = store.level;
        info!("=== {} ({} 問登録済み) ===", level, store.len());

        let version = batch::next_batch_version(&store.questions);
        info!("今回のバージョン: {}", version);

        let mut outcome = self.collect(level, &store.questions).await;
        if outcome.exhausted {
            warn!(
                "⚠️ {} 回試行しても目標 {} 問に届きませんでした ({} 問)",
                outcome.attempts,
                self.config.targets.total(),
                outcome.accepted.len()
            );
        }
        info!("最終的に {} 問を採用", outcome.accepted.len());

        let mut report = LevelReport {
            level,
            version: version.clone(),
            accepted: outcome.accepted.len(),
            attempts: outcome.attempts,
            exhausted: outcome.exhausted,
            saved: false,
        };

        if outcome.accepted.is_empty() {
            info!("今回は採用された問題がありません");
            return report;
        }

        batch::assign_ids(level, &version, self.model.name(), &mut outcome.accepted);

        if self.config.dry_run {
            info!("📝 [ドライラン] {} 問を生成 (ファイルには書き込みません)", outcome.accepted.len());
            if let Ok(sample) = serde_json::to_string_pretty(&outcome.accepted[0]) {
                info!("例:\n{}", sample);
            }
            return report;
        }

        store.append(outcome.accepted);
        match store.save().await {
            Ok(()) => {
                info!("✅ {} を更新しました (全 {} 問)", store.path.display(), store.len());
                report.saved = true;
            }
            Err(e) => error!("❌ {} の保存に失敗: {:#}", store.path.display(), e),
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::error::ModelError;
    use crate::llm::LanguageModel;

    /// 決められた応答を順番に返すモデル
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            ScriptedModel {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// これまでに受け取ったプロンプト
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted-model"
        }

        async fn complete_json(&self, prompt: &str, _temperature: f32) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ModelError::EmptyResponse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;
    use crate::config::TargetCounts;
    use crate::question::Category;
    use serde_json::json;
    use tempfile::tempdir;

    fn config(dry_run: bool) -> PipelineConfig {
        PipelineConfig {
            targets: TargetCounts {
                vocabulary: 1,
                grammar: 1,
                reading: 0,
            },
            dry_run,
            ..Default::default()
        }
    }

    fn generated() -> String {
        json!([
            {
                "category": "vocabulary",
                "question": "「水」の読み方はどれですか。",
                "options": ["みず", "みち", "みせ", "みみ"],
                "answer": 0,
                "explanation": "水は「みず」と読む。"
            },
            {
                "category": "grammar",
                "question": "私は毎朝パン（　　）食べます。",
                "options": ["を", "に", "で", "へ"],
                "answer": 0,
                "explanation": "目的語には「を」を使う。"
            }
        ])
        .to_string()
    }

    fn all_correct() -> String {
        json!({"results": [{"index": 0, "my_answer": 0}, {"index": 1, "my_answer": 0}]}).to_string()
    }

    #[tokio::test]
    async fn stops_once_the_target_is_met() {
        let model = ScriptedModel::new(vec![Ok(generated()), Ok(all_correct())]);
        let templates = Templates::default();
        let config = config(true);
        let pipeline = Pipeline::new(&model, &templates, &config);

        let outcome = pipeline.collect(Level::N5, &[]).await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.accepted.len(), 2);
        assert!(!outcome.exhausted);
        assert_eq!(model.prompts().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_ceiling() {
        // 生成は毎回成功するが、審査で毎回全問落ちる
        let reject = json!({"results": [{"index": 0, "my_answer": -1}, {"index": 1, "my_answer": 3}]}).to_string();
        let model = ScriptedModel::new(vec![
            Ok(generated()),
            Ok(reject.clone()),
            Ok(generated()),
            Ok(reject.clone()),
            Ok(generated()),
            Ok(reject),
            Ok(generated()),
        ]);
        let templates = Templates::default();
        let config = config(true);
        let pipeline = Pipeline::new(&model, &templates, &config);

        let outcome = pipeline.collect(Level::N4, &[]).await;
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.accepted.is_empty());
        assert!(outcome.exhausted);
        assert_eq!(model.prompts().len(), 6);
    }

    #[tokio::test]
    async fn existing_questions_are_never_accepted_again() {
        let model = ScriptedModel::new(vec![Ok(generated()), Ok(json!({"results": [{"index": 0, "my_answer": 0}]}).to_string())]);
        let templates = Templates::default();
        let config = PipelineConfig {
            max_attempts: 1,
            ..config(true)
        };
        let pipeline = Pipeline::new(&model, &templates, &config);

        let existing: Vec<Question> = serde_json::from_str::<Vec<Question>>(&generated()).unwrap()[..1].to_vec();
        let outcome = pipeline.collect(Level::N5, &existing).await;
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].category, Category::Grammar);
        assert!(outcome.exhausted);
    }

    #[tokio::test]
    async fn run_level_saves_with_fresh_ids() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::new(vec![Ok(generated()), Ok(all_correct())]);
        let templates = Templates::default();
        let config = config(false);
        let pipeline = Pipeline::new(&model, &templates, &config);

        let path = QuestionStore::path_for(dir.path(), Level::N5);
        let mut store = QuestionStore::load(Level::N5, path.clone()).await;
        let report = pipeline.run_level(&mut store).await;

        assert!(report.saved);
        assert_eq!(report.version, "v01");
        let reloaded = QuestionStore::load(Level::N5, path).await;
        let ids: Vec<&str> = reloaded.questions.iter().filter_map(|q| q.id.as_deref()).collect();
        assert_eq!(ids, vec!["N5-語彙-v01-01", "N5-文法-v01-01"]);
        assert_eq!(
            reloaded.questions[0].metadata.as_ref().map(|m| m.model.as_str()),
            Some("scripted-model")
        );
    }

    #[tokio::test]
    async fn dry_run_leaves_the_file_alone() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::new(vec![Ok(generated()), Ok(all_correct())]);
        let templates = Templates::default();
        let config = config(true);
        let pipeline = Pipeline::new(&model, &templates, &config);

        let path = QuestionStore::path_for(dir.path(), Level::N4);
        let mut store = QuestionStore::load(Level::N4, path.clone()).await;
        let report = pipeline.run_level(&mut store).await;

        assert_eq!(report.accepted, 2);
        assert!(!report.saved);
        assert!(store.is_empty());
        assert!(!path.exists());
    }
}
