// 問題生成の呼び出し
use log::{error, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::TargetCounts;
use crate::llm::LanguageModel;
use crate::llm::prompts::{self, TemplateVariables, Templates};
use crate::llm::response::{extract_items, parse_json};
use crate::question::{Question, strip_markup};
use crate::store::Level;

/// 既存問題からランダムに選んだ冒頭部分 (似た問題を避けさせるための文脈)
pub fn sample_context<R: Rng + ?Sized>(existing: &[Question], n: usize, rng: &mut R) -> String {
    if existing.is_empty() || n == 0 {
        return "無".to_string();
    }

    existing
        .choose_multiple(rng, n)
        .map(|q| strip_markup(&q.prompt).chars().take(20).collect::<String>())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// 生成リクエストの中身
#[derive(Clone, Copy, Debug)]
pub struct GenerationRequest<'a> {
    pub level: Level,
    pub targets: TargetCounts,
    pub context: &'a str,
    pub min_reading_chars: usize,
    pub temperature: f32,
}

pub fn build_generation_prompt(templates: &Templates, request: &GenerationRequest<'_>) -> String {
    let variables: TemplateVariables = vec![
        ("level".to_string(), request.level.to_string()),
        ("vocabulary".to_string(), request.targets.vocabulary.to_string()),
        ("grammar".to_string(), request.targets.grammar.to_string()),
        ("reading".to_string(), request.targets.reading.to_string()),
        ("min_reading_chars".to_string(), request.min_reading_chars.to_string()),
        ("avoid".to_string(), request.context.to_string()),
    ];
    templates.render(prompts::GENERATE, &variables)
}

/// 1回分の候補を生成する
///
/// 呼び出しや解析に失敗した場合は空を返し、その試行は0問として扱う。
pub async fn request_batch<M>(
    model: &M,
    templates: &Templates,
    request: &GenerationRequest<'_>,
) -> Vec<Question>
where
    M: LanguageModel + ?Sized,
{
    info!(
        "🤖 {} に {} の問題を依頼中 (語彙:{} 文法:{} 読解:{})...",
        model.name(),
        request.level,
        request.targets.vocabulary,
        request.targets.grammar,
        request.targets.reading
    );

    let prompt = build_generation_prompt(templates, request);
    let text = match model.complete_json(&prompt, request.temperature).await {
        Ok(text) => text,
        Err(e) => {
            error!("❌ 生成に失敗: {}", e);
            return Vec::new();
        }
    };

    let value = match parse_json(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!("⚠️ 生成結果の解析に失敗: {}", e);
            return Vec::new();
        }
    };

    extract_items(value, request.level.as_str())
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match Question::from_value(item) {
            Ok(q) => Some(q),
            Err(e) => {
                warn!("⚠️ #{} は問題として読めないためスキップ: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::pipeline::testing::ScriptedModel;
    use crate::question::Category;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn existing(prompts: &[&str]) -> Vec<Question> {
        prompts
            .iter()
            .map(|p| Question {
                prompt: p.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn request(context: &str) -> GenerationRequest<'_> {
        GenerationRequest {
            level: Level::N4,
            targets: TargetCounts::DRY_RUN,
            context,
            min_reading_chars: 150,
            temperature: 0.2,
        }
    }

    #[test]
    fn context_is_truncated_and_markup_free() {
        let mut rng = StdRng::seed_from_u64(7);
        let questions = existing(&["<b>あいうえおかきくけこさしすせそたちつてとなにぬねの</b>"]);
        assert_eq!(
            sample_context(&questions, 15, &mut rng),
            "あいうえおかきくけこさしすせそたちつてと"
        );
        assert_eq!(sample_context(&[], 15, &mut rng), "無");
    }

    #[test]
    fn context_samples_at_most_n() {
        let mut rng = StdRng::seed_from_u64(1);
        let questions = existing(&["一", "二", "三", "四", "五"]);
        let context = sample_context(&questions, 3, &mut rng);
        assert_eq!(context.split(" | ").count(), 3);
    }

    #[test]
    fn prompt_carries_targets_and_context() {
        let prompt = build_generation_prompt(&Templates::default(), &request("「山」の読み方"));
        assert!(prompt.contains("N4"));
        assert!(prompt.contains("「山」の読み方"));
        assert!(prompt.contains("150"));
    }

    #[tokio::test]
    async fn skips_items_that_are_not_questions() {
        let model = ScriptedModel::new(vec![Ok(r#"```json
{"N4": [
  {"category": "grammar", "question": "q1", "options": ["a","b","c","d"], "answer": "1", "type": "particle"},
  "壊れた要素",
  {"category": "読解", "question": "q2", "options": ["a","b","c","d"], "answer": 0}
]}
```"#
            .to_string())]);

        let batch = request_batch(&model, &Templates::default(), &request("無")).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].answer, Some(1));
        assert_eq!(batch[0].extra["type"], "particle");
        assert_eq!(batch[1].category, Category::Reading);
        assert!(model.prompts()[0].contains("N4"));
    }

    #[tokio::test]
    async fn failures_yield_an_empty_batch() {
        let model = ScriptedModel::new(vec![
            Err(ModelError::Api {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Ok("not json".to_string()),
        ]);
        assert!(request_batch(&model, &Templates::default(), &request("無")).await.is_empty());
        assert!(request_batch(&model, &Templates::default(), &request("無")).await.is_empty());
    }
}
