// 構造上のルールによる足切り
use log::info;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use crate::question::{Category, Question, preview};

// 最初の空欄 (　　) / (    )
static BLANK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[（(].*?[）)]").unwrap());

const PARTICLES: [&str; 11] = ["に", "で", "を", "が", "へ", "と", "から", "まで", "より", "は", "も"];

/// 不合格の理由
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    OptionCount(usize),
    AnswerOutOfRange(Option<i64>),
    DuplicateOptions,
    ReadingTooShort(usize),
    RedundantParticle(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::OptionCount(n) => write!(f, "選択肢が {} 個", n),
            Violation::AnswerOutOfRange(Some(a)) => write!(f, "正解インデックスが範囲外 ({})", a),
            Violation::AnswerOutOfRange(None) => write!(f, "正解インデックスがない"),
            Violation::DuplicateOptions => write!(f, "選択肢が重複"),
            Violation::ReadingTooShort(n) => write!(f, "読解本文が短すぎる ({} 字)", n),
            Violation::RedundantParticle(p) => write!(f, "助詞「{}」が空欄の後ろと選択肢で重複", p),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HardRules {
    pub min_reading_chars: usize,
}

/// 検証結果
#[derive(Debug, Default)]
pub struct Validated {
    pub kept: Vec<Question>,
    pub rejected: usize,
}

impl HardRules {
    pub fn check(&self, q: &Question) -> Result<(), Violation> {
        if q.options.len() != 4 {
            return Err(Violation::OptionCount(q.options.len()));
        }
        if !matches!(q.answer, Some(0..=3)) {
            return Err(Violation::AnswerOutOfRange(q.answer));
        }

        let distinct: HashSet<&str> = q.options.iter().map(String::as_str).collect();
        if distinct.len() != q.options.len() {
            return Err(Violation::DuplicateOptions);
        }

        if q.category == Category::Reading {
            let length = q.plain_prompt().chars().count();
            if length < self.min_reading_chars {
                return Err(Violation::ReadingTooShort(length));
            }
        }

        if let Some(particle) = redundant_particle(q) {
            return Err(Violation::RedundantParticle(particle.to_string()));
        }

        Ok(())
    }

    /// ルールに合う候補だけを元の順序で残す
    pub fn validate(&self, candidates: Vec<Question>) -> Validated {
        let mut validated = Validated::default();

        for q in candidates {
            match self.check(&q) {
                Ok(()) => validated.kept.push(q),
                Err(violation) => {
                    info!("  [除外] {}: {}", violation, preview(&q.plain_prompt(), 20));
                    validated.rejected += 1;
                }
            }
        }

        validated
    }
}

/// 空欄の直後の助詞を正解の選択肢も含んでいれば、その助詞
fn redundant_particle(q: &Question) -> Option<&'static str> {
    let answer = q.correct_option()?;
    let blank = BLANK.find(&q.prompt)?;
    let after = q.prompt[blank.end()..].trim_start();
    if after.is_empty() {
        return None;
    }

    PARTICLES
        .iter()
        .copied()
        .find(|p| after.starts_with(p) && answer.ends_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: HardRules = HardRules {
        min_reading_chars: 150,
    };

    fn grammar(prompt: &str, options: &[&str], answer: Option<i64>) -> Question {
        Question {
            category: Category::Grammar,
            prompt: prompt.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            answer,
            ..Default::default()
        }
    }

    fn reading(chars: usize) -> Question {
        Question {
            category: Category::Reading,
            prompt: format!("<p>{}</p>", "あ".repeat(chars)),
            options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            answer: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn structural_rules() {
        let opts = ["a", "b", "c", "d"];
        assert_eq!(RULES.check(&grammar("q", &opts[..3], Some(0))), Err(Violation::OptionCount(3)));
        assert_eq!(
            RULES.check(&grammar("q", &opts, Some(4))),
            Err(Violation::AnswerOutOfRange(Some(4)))
        );
        assert_eq!(
            RULES.check(&grammar("q", &opts, None)),
            Err(Violation::AnswerOutOfRange(None))
        );
        assert_eq!(
            RULES.check(&grammar("q", &["a", "a", "c", "d"], Some(0))),
            Err(Violation::DuplicateOptions)
        );
        assert_eq!(RULES.check(&grammar("q", &opts, Some(3))), Ok(()));
    }

    #[test]
    fn reading_length_ignores_markup() {
        assert_eq!(RULES.check(&reading(149)), Err(Violation::ReadingTooShort(149)));
        assert_eq!(RULES.check(&reading(150)), Ok(()));
    }

    #[test]
    fn particle_after_blank_must_not_repeat() {
        let q = grammar(
            "私は（　　）に寝ます。",
            &["夜１０時に", "夜１０時", "夜１０時を", "夜１０時で"],
            Some(0),
        );
        assert_eq!(RULES.check(&q), Err(Violation::RedundantParticle("に".to_string())));

        let ok = grammar(
            "私は（　　）に寝ます。",
            &["夜１０時に", "夜１０時", "夜１０時を", "夜１０時で"],
            Some(1),
        );
        assert_eq!(RULES.check(&ok), Ok(()));
    }

    #[test]
    fn validation_keeps_order_and_is_idempotent() {
        let opts = ["a", "b", "c", "d"];
        let batch = vec![
            grammar("1", &opts, Some(0)),
            grammar("2", &opts, Some(9)),
            reading(10),
            grammar("3", &opts, Some(2)),
        ];

        let first = RULES.validate(batch);
        assert_eq!(first.rejected, 2);
        let prompts: Vec<&str> = first.kept.iter().map(|q| q.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["1", "3"]);

        let again = RULES.validate(first.kept.clone());
        assert_eq!(again.rejected, 0);
        assert_eq!(again.kept, first.kept);
    }
}
