// 重複判定
use crate::config::DuplicateThresholds;
use crate::question::{Category, Question};
use crate::similarity::similarity;

/// candidate が existing のいずれかと重複しているか
///
/// 最初に一致した時点で打ち切る。
pub fn is_duplicate<'a, I>(candidate: &Question, existing: I, thresholds: &DuplicateThresholds) -> bool
where
    I: IntoIterator<Item = &'a Question>,
{
    let text = candidate.prompt.trim();
    let answer = candidate.correct_option().unwrap_or_default();

    existing
        .into_iter()
        .any(|other| collides(text, answer, candidate.category, other, thresholds))
}

fn collides(
    text: &str,
    answer: &str,
    category: Category,
    other: &Question,
    thresholds: &DuplicateThresholds,
) -> bool {
    let other_text = other.prompt.trim();
    if other_text == text {
        return true;
    }

    let score = similarity(text, other_text);
    if category == Category::Reading {
        return score > thresholds.reading;
    }
    if score > thresholds.general {
        return true;
    }

    // 同じ語・文法項目を言い回しだけ変えて出題していないか
    let other_answer = other.correct_option().unwrap_or_default();
    !answer.is_empty() && answer == other_answer && score > thresholds.answer_match
}

/// 既存の題庫・採用済み・同じバッチ内の先行候補のいずれとも重複しない候補だけを残す
pub fn filter_duplicates(
    batch: Vec<Question>,
    existing: &[Question],
    accepted: &[Question],
    thresholds: &DuplicateThresholds,
) -> Vec<Question> {
    let mut unique: Vec<Question> = Vec::with_capacity(batch.len());

    for candidate in batch {
        let seen = existing.iter().chain(accepted).chain(unique.iter());
        if !is_duplicate(&candidate, seen, thresholds) {
            unique.push(candidate);
        }
    }

    unique
}
