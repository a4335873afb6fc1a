// パイプラインの設定値
//
// コマンドライン引数と環境変数から main で組み立て、各処理に明示的に渡す。

use crate::question::Category;

/// 重複判定のしきい値
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DuplicateThresholds {
    /// 読解: 長文なので名前を変えただけでも類似度が高くなる
    pub reading: f64,
    /// 語彙・文法
    pub general: f64,
    /// 正解の選択肢が同じ場合に使う低めのしきい値
    pub answer_match: f64,
}

impl Default for DuplicateThresholds {
    fn default() -> Self {
        DuplicateThresholds {
            reading: 0.9,
            general: 0.8,
            answer_match: 0.6,
        }
    }
}

/// カテゴリごとの目標問題数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetCounts {
    pub vocabulary: usize,
    pub grammar: usize,
    pub reading: usize,
}

impl TargetCounts {
    pub const STANDARD: TargetCounts = TargetCounts {
        vocabulary: 10,
        grammar: 10,
        reading: 5,
    };

    /// ドライランでは各1問だけ
    pub const DRY_RUN: TargetCounts = TargetCounts {
        vocabulary: 1,
        grammar: 1,
        reading: 1,
    };

    pub fn total(&self) -> usize {
        self.vocabulary + self.grammar + self.reading
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Vocabulary => self.vocabulary,
            Category::Grammar => self.grammar,
            Category::Reading => self.reading,
        }
    }
}

impl Default for TargetCounts {
    fn default() -> Self {
        TargetCounts::STANDARD
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub thresholds: DuplicateThresholds,
    /// 読解本文 (マークアップ除去後) の最低文字数
    pub min_reading_chars: usize,
    /// 生成の試行回数の上限
    pub max_attempts: usize,
    pub targets: TargetCounts,
    /// true ならファイルに書き込まない
    pub dry_run: bool,
    /// 生成プロンプトに載せる既存問題のサンプル数
    pub context_samples: usize,
    pub generation_temperature: f32,
    pub audit_temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            thresholds: DuplicateThresholds::default(),
            min_reading_chars: 150,
            max_attempts: 3,
            targets: TargetCounts::STANDARD,
            dry_run: false,
            context_samples: 15,
            generation_temperature: 0.2,
            audit_temperature: 0.1,
        }
    }
}

/// review コマンドの設定
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewConfig {
    /// 1回の AI 呼び出しで確認する問題数
    pub batch_size: usize,
    /// これより短い読解問題は本文が欠けているとみなす
    pub min_reading_chars: usize,
    pub temperature: f32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            batch_size: 5,
            min_reading_chars: 30,
            temperature: 0.1,
        }
    }
}
