// 題庫ファイル (レベルごとの JSON 配列) の読み書き
use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::question::Question;

/// JLPT のレベル
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Level {
    #[value(name = "N5", alias = "n5")]
    N5,
    #[value(name = "N4", alias = "n4")]
    N4,
}

impl Level {
    /// 生成時の処理順
    pub const ALL: [Level; 2] = [Level::N5, Level::N4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::N5 => "N5",
            Level::N4 => "N4",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Level::N5 => "JLPT_n5_questions.json",
            Level::N4 => "JLPT_n4_questions.json",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1レベル分の題庫
#[derive(Clone, Debug)]
pub struct QuestionStore {
    pub level: Level,
    pub path: PathBuf,
    pub questions: Vec<Question>,
}

impl QuestionStore {
    pub fn path_for(data_dir: &Path, level: Level) -> PathBuf {
        data_dir.join(level.file_name())
    }

    /// 題庫を読み込む
    ///
    /// ファイルがない、または読めない場合は空の題庫として続行する。
    /// 一時的に読めなかっただけのファイルを次の保存で上書きすると
    /// 既存の問題と ID が失われるので、警告は必ず出す。
    pub async fn load(level: Level, path: PathBuf) -> Self {
        let questions = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<Value>>(&content) {
                Ok(records) => parse_records(records, &path),
                Err(e) => {
                    warn!("⚠️ {} の解析に失敗、空の題庫として扱います: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📂 {} はまだありません (新規作成)", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("⚠️ {} の読み込みに失敗、空の題庫として扱います: {}", path.display(), e);
                Vec::new()
            }
        };

        QuestionStore {
            level,
            path,
            questions,
        }
    }

    /// ファイル全体を書き直す
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json_data = serde_json::to_string_pretty(&self.questions)?;
        fs::write(&self.path, json_data)
            .await
            .with_context(|| format!("{} への書き込みに失敗", self.path.display()))?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 採用済みの問題を末尾に追加する
    pub fn append(&mut self, accepted: Vec<Question>) {
        self.questions.extend(accepted);
    }

    /// 指定 ID の問題を削除し、実際に削除した ID を返す
    pub fn delete_ids(&mut self, ids: &HashSet<String>) -> BTreeSet<String> {
        let mut removed = BTreeSet::new();
        self.questions.retain(|q| match &q.id {
            Some(id) if ids.contains(id) => {
                removed.insert(id.clone());
                false
            }
            _ => true,
        });
        removed
    }

    /// 全問題の ID を 1 始まりの連番に振り直す (バージョン情報は失われる)
    pub fn renumber(&mut self) {
        for (index, q) in self.questions.iter_mut().enumerate() {
            q.id = Some((index + 1).to_string());
        }
    }
}

/// 1 件ずつ読み、問題として読めないレコード (オブジェクト以外) だけを飛ばす
fn parse_records(records: Vec<Value>, path: &Path) -> Vec<Question> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match Question::from_value(record) {
            Ok(q) => Some(q),
            Err(e) => {
                warn!("⚠️ {} の #{} を読み飛ばします: {}", path.display(), index, e);
                None
            }
        })
        .collect()
}

/// カンマ区切りの ID 入力を集合にする
pub fn parse_id_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
