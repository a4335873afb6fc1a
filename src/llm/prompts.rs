// プロンプトテンプレートを管理するモジュール
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// テンプレート変数のタイプ
pub type TemplateVariables = Vec<(String, String)>;

pub const GENERATE: &str = "generate";
pub const AUDIT: &str = "audit";
pub const REVIEW: &str = "review";

/// 使用するテンプレート一式
#[derive(Clone, Debug)]
pub struct Templates {
    templates: HashMap<String, String>,
}

impl Default for Templates {
    fn default() -> Self {
        Templates {
            templates: get_default_templates(),
        }
    }
}

impl Templates {
    /// 既定テンプレートを読み込み、ディレクトリに `<名前>.txt` があればそれで上書きする
    pub fn load(template_dir: Option<&Path>) -> Result<Self> {
        let mut templates = get_default_templates();

        if let Some(dir) = template_dir {
            for (name, content) in templates.iter_mut() {
                let template_path = dir.join(format!("{}.txt", name));
                if !template_path.exists() {
                    continue;
                }
                *content = fs::read_to_string(&template_path).map_err(|e| {
                    anyhow!("テンプレートファイル {} の読み込みに失敗: {}", template_path.display(), e)
                })?;
            }
        }

        Ok(Templates { templates })
    }

    pub fn render(&self, name: &str, variables: &TemplateVariables) -> String {
        let template = self.templates.get(name).map(String::as_str).unwrap_or_default();
        render_template(template, variables)
    }
}

// テンプレート内の変数を置換
pub fn render_template(template: &str, variables: &TemplateVariables) -> String {
    let mut rendered = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }

    rendered
}

// デフォルトテンプレートのマップを取得
pub fn get_default_templates() -> HashMap<String, String> {
    let mut templates = HashMap::new();

    // 問題生成
    templates.insert(
        GENERATE.to_string(),
        r#"あなたは JLPT (日本語能力試験) {{level}} の出題専門家です。{{level}} レベルの練習問題を作成してください。

### 問題数
- 文字・語彙 (vocabulary): {{vocabulary}} 問
- 文法 (grammar): {{grammar}} 問 (半数以上は星の並べ替え問題 star_ordering にすること)
- 読解 (reading): {{reading}} 問

### 出力形式 (JSON Array)
[
  {
    "category": "vocabulary",
    "tags": ["{{level}}", "Vocabulary", "Kanji"],
    "type": "kanji_reading",
    "question": "...",
    "options": ["A", "B", "C", "D"],
    "answer": 0,
    "explanation": "..."
  }
]
category は vocabulary / grammar / reading のいずれか。

### ルール
1. 聴解問題は出さないこと。
2. explanation は必ず繁體中文で書き、正解の理由と他の3つの選択肢が誤りである理由を説明すること。
3. 正解は1つだけ。answer は 0〜3 のインデックス。4つの選択肢はすべて異なること。
4. 空欄 (　　) の直後に助詞がある場合、選択肢にその助詞を重ねて含めないこと。
5. 読解問題の question には本文 ({{min_reading_chars}} 字以上) と設問の両方を含めること。本文のない読解問題は禁止。
6. {{level}} の範囲を超える語彙・文法を使わないこと。
7. 次の既存問題と似た問題は作らないこと: {{avoid}}
"#
        .to_string(),
    );

    // 模擬受験による検証 (正解は渡さない)
    templates.insert(
        AUDIT.to_string(),
        r#"あなたは JLPT の受験者です。以下の問題をよく読み、正しい答えを選んでください。

### 問題一覧
{{questions}}

### 手順
1. 各問題を一問ずつ読む。
2. 正解の選択肢のインデックス (0, 1, 2, 3) を自分で判断する。
3. 問題文が不自然、意味が曖昧、または正解がない場合は -1 とする。

### 出力形式 (JSON)
"results" 配列を持つ JSON オブジェクトを返すこと。各要素は:
- "index": 問題のインデックス
- "my_answer": あなたが選んだ正解のインデックス (int)、問題に欠陥があれば -1
- "reason": 短い理由 (任意)

例:
{
  "results": [
    {"index": 0, "my_answer": 2},
    {"index": 1, "my_answer": -1, "reason": "選択肢が重複している"}
  ]
}
"#
        .to_string(),
    );

    // 題庫の品質レビュー
    templates.insert(
        REVIEW.to_string(),
        r#"あなたは JLPT N4/N5 問題の最も厳しい校閲者です。以下の {{count}} 問を確認してください。

### 入力データ
{{questions}}

### 確認事項
1. レベル: ID に示された N4 / N5 と難易度が合っているか。N5 と書かれていて N3 以上なら FAIL。
2. 唯一の正解: 複数の選択肢が成り立つ、または正解がない場合は FAIL。
3. 誤答の選択肢: 明らかに誤りであること。曖昧さは許されない。
4. 解説: 繁體中文で書かれ、正解と誤答の理由を詳しく説明しているか。
   不十分 (繁體中文でない、簡体字、簡略すぎる) なら修正した解説を new_explanation に書く。

### 出力形式 (JSON Array)
[
  {
    "id": "問題 ID",
    "status": "PASS" または "FAIL",
    "reason": "FAIL の理由 (繁體中文)",
    "new_explanation": "修正後の解説 (修正不要なら空文字)"
  }
]
"#
        .to_string(),
    );

    templates
}

// テンプレートをファイルシステムに保存
pub fn save_default_templates(template_dir: &Path) -> Result<()> {
    let templates = get_default_templates();

    // ディレクトリが存在しない場合は作成
    if !template_dir.exists() {
        fs::create_dir_all(template_dir)
            .map_err(|e| anyhow!("テンプレートディレクトリの作成に失敗: {}", e))?;
    }

    // 各テンプレートをファイルに保存
    for (name, content) in templates {
        let file_path = template_dir.join(format!("{}.txt", name));
        fs::write(&file_path, content)
            .map_err(|e| anyhow!("テンプレートファイル {} の保存に失敗: {}", file_path.display(), e))?;
    }

    Ok(())
}
