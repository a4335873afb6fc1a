// Gemini REST API のスキーマ定義

// generateContent リクエスト
pub mod gemini_request {
    use serde::Serialize;

    #[derive(Clone, Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateContentRequest {
        pub contents: Vec<Content>,
        pub generation_config: GenerationConfig,
    }

    #[derive(Clone, Debug, Serialize)]
    pub struct Content {
        pub parts: Vec<Part>,
    }

    #[derive(Clone, Debug, Serialize)]
    pub struct Part {
        pub text: String,
    }

    // JSON モードを強制する
    #[derive(Clone, Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerationConfig {
        pub temperature: f32,
        pub response_mime_type: String,
    }

    impl GenerateContentRequest {
        pub fn json_prompt(prompt: &str, temperature: f32) -> Self {
            GenerateContentRequest {
                contents: vec![Content {
                    parts: vec![Part {
                        text: prompt.to_string(),
                    }],
                }],
                generation_config: GenerationConfig {
                    temperature,
                    response_mime_type: "application/json".to_string(),
                },
            }
        }
    }
}

// generateContent / models レスポンス
pub mod gemini_response {
    use serde::Deserialize;

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
    }

    #[derive(Clone, Debug, Deserialize)]
    pub struct Candidate {
        pub content: Option<CandidateContent>,
    }

    #[derive(Clone, Debug, Deserialize)]
    pub struct CandidateContent {
        #[serde(default)]
        pub parts: Vec<CandidatePart>,
    }

    #[derive(Clone, Debug, Deserialize)]
    pub struct CandidatePart {
        pub text: Option<String>,
    }

    impl GenerateContentResponse {
        /// 最初の候補のテキスト部分
        pub fn first_text(&self) -> Option<&str> {
            self.candidates
                .first()?
                .content
                .as_ref()?
                .parts
                .iter()
                .find_map(|part| part.text.as_deref())
        }
    }

    // モデル一覧
    #[derive(Clone, Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModelList {
        #[serde(default)]
        pub models: Vec<ModelInfo>,
        pub next_page_token: Option<String>,
    }

    #[derive(Clone, Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModelInfo {
        /// "models/gemini-1.5-flash" 形式
        pub name: String,
        pub display_name: Option<String>,
        #[serde(default)]
        pub supported_generation_methods: Vec<String>,
    }

    impl ModelInfo {
        /// "models/" を外した名前
        pub fn short_name(&self) -> &str {
            self.name.strip_prefix("models/").unwrap_or(&self.name)
        }

        pub fn supports_generate_content(&self) -> bool {
            self.supported_generation_methods
                .iter()
                .any(|m| m == "generateContent")
        }
    }
}
