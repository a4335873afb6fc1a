// 利用可能なモデルの評価と選択

use super::client::FALLBACK_MODEL;
use super::schemas::gemini_response::ModelInfo;

/// モデルのおすすめ度
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Recommendation {
    pub stars: u8,
    pub label: &'static str,
    pub reason: &'static str,
}

/// モデル名からおすすめ度を判定する
pub fn recommend(model_name: &str) -> Recommendation {
    let name = model_name.to_lowercase();

    if name.contains("gemini-1.5-pro") {
        Recommendation {
            stars: 5,
            label: "強く推奨",
            reason: "推論力が最も高く、JLPT の複雑な文法解析と出題に向く。JSON モード対応。",
        }
    } else if name.contains("gemini-1.5-flash") {
        Recommendation {
            stars: 5,
            label: "推奨 (高速)",
            reason: "最速かつ低コスト。N4/N5 には十分な推論力。JSON モード対応。",
        }
    } else if name.contains("gemini-pro-latest") {
        Recommendation {
            stars: 4,
            label: "推奨 (最新版)",
            reason: "Gemini Pro の最新版。十分な能力がある。",
        }
    } else if name.contains("gemini-1.0-pro") || name.contains("gemini-pro") {
        Recommendation {
            stars: 3,
            label: "可",
            reason: "旧世代の標準モデル。JSON 形式の遵守は 1.5 系ほど安定しない。",
        }
    } else {
        Recommendation {
            stars: 0,
            label: "不明",
            reason: "その他のモデル。",
        }
    }
}

/// generateContent に対応したモデル名 ("models/" なし)
pub fn generation_models(models: &[ModelInfo]) -> Vec<String> {
    models
        .iter()
        .filter(|m| m.supports_generate_content())
        .map(|m| m.short_name().to_string())
        .collect()
}

/// 対話なしでモデルを選ぶ
///
/// 実験版 (exp) を除いた gemini 系から flash を優先。候補がなければ既定モデル。
pub fn auto_select(models: &[ModelInfo]) -> String {
    let candidates: Vec<String> = generation_models(models)
        .into_iter()
        .filter(|name| name.contains("gemini") && !name.contains("exp"))
        .collect();

    candidates
        .iter()
        .find(|name| name.contains("flash"))
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

/// 一覧表示用の行
pub fn format_row(index: usize, model_name: &str) -> String {
    let rec = recommend(model_name);
    let stars = if rec.stars == 0 {
        "❓".to_string()
    } else {
        "⭐".repeat(rec.stars as usize)
    };
    format!(
        "{:<4} | {:<40} | {} ({}) | {}",
        index, model_name, stars, rec.label, rec.reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: format!("models/{}", name),
            display_name: None,
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn recommendation_tiers() {
        assert_eq!(recommend("models/gemini-1.5-pro-002").stars, 5);
        assert_eq!(recommend("gemini-1.5-flash").stars, 5);
        assert_eq!(recommend("gemini-pro-latest").stars, 4);
        assert_eq!(recommend("gemini-1.0-pro").stars, 3);
        assert_eq!(recommend("text-bison").stars, 0);
    }

    #[test]
    fn auto_select_prefers_stable_flash() {
        let models = vec![
            model("gemini-1.5-pro", &["generateContent"]),
            model("gemini-2.0-flash-exp", &["generateContent"]),
            model("gemini-1.5-flash", &["generateContent"]),
            model("embedding-001", &["embedContent"]),
        ];
        assert_eq!(auto_select(&models), "gemini-1.5-flash");
    }

    #[test]
    fn auto_select_falls_back() {
        assert_eq!(auto_select(&[]), FALLBACK_MODEL);
        let models = vec![model("gemini-1.5-pro", &["generateContent"])];
        assert_eq!(auto_select(&models), "gemini-1.5-pro");
    }
}
