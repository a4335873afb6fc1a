// 生成AIとの境界で起きるエラーの分類

/// 生成モデル呼び出しのエラー
///
/// どれもバッチ単位で回復する (その回の結果を 0 件として扱う)。
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// ネットワークやタイムアウト
    #[error("通信エラー: {0}")]
    Transport(#[from] reqwest::Error),

    /// API が 2xx 以外を返した
    #[error("API エラー: ステータス {status}, レスポンス: {body}")]
    Api { status: u16, body: String },

    /// 候補が空、またはテキストが含まれていない
    #[error("モデルの応答にテキストが含まれていません")]
    EmptyResponse,

    /// JSON として解釈できない
    #[error("応答の解析に失敗: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Malformed(err.to_string())
    }
}
