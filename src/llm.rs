// LLMモジュール - 生成AI (Gemini) 関連の機能をまとめたモジュール

// サブモジュールをエクスポート
pub mod catalog;
pub mod client;
pub mod prompts;
pub mod response;
pub mod schemas;

pub use client::{GeminiClient, LanguageModel};
