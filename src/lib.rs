// jlpt-forge - 生成AIで JLPT 練習問題を作り、重複除去と模擬受験で絞り込んで題庫に追加する

pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod question;
pub mod review;
pub mod similarity;
pub mod store;
