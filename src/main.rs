// jlpt-forge - Gemini で JLPT N5/N4 の練習問題を作り、題庫を管理するツール

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info, warn};
use simple_logger::SimpleLogger;

use jlpt_forge::config::{DuplicateThresholds, PipelineConfig, ReviewConfig, TargetCounts};
use jlpt_forge::console::Console;
use jlpt_forge::llm::client::{DEFAULT_BASE_URL, FALLBACK_MODEL};
use jlpt_forge::llm::prompts::{Templates, save_default_templates};
use jlpt_forge::llm::{GeminiClient, catalog};
use jlpt_forge::pipeline::Pipeline;
use jlpt_forge::review::Reviewer;
use jlpt_forge::store::{Level, QuestionStore, parse_id_list};

// コマンドライン引数の定義
#[derive(Parser, Debug)]
#[clap(
    name = "jlpt-forge",
    about = "Gemini で JLPT の練習問題を生成・審査・管理するツール",
    version = "0.1.0"
)]
struct Args {
    /// Google Gemini の API キー (GEMINI_API_KEY でも可)
    #[clap(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// 使用するモデル (省略時は一覧から選択)
    #[clap(long, env = "GEMINI_MODEL", global = true)]
    model: Option<String>,

    /// モデルを対話なしで自動選択する
    #[clap(long, global = true)]
    auto_model: bool,

    /// API のベース URL
    #[clap(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// 題庫ファイルを置くディレクトリ
    #[clap(long, env = "JLPT_DATA_DIR", default_value = ".", global = true)]
    data_dir: PathBuf,

    /// プロンプトテンプレートの上書き用ディレクトリ
    #[clap(long, global = true)]
    template_dir: Option<PathBuf>,

    /// 生成呼び出しのタイムアウト (秒)
    #[clap(long, default_value = "300", global = true)]
    timeout: u64,

    /// ログレベル (error, warn, info, debug, trace)
    #[clap(long, default_value = "info", global = true)]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 問題を生成して題庫に追加する (N5 → N4)
    Generate {
        /// 1レベルだけ処理する
        #[clap(long, value_enum)]
        level: Option<Level>,

        /// 各カテゴリ1問だけ生成し、ファイルには書き込まない
        #[clap(long)]
        dry_run: bool,

        /// 生成の試行回数の上限
        #[clap(long, default_value = "3")]
        max_attempts: usize,

        /// 読解の重複しきい値
        #[clap(long, default_value = "0.9")]
        reading_threshold: f64,

        /// 語彙・文法の重複しきい値
        #[clap(long, default_value = "0.8")]
        general_threshold: f64,

        /// 正解が同じ場合の重複しきい値
        #[clap(long, default_value = "0.6")]
        answer_match_threshold: f64,

        /// 読解本文の最低文字数
        #[clap(long, default_value = "150")]
        min_reading_chars: usize,
    },

    /// 未確認の問題を AI と一緒にレビューする
    Review {
        #[clap(long, value_enum, default_value = "N5")]
        level: Level,

        /// 1回に確認する問題数
        #[clap(long, default_value = "5")]
        batch_size: usize,
    },

    /// 題庫を手作業で整理する
    Manage {
        #[clap(long, value_enum, default_value = "N5")]
        level: Level,

        #[clap(subcommand)]
        action: ManageAction,
    },

    /// 利用可能なモデルとおすすめ度を表示する
    Models,

    /// 既定のプロンプトテンプレートを書き出す
    Templates {
        #[clap(long, default_value = "templates")]
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ManageAction {
    /// 指定した ID の問題を削除する
    Delete {
        /// カンマ区切りの ID
        #[clap(long)]
        ids: String,
    },
    /// すべての ID を 1 からの連番に振り直す
    Renumber,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .envファイルを読み込み
    dotenv().ok();

    let args = Args::parse();

    // ロガー初期化
    let level: log::LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| anyhow!("不正なログレベル: {}", args.log_level))?;
    SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|e| anyhow!("ロガーの初期化に失敗: {}", e))?;

    let mut console = Console::stdio();

    match &args.command {
        Command::Generate {
            level,
            dry_run,
            max_attempts,
            reading_threshold,
            general_threshold,
            answer_match_threshold,
            min_reading_chars,
        } => {
            let config = PipelineConfig {
                thresholds: DuplicateThresholds {
                    reading: *reading_threshold,
                    general: *general_threshold,
                    answer_match: *answer_match_threshold,
                },
                min_reading_chars: *min_reading_chars,
                max_attempts: *max_attempts,
                targets: if *dry_run {
                    TargetCounts::DRY_RUN
                } else {
                    TargetCounts::STANDARD
                },
                dry_run: *dry_run,
                ..Default::default()
            };
            let levels = match level {
                Some(level) => vec![*level],
                None => Level::ALL.to_vec(),
            };
            run_generate(&args, &config, &levels, &mut console).await
        }
        Command::Review { level, batch_size } => {
            let config = ReviewConfig {
                batch_size: *batch_size,
                ..Default::default()
            };
            run_review(&args, &config, *level, &mut console).await
        }
        Command::Manage { level, action } => run_manage(&args.data_dir, *level, action, &mut console).await,
        Command::Models => run_models(&args).await,
        Command::Templates { dir } => {
            save_default_templates(dir)?;
            info!("✅ 既定テンプレートを {} に書き出しました", dir.display());
            Ok(())
        }
    }
}

fn api_key(args: &Args) -> Result<String> {
    let key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .unwrap_or_default();
    if key.trim().is_empty() {
        bail!("API キーがありません。--api-key か GOOGLE_API_KEY を設定してください");
    }
    Ok(key.trim().to_string())
}

fn client(args: &Args) -> Result<GeminiClient> {
    let key = api_key(args)?;
    Ok(GeminiClient::new(
        &args.base_url,
        &key,
        Duration::from_secs(args.timeout),
    )?)
}

/// 使用するモデルを決める
///
/// 指定があればそれを使う。一覧が取れなければ既定モデルにする。
async fn select_model<R: BufRead, W: Write>(
    args: &Args,
    client: &GeminiClient,
    console: &mut Console<R, W>,
) -> Result<String> {
    if let Some(model) = &args.model {
        return Ok(model.clone());
    }

    info!("🔍 利用可能なモデルを取得中...");
    let models = match client.list_models().await {
        Ok(models) => models,
        Err(e) => {
            warn!("⚠️ モデル一覧の取得に失敗、{} を使います: {}", FALLBACK_MODEL, e);
            return Ok(FALLBACK_MODEL.to_string());
        }
    };

    if args.auto_model {
        let selected = catalog::auto_select(&models);
        info!("✅ 自動選択したモデル: {}", selected);
        return Ok(selected);
    }

    let names = catalog::generation_models(&models);
    if names.is_empty() {
        warn!("⚠️ generateContent に対応したモデルがありません。{} を使います", FALLBACK_MODEL);
        return Ok(FALLBACK_MODEL.to_string());
    }

    console.say(&format!("{:<4} | {:<40} | おすすめ度", "ID", "モデル名"))?;
    for (index, name) in names.iter().enumerate() {
        console.say(&catalog::format_row(index, name))?;
    }
    let index = console.choose_index("\n使用するモデルの ID を入力してください: ", names.len())?;
    info!("✅ 選択したモデル: {}", names[index]);
    Ok(names[index].clone())
}

async fn run_generate<R: BufRead, W: Write>(
    args: &Args,
    config: &PipelineConfig,
    levels: &[Level],
    console: &mut Console<R, W>,
) -> Result<()> {
    let client = client(args)?;
    let model_name = select_model(args, &client, console).await?;
    let model = client.with_model(&model_name);
    let templates = Templates::load(args.template_dir.as_deref())?;

    if config.dry_run {
        warn!("⚠️ ドライラン: 各カテゴリ1問だけ生成し、ファイルには書き込みません");
    }

    let pipeline = Pipeline::new(&model, &templates, config);
    let mut failed_saves = Vec::new();
    for &level in levels {
        let path = QuestionStore::path_for(&args.data_dir, level);
        let mut store = QuestionStore::load(level, path).await;
        let report = pipeline.run_level(&mut store).await;
        if !config.dry_run && report.accepted > 0 && !report.saved {
            failed_saves.push(level);
        }
    }

    if !failed_saves.is_empty() {
        let names: Vec<&str> = failed_saves.iter().map(Level::as_str).collect();
        error!("❌ 保存できなかったレベル: {}", names.join(", "));
    }
    info!("🎉 完了");
    Ok(())
}

async fn run_review<R: BufRead, W: Write>(
    args: &Args,
    config: &ReviewConfig,
    level: Level,
    console: &mut Console<R, W>,
) -> Result<()> {
    let path = QuestionStore::path_for(&args.data_dir, level);
    let mut store = QuestionStore::load(level, path).await;
    if store.is_empty() {
        bail!("{} に問題がありません", store.path.display());
    }

    let client = client(args)?;
    let model_name = select_model(args, &client, console).await?;
    let model = client.with_model(&model_name);
    let templates = Templates::load(args.template_dir.as_deref())?;

    Reviewer::new(&model, &templates, config)
        .run(&mut store, console)
        .await?;
    Ok(())
}

async fn run_manage<R: BufRead, W: Write>(
    data_dir: &Path,
    level: Level,
    action: &ManageAction,
    console: &mut Console<R, W>,
) -> Result<()> {
    let path = QuestionStore::path_for(data_dir, level);
    let mut store = QuestionStore::load(level, path).await;
    if store.is_empty() {
        bail!("{} に問題がありません", store.path.display());
    }
    info!("📊 {} 問を読み込みました", store.len());

    match action {
        ManageAction::Delete { ids } => {
            let requested = parse_id_list(ids);
            let removed = store.delete_ids(&requested);
            if removed.is_empty() {
                warn!("⚠️ 一致する ID がありませんでした");
                return Ok(());
            }
            store.save().await?;
            let removed: Vec<String> = removed.into_iter().collect();
            info!("🗑️ 削除しました: {}", removed.join(", "));
            info!("残り {} 問", store.len());
        }
        ManageAction::Renumber => {
            if !console.confirm("⚠️ すべての ID を 1 からの連番に振り直します。よろしいですか (y/n)? ")? {
                info!("中止しました");
                return Ok(());
            }
            store.renumber();
            store.save().await?;
            info!("✅ ID を 1〜{} に振り直しました", store.len());
        }
    }

    Ok(())
}

async fn run_models(args: &Args) -> Result<()> {
    let client = client(args)?;
    let models = client.list_models().await?;
    let names = catalog::generation_models(&models);
    if names.is_empty() {
        warn!("⚠️ generateContent に対応したモデルがありません");
        return Ok(());
    }

    println!("{:<4} | {:<40} | おすすめ度", "ID", "モデル名");
    for (index, name) in names.iter().enumerate() {
        println!("{}", catalog::format_row(index, name));
    }
    println!("\n自動選択の場合: {}", catalog::auto_select(&models));
    Ok(())
}
