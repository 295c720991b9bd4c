use anyhow::Context;
use clap::Parser;
use fuel_vision::cli::{Cli, Commands};
use fuel_vision::config::Config;
use fuel_vision::labeling::{self, ImageViewer, LabelSession, LabelStore, NoViewer, SystemViewer, TerminalPrompt};
use fuel_vision::report::ReportWriter;
use fuel_vision::runner::BatchRunner;
use fuel_vision::scanner::{ImageSource, MissingDirPolicy};
use fuel_vision::{logging, server, vision};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Could not load .env file: {e}");
        }
    }

    // ラベリングは既定で labeling.log にも記録する
    let log_file = match (&cli.log_file, &cli.command) {
        (Some(path), _) => Some(path.clone()),
        (None, Commands::Label { .. }) => Some(PathBuf::from("labeling.log")),
        _ => None,
    };
    logging::init(cli.verbose, log_file.as_deref());

    let mut config = Config::load().context("設定の読み込みに失敗")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    match cli.command {
        Commands::Run { folder, output, question, extensions, no_progress } => {
            println!("⛽ fuel-vision - バッチ解析\n");

            if !extensions.is_empty() {
                config.extensions = extensions;
            }
            let question = question.unwrap_or_else(|| config.question.clone());

            let service = vision::connect(&config)?;
            let source = ImageSource::new(config.extensions.clone());

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\n中断要求を受け付けました。処理中の画像が終わり次第停止します");
                    ctrl_c.cancel();
                }
            });

            let mut runner = BatchRunner::new(source, service, question)
                .with_cancellation(cancel)
                .with_progress(!no_progress);
            let report = runner.run(&folder).await?;

            println!("\nSummary:");
            println!("  Total images processed: {}", report.total());
            println!("  Successful: {}", report.succeeded());
            println!("  Failed: {}", report.failed());

            match ReportWriter::new(&output).write(&report) {
                Ok(path) => println!("\n✔ 結果を保存: {}", path.display()),
                Err(e) => {
                    // 保存できなくても結果は失わないよう標準出力へ
                    println!("\n{}", report.to_json()?);
                    return Err(e.into());
                }
            }
        }

        Commands::Label { folder, labels, no_viewer } => {
            let source = ImageSource::new(config.extensions.clone())
                .with_missing_dir(MissingDirPolicy::Create);
            let images = source.list(&folder)?;
            let session = LabelSession::new(&folder, images, LabelStore::new(labels))?;

            // Ctrl-C: 入力待ちを抜けられないのでここで保存して終了する
            let store = session.store().clone();
            let handle = session.labels_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("\n保存して終了します...");
                    let labels = labeling::lock_labels(&handle).clone();
                    if let Err(e) = store.save(&labels) {
                        tracing::error!("Error saving labels: {}", e);
                    }
                    std::process::exit(130);
                }
            });

            let viewer: Box<dyn ImageViewer + Send> = if no_viewer {
                Box::new(NoViewer)
            } else {
                Box::new(SystemViewer)
            };

            let summary = tokio::task::spawn_blocking(move || {
                session.run(&mut TerminalPrompt, viewer.as_ref())
            })
            .await??;

            println!("✔ 保存しました: {}", summary.snapshot.display());
        }

        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let service = vision::connect(&config)?;
            server::serve(&config, service).await?;
        }

        Commands::Config { set_api_key, set_model, set_endpoint, show } => {
            // 環境変数の値を書き込まないよう、ファイルの内容だけを編集する
            let config_path = Config::config_path()?;
            let mut stored = Config::load_from(&config_path)?;
            let mut changed = false;

            if let Some(key) = set_api_key {
                stored.api_key = Some(key.clone());
                config.api_key = Some(key);
                changed = true;
            }
            if let Some(model) = set_model {
                stored.model = model.clone();
                config.model = model;
                changed = true;
            }
            if let Some(endpoint) = set_endpoint {
                stored.endpoint = endpoint.clone();
                config.endpoint = endpoint;
                changed = true;
            }

            if changed {
                stored.save_to(&config_path)?;
                println!("✔ 設定を保存しました: {}", config_path.display());
            }

            if show || !changed {
                println!("設定:");
                println!("  バックエンド: {}", config.backend);
                println!("  モデル: {}", config.model);
                println!("  エンドポイント: {}", config.endpoint);
                println!("  APIキー: {}", if config.api_key.is_some() { "設定済み" } else { "未設定" });
                println!("  質問: {}", config.question);
                println!("  拡張子: {}", config.extensions.join(", "));
                println!("  最大出力長: {}", config.generation.max_output_length);
                println!("  画素数: {} - {}", config.min_pixels, config.max_pixels);
                println!("  サーバ: {}:{}", config.server.host, config.server.port);
            }
        }
    }

    Ok(())
}
