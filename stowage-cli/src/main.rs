use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use stowage_core::StorageClient;
use stowage_engine::{BatchStore, SourceFile, UploadEngine, UploadNotice, UploadStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Upload { files: Vec<String>, dest: String },
    Help,
}

fn parse_cli<I>(args: I) -> anyhow::Result<CliCommand>
where
    I: IntoIterator<Item = String>,
{
    let mut files = Vec::new();
    let mut dest = "/".to_string();
    let mut iter = args.into_iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dest" | "-d" => {
                dest = iter.next().context("--dest requires a value")?;
            }
            "--help" | "-h" => return Ok(CliCommand::Help),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            _ => files.push(arg),
        }
    }
    Ok(CliCommand::Upload { files, dest })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let (files, dest) = match parse_cli(std::env::args())? {
        CliCommand::Help => {
            println!("Usage: stowage-cli [--dest <PATH>] <FILE>...");
            println!("  --dest, -d <PATH>   Destination directory (default \"/\")");
            return Ok(());
        }
        CliCommand::Upload { files, dest } => (files, dest),
    };
    if files.is_empty() {
        anyhow::bail!("no files given; see --help");
    }

    let token = std::env::var("STOWAGE_API_TOKEN").context("STOWAGE_API_TOKEN is not set")?;
    let client = match std::env::var("STOWAGE_API_BASE") {
        Ok(base) => StorageClient::with_base_url(&base, token)
            .with_context(|| format!("invalid STOWAGE_API_BASE: {base}"))?,
        Err(_) => StorageClient::new(token)?,
    };

    let mut sources = Vec::with_capacity(files.len());
    for file in &files {
        let source = SourceFile::from_path(Path::new(file))
            .await
            .with_context(|| format!("cannot read {file}"))?;
        sources.push(source);
    }

    let store = Arc::new(BatchStore::new());
    let mut engine = UploadEngine::new(client, Arc::clone(&store));
    let printer = engine.take_notices().map(|mut notices| {
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                print_notice(&notice);
            }
        })
    });

    let report = engine.start_upload(sources, &dest).await?;
    drop(engine);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if let Some(snapshot) = store.snapshot() {
        for file in &snapshot.files {
            match file.status {
                UploadStatus::Success => eprintln!("[stowage] ok: {}", file.name),
                UploadStatus::Error | UploadStatus::Cancelled => eprintln!(
                    "[stowage] failed: {} ({})",
                    file.name,
                    file.error.as_deref().unwrap_or("unknown error")
                ),
                _ => {}
            }
        }
    }
    eprintln!(
        "[stowage] done: {} uploaded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    );
    if report.failed > 0 {
        anyhow::bail!("{} upload(s) failed", report.failed);
    }
    Ok(())
}

fn print_notice(notice: &UploadNotice) {
    match notice {
        UploadNotice::OversizedSkipped { names, limit } => {
            for name in names {
                eprintln!("[stowage] skipped {name}: larger than {limit} bytes");
            }
        }
        UploadNotice::BatchFinished { succeeded, failed } => {
            eprintln!("[stowage] batch finished: {succeeded} ok, {failed} failed");
        }
        UploadNotice::SchedulerFailure { message } => {
            eprintln!("[stowage] warning: {message}");
        }
    }
}
