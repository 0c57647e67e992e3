//! `ncf-indexer [PDF_PATH] [--force]`: chunk, embed and store the framework PDF.

use std::path::PathBuf;

use anyhow::{bail, Context};

use shiksha_backend::core;
use shiksha_backend::rag::IndexStatus;
use shiksha_backend::state::AppState;

struct Args {
    pdf_path: Option<PathBuf>,
    force: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        pdf_path: None,
        force: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--force" | "-f" => args.force = true,
            "--help" | "-h" => {
                println!("usage: ncf-indexer [PDF_PATH] [--force]");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown flag: {}", flag),
            path if args.pdf_path.is_none() => args.pdf_path = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument: {}", extra),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    let report = state
        .pipeline
        .index(args.pdf_path.as_deref(), args.force)
        .await
        .context("Indexing failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.status == IndexStatus::Error {
        bail!(
            "no chunks were created from {}",
            report.source
        );
    }
    Ok(())
}
