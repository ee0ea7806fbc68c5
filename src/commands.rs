use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use segdl::part::part_origins;
use segdl::{DownloadEngine, DownloadOutcome, DownloadPhase, EngineConfig, HttpClient, PartData, ReqwestClient};

use crate::cli::{Args, EventFormat};
use crate::utils::{default_state_path, get_filename_from_url, sanitize_filename};

pub async fn run_download(args: Args) -> Result<()> {
    let output = match args.output {
        Some(path) => path,
        None => args
            .download_dir
            .join(sanitize_filename(&get_filename_from_url(&args.url)?)),
    };
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create output directory")?;
        }
    }
    let state_path = args
        .state_file
        .unwrap_or_else(|| default_state_path(&output));

    let config = EngineConfig::new(args.url.clone(), output.clone(), args.split);
    let mut engine = DownloadEngine::new(config, ReqwestClient::new())?;

    if state_path.exists() {
        let mut file = fs::File::open(&state_path)
            .await
            .context(format!("Failed to open state file: {:?}", state_path))?;
        engine
            .load_state(&mut file)
            .await
            .context(format!("Failed to restore state from {:?}", state_path))?;
        info!(state = %state_path.display(), "resuming download");
    }

    let parts = engine
        .prepare()
        .await
        .context(format!("Failed to prepare download of {}", args.url))?
        .to_vec();

    match args.events {
        EventFormat::Bar => attach_progress_bars(&mut engine, &parts),
        EventFormat::Json => engine.on_progress(|event| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{}", line);
            }
        }),
    }

    let token = engine.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, pausing download");
            token.cancel();
        }
    });

    let result = engine.start().await;
    ctrl_c.abort();

    match result {
        Ok(DownloadOutcome::Completed) => {
            if state_path.exists() {
                fs::remove_file(&state_path)
                    .await
                    .context("Failed to remove state file")?;
            }
            info!(output = %output.display(), "saved");
            Ok(())
        }
        Ok(DownloadOutcome::Cancelled) => {
            save_state(&engine, &state_path).await?;
            info!(
                state = %state_path.display(),
                "download paused, run the same command again to resume"
            );
            Ok(())
        }
        Err(e) => {
            if let Err(save_err) = save_state(&engine, &state_path).await {
                warn!(error = %save_err, "could not save download state");
            }
            Err(e).context(format!("Failed to download {}", args.url))
        }
    }
}

async fn save_state<C: HttpClient>(engine: &DownloadEngine<C>, state_path: &Path) -> Result<()> {
    if engine.parts().is_none() {
        return Ok(());
    }
    let mut file = fs::File::create(state_path)
        .await
        .context(format!("Failed to create state file: {:?}", state_path))?;
    engine.save_state(&mut file).await?;
    Ok(())
}

fn attach_progress_bars<C: HttpClient>(engine: &mut DownloadEngine<C>, parts: &[PartData]) {
    let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");

    let origins = part_origins(parts);
    let bars: Vec<ProgressBar> = parts
        .iter()
        .zip(&origins)
        .enumerate()
        .map(|(index, (part, origin))| {
            let pb = multi_progress.add(ProgressBar::new(part.end - origin));
            pb.set_style(style.clone());
            pb.set_position(part.start - origin);
            pb.set_message(format!("part {}", index));
            pb
        })
        .collect();

    let merge_pb = multi_progress.add(ProgressBar::new(engine.file_size()));
    merge_pb.set_style(style);
    merge_pb.set_message("merge");

    engine.on_progress(move |event| match event.phase() {
        DownloadPhase::Downloading => {
            let Some(index) = event.part_index() else { return };
            if let (Some(pb), Some(origin)) = (bars.get(index), origins.get(index)) {
                pb.set_position(event.bytes_received().saturating_sub(*origin));
                if event.bytes_received() >= event.total_bytes() {
                    pb.finish();
                }
            }
        }
        DownloadPhase::Mixing => merge_pb.set_position(event.bytes_received()),
        DownloadPhase::Completed => merge_pb.finish_with_message("completed"),
    });
}
