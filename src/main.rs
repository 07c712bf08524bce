//! Application entry point: Talenta audio workspace CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Build the credential provider and the [`HttpStore`].
//! 5. Create a current-thread [`tokio`] runtime (the cpal stream must stay
//!    on the thread that opened it).
//! 6. Open the entity in a [`ReconciliationController`] and run the command.
//!
//! `config` only edits the settings file and returns after step 3.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use talenta_audio::{
    config::{ApiEdit, AppConfig, AppPaths},
    playlist::{EntryKind, SilentPlayer},
    reconcile::{Notification, ReconciliationController},
    recorder::{Blob, CpalBackend, FinishedRecording, MimeType, PreviewUrls, Recorder},
    remote::{CredentialProvider, HttpStore, RemoteStore, StaticToken, TokenFile},
    segment::{EntityId, MetadataUpdate, Provenance, SegmentId},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "talenta-audio", version, about = "Record, arrange and publish Talenta audio segments")]
struct Cli {
    /// Settings file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print an entry and its playlist.
    Show { id: String },

    /// Record a new segment from the default microphone.
    Record {
        id: String,
        /// Stop after this many seconds (otherwise Ctrl-C stops).
        #[arg(long)]
        secs: Option<u64>,
        /// Save the recording to the server right away.
        #[arg(long)]
        upload: bool,
    },

    /// Append audio files as new segments.
    Upload {
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Swap two segments (0-based positions in the segment list).
    Reorder { id: String, from: usize, to: usize },

    /// Delete a saved segment.
    Delete {
        id: String,
        segment: String,
        #[arg(long)]
        yes: bool,
    },

    /// Publish the entry, optionally merging all tracks into one file.
    Publish {
        id: String,
        #[arg(long)]
        merge: bool,
        #[arg(long)]
        yes: bool,
    },

    /// Edit title, description, tags or category.
    Meta {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replaces the tag set; repeat for several tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        category: Option<String>,
    },

    /// Show or change the API connection settings.
    Config {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Bearer token to store; pass an empty string to remove it.
        #[arg(long)]
        token: Option<String>,
    },
}

impl Command {
    fn entity_id(&self) -> Option<EntityId> {
        let id = match self {
            Command::Show { id }
            | Command::Record { id, .. }
            | Command::Upload { id, .. }
            | Command::Reorder { id, .. }
            | Command::Delete { id, .. }
            | Command::Publish { id, .. }
            | Command::Meta { id, .. } => id,
            Command::Config { .. } => return None,
        };
        Some(EntityId::from(id.as_str()))
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("reading {}", path.display()))?,
        // never overwrite a settings file that failed to parse
        None if matches!(cli.command, Command::Config { .. }) => {
            AppConfig::load().context("reading settings")?
        }
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };
    let paths = AppPaths::new();

    if let Command::Config {
        base_url,
        timeout_secs,
        token,
    } = cli.command
    {
        let edit = ApiEdit {
            base_url,
            timeout_secs,
            token,
        };
        return configure(config, edit, cli.config.as_deref(), &paths);
    }

    // 4. Remote store
    let credentials: Arc<dyn CredentialProvider> = match config.api.token.as_deref() {
        Some(token) if !token.trim().is_empty() => Arc::new(StaticToken::new(token)),
        _ => Arc::new(TokenFile::new(paths.token_file.clone())),
    };
    let remote: Arc<dyn RemoteStore> = Arc::new(HttpStore::from_config(&config.api, credentials));

    // 5. Runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 6. Command
    rt.block_on(run(cli.command, config, paths, remote))
}

async fn run(command: Command, config: AppConfig, paths: AppPaths, remote: Arc<dyn RemoteStore>) -> Result<()> {
    // destructive commands are confirmed before anything is loaded
    match &command {
        Command::Delete { segment, yes, .. } if !yes => {
            if !confirm(&format!("Delete segment {segment}? This cannot be undone."))? {
                return Ok(());
            }
        }
        Command::Publish { merge: true, yes, .. } if !yes => {
            if !confirm("Publish and merge all tracks into one file? This cannot be undone.")? {
                return Ok(());
            }
        }
        _ => {}
    }

    let Some(id) = command.entity_id() else {
        bail!("command does not address an audio entry");
    };
    let previews = PreviewUrls::new();
    let controller = ReconciliationController::open(
        remote,
        &id,
        Box::new(SilentPlayer),
        previews.clone(),
        &config,
    )
    .await?;
    let mut notifications = controller.subscribe();

    match command {
        Command::Show { .. } => {}
        Command::Record { secs, upload, .. } => {
            let clip = record(&config, previews, secs).await?;
            let local_copy = save_local_copy(&paths.recordings_dir, &clip)?;
            let local_id = controller.add_pending(clip.blob, clip.preview_url, Provenance::Recorded);
            println!("Recorded {:.1}s, kept at {}", clip.elapsed.as_secs_f64(), local_copy.display());

            if upload {
                let id = controller.persist_pending(local_id).await?;
                println!("Saved as segment {id}");
                if let Err(e) = std::fs::remove_file(&local_copy) {
                    log::warn!("could not remove {}: {e}", local_copy.display());
                }
            }
        }
        Command::Upload { files, .. } => {
            for file in &files {
                let blob = read_blob(file)?;
                controller.add_blob(blob, Provenance::Uploaded);
            }
            let ids = controller.persist_all_pending().await?;
            println!("Saved {} segment(s)", ids.len());
        }
        Command::Reorder { from, to, .. } => {
            controller.reorder(from, to).await?;
        }
        Command::Delete { segment, .. } => {
            controller.delete(&SegmentId(segment)).await?;
        }
        Command::Publish { merge, .. } => {
            controller.publish(merge).await?;
        }
        Command::Meta {
            title,
            description,
            tags,
            category,
            ..
        } => {
            let update = MetadataUpdate {
                title,
                description,
                tags: (!tags.is_empty()).then(|| tags.into_iter().collect()),
                category,
            };
            if update.is_empty() {
                bail!("nothing to change; pass --title, --description, --tag or --category");
            }
            controller.update_metadata(update).await?;
        }
        Command::Config { .. } => {}
    }

    while let Ok(note) = notifications.try_recv() {
        log::debug!("notification: {note:?}");
        if note == Notification::RolledBack {
            println!("Local changes were replaced by the saved state.");
        }
    }
    print_entity(&controller);
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

fn configure(mut config: AppConfig, edit: ApiEdit, explicit: Option<&Path>, paths: &AppPaths) -> Result<()> {
    let path = explicit.unwrap_or(paths.settings_file.as_path());
    if !edit.is_empty() {
        config.api.apply(edit);
        let saved = match explicit {
            Some(path) => config.save_to(path),
            None => config.save(),
        };
        saved.with_context(|| format!("writing {}", path.display()))?;
        log::info!("Saved settings to {}", path.display());
    }

    println!("settings: {}", path.display());
    println!("  base_url:     {}", config.api.base_url);
    println!("  timeout_secs: {}", config.api.timeout_secs);
    let token = match &config.api.token {
        Some(_) => "set".to_string(),
        None => format!("from {}", paths.token_file.display()),
    };
    println!("  token:        {token}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

async fn record(config: &AppConfig, previews: PreviewUrls, secs: Option<u64>) -> Result<FinishedRecording> {
    let mut recorder = Recorder::new(CpalBackend::new(), config.recorder.clone(), previews);
    recorder.start()?;

    let limit = Duration::from_secs(secs.unwrap_or(config.recorder.max_recording_secs));
    let mut ticker = tokio::time::interval(recorder.chunk_interval());
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    eprintln!("Recording… press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed = recorder.tick()?;
                eprint!("\r● {:>4}s", elapsed.as_secs());
                if elapsed >= limit {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }
    eprintln!();

    recorder.stop()?;
    recorder.take_clip().context("recording produced no clip")
}

fn save_local_copy(dir: &Path, clip: &FinishedRecording) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = dir.join(format!("recording-{stamp}.{}", clip.blob.mime().file_extension()));
    std::fs::write(&path, clip.blob.bytes()).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn read_blob(path: &Path) -> Result<Blob> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime = path
        .extension()
        .and_then(|e| e.to_str())
        .map(MimeType::from_extension)
        .unwrap_or_default();
    Ok(Blob::new(bytes, mime))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_entity(controller: &ReconciliationController) {
    let ws = controller.workspace();
    let ws = match ws.lock() {
        Ok(ws) => ws,
        Err(poisoned) => poisoned.into_inner(),
    };
    let meta = ws.metadata();

    println!("{} [{}]  {}", ws.id(), ws.status().label(), meta.title);
    if !meta.description.is_empty() {
        println!("  {}", meta.description);
    }
    if !meta.tags.is_empty() {
        let tags: Vec<&str> = meta.tags.iter().map(String::as_str).collect();
        println!("  tags: {}", tags.join(", "));
    }
    if let Some(category) = &meta.category {
        println!("  category: {category}");
    }

    let segments = ws.snapshot();
    for (position, entry) in ws.sequencer().sources().iter().enumerate() {
        match &entry.kind {
            EntryKind::Main => println!("  {position:>3}  main      {}", entry.url),
            EntryKind::Segment { order, pending } => {
                let label = segments
                    .get(*order)
                    .and_then(|s| s.remote_id())
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "(unsaved)".into());
                let mark = if *pending { "*" } else { " " };
                println!("  {position:>3}{mark} #{order:<3} {label:<24} {}", entry.url);
            }
        }
    }
}
