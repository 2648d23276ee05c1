use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ragview::chat::{Role, SessionSnapshot};
use ragview::preview::PreviewSummary;
use ragview::{
    ConversationSession, IngestResult, IngestionCoordinator, PreviewRenderer, PreviewState,
    SettingsStore, SubmitOutcome,
};
use ragview_client::{HttpBackend, UploadFile};
use snafu::{OptionExt, ResultExt, Whatever, whatever};

#[derive(Parser)]
#[command(name = "ragview")]
#[command(about = "Ask questions about ingested documents and preview cited sources", long_about = None)]
struct Cli {
    /// Settings file; defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured service URL
    #[arg(long, global = true)]
    api: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and print the answer with its citations
    Ask {
        question: String,
        /// Uploads a file first and sends it along with the question
        #[arg(long)]
        attach: Option<PathBuf>,
        /// Opens the preview of citation N of the answer
        #[arg(long, value_name = "N")]
        open: Option<u32>,
    },
    /// Upload files for indexing
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the effective settings
    Config {
        /// Writes the effective settings back to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Whatever> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let store = match cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::load(),
    };
    let mut settings = (*store.settings()).clone();
    if let Some(api) = cli.api {
        settings.api_base_url = api;
        settings = settings.normalized();
    }

    match cli.command {
        Command::Config { save } => {
            let rendered = serde_json::to_string_pretty(&settings)
                .whatever_context("failed to render settings")?;
            println!("{rendered}");
            if save {
                store
                    .update(settings)
                    .whatever_context("failed to save settings")?;
                println!("saved to {}", store.config_path().display());
            }
        }
        Command::Upload { files } => {
            let backend = Arc::new(
                HttpBackend::new(settings.to_backend_config())
                    .whatever_context("failed to build http client")?,
            );
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(read_upload(path).await?);
            }
            let result = IngestionCoordinator::new(backend).upload(uploads).await;
            println!("{}", result.status_line());
            if let IngestResult::Failed { .. } = result {
                whatever!("upload did not complete");
            }
        }
        Command::Ask {
            question,
            attach,
            open,
        } => {
            let backend = Arc::new(
                HttpBackend::new(settings.to_backend_config())
                    .whatever_context("failed to build http client")?,
            );
            let locator = settings.locator();

            let attachment = match attach {
                Some(path) => {
                    let upload = read_upload(&path).await?;
                    let result = IngestionCoordinator::new(backend.clone())
                        .upload(vec![upload])
                        .await;
                    println!("{}", result.status_line());
                    Some(
                        result
                            .attachment(&locator)
                            .whatever_context("attachment upload did not complete")?,
                    )
                }
                None => None,
            };

            let previewer =
                PreviewRenderer::new(backend.clone(), locator, settings.pdf_render_scale);
            let session = ConversationSession::new(backend, previewer);
            let outcome = session.submit(&question, attachment).await;
            print_transcript(&session.snapshot());

            match (open, outcome) {
                (Some(ordinal), SubmitOutcome::Answered { assistant_turn, .. }) => {
                    let state = session
                        .open_citation(assistant_turn, ordinal)
                        .await
                        .whatever_context("cannot open citation")?;
                    print_preview(&state);
                    session.close_preview().await;
                }
                (_, SubmitOutcome::Ignored) => whatever!("nothing to ask"),
                _ => {}
            }
        }
    }

    Ok(())
}

async fn read_upload(path: &Path) -> Result<UploadFile, Whatever> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_whatever_context(|| format!("{} has no usable file name", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_whatever_context(|_| format!("failed to read {}", path.display()))?;
    Ok(UploadFile::new(name, bytes))
}

fn print_transcript(snapshot: &SessionSnapshot) {
    for turn in &snapshot.turns {
        let speaker = match turn.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{speaker}: {}", turn.content);
        if let Some(attachment) = &turn.attachment {
            println!("  attached {}", attachment.url);
        }
        for citation in &turn.citations {
            match citation.score_label() {
                Some(score) => println!("  {} score {score}", citation.label()),
                None => println!("  {}", citation.label()),
            }
        }
    }
}

fn print_preview(state: &PreviewState) {
    match state {
        PreviewState::Ready { summary, .. } => match summary {
            PreviewSummary::Text { content } => println!("{content}"),
            PreviewSummary::Image { width, height } => println!("image {width}x{height}"),
            PreviewSummary::Pdf {
                page_number,
                page_count,
                width,
                height,
            } => println!("page {page_number} of {page_count}, rendered at {width}x{height}"),
            PreviewSummary::Audio {
                duration,
                position,
                sample_rate,
                channels,
            } => println!(
                "audio {:.2}s ({sample_rate} Hz, {channels} ch), cued at {:.2}s",
                duration.as_secs_f64(),
                position.as_secs_f64()
            ),
            PreviewSummary::Unsupported { file_type, content } => {
                println!("no preview for '{file_type}' files");
                if !content.is_empty() {
                    println!("{content}");
                }
            }
        },
        PreviewState::Failed { kind, message, .. } => {
            println!("preview failed ({kind:?}): {message}");
        }
        PreviewState::Loading(_) | PreviewState::Closed => println!("preview unavailable"),
    }
}
