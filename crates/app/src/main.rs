mod render;
mod repl;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use docchat_core::auth::CredentialStore;
use docchat_core::providers::openai::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
use docchat_core::{
    load_folder, load_uploads, CharacterNgramEmbedder, ChunkingConfig, ConversationConfig,
    Credentials, DocumentBoundary, EmbeddingProvider, OpenAiChat, OpenAiEmbeddings, PdfUpload,
    Session, SessionConfig, SqliteUserStore, UploadReport,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docchat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    api_base: String,

    /// API key sent as a bearer token
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Embedding model used for both documents and questions
    #[arg(long, env = "DOCCHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Vector size produced by the embedding model
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Chat model that writes the answers
    #[arg(long, env = "DOCCHAT_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling temperature for the chat model
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// SQLite database holding user accounts
    #[arg(long, env = "DOCCHAT_USER_DB", default_value = "app.db")]
    user_db: PathBuf,

    /// Embed with the local character n-gram embedder instead of the API
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long, env = "DOCCHAT_USERNAME")]
    username: String,

    #[arg(long, env = "DOCCHAT_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args)]
struct DocumentArgs {
    /// PDF file to upload; repeat for several files.
    #[arg(long = "pdf")]
    pdfs: Vec<PathBuf>,

    /// Folder searched recursively for PDFs.
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Maximum characters per chunk.
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters repeated between neighbouring chunks.
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,

    /// Number of passages handed to the model per question.
    #[arg(long, default_value = "4")]
    top_k: usize,

    /// Chunk each document separately instead of joining all text.
    #[arg(long, default_value_t = false)]
    isolate_documents: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Must match --password when given.
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Upload PDFs and answer one question with its reference texts.
    Ask {
        #[command(flatten)]
        login: LoginArgs,
        #[command(flatten)]
        documents: DocumentArgs,
        /// Question to answer
        #[arg(long)]
        query: String,
    },
    /// Upload PDFs and start an interactive conversation.
    Chat {
        #[command(flatten)]
        login: LoginArgs,
        #[command(flatten)]
        documents: DocumentArgs,
        /// Show reference texts under conversational answers too.
        #[arg(long, default_value_t = false)]
        cite_sources: bool,
        /// Do not rewrite follow-up questions before retrieval.
        #[arg(long, default_value_t = false)]
        no_condense: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docchat boot"
    );

    let users = SqliteUserStore::open(&cli.user_db)
        .with_context(|| format!("opening user database {}", cli.user_db.display()))?;

    match &cli.command {
        Command::Register {
            username,
            password,
            confirm_password,
        } => {
            if confirm_password.as_ref().is_some_and(|confirm| confirm != password) {
                bail!("passwords do not match");
            }
            if users.register_user(username, password)? {
                println!("You have successfully registered. You can now log in.");
            } else {
                bail!("username {username} already exists");
            }
        }
        Command::Ask {
            login: credentials,
            documents,
            query,
        } => {
            login(&users, credentials)?;
            let embedder = build_embedder(&cli)?;
            let model = build_model(&cli)?;
            let mut session = Session::new(
                embedder.as_ref(),
                model,
                session_config(documents, ConversationConfig::default(), false),
            );

            let uploads = collect_uploads(documents)?;
            report_upload(&mut std::io::stdout(), &session.upload(&uploads)?)?;

            for message in session.query_direct(query)? {
                print!("{}", render::render_message(message));
            }
        }
        Command::Chat {
            login: credentials,
            documents,
            cite_sources,
            no_condense,
        } => {
            login(&users, credentials)?;
            let embedder = build_embedder(&cli)?;
            let model = build_model(&cli)?;
            let conversation = ConversationConfig {
                condense_question: !no_condense,
                ..ConversationConfig::default()
            };
            let mut session = Session::new(
                embedder.as_ref(),
                model,
                session_config(documents, conversation, *cite_sources),
            );

            let uploads = collect_uploads(documents)?;
            report_upload(&mut std::io::stdout(), &session.upload(&uploads)?)?;

            let stdin = std::io::stdin();
            repl::run(&mut session, stdin.lock(), std::io::stdout())?;
        }
    }

    Ok(())
}

fn login(users: &SqliteUserStore, args: &LoginArgs) -> anyhow::Result<Credentials> {
    let credentials = users.verify_credentials(&args.username, &args.password)?;
    if !credentials.authenticated {
        bail!("invalid username or password");
    }

    info!(
        username = %args.username,
        premium = credentials.is_premium,
        "logged in"
    );
    Ok(credentials)
}

fn build_embedder(cli: &Cli) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    if cli.offline {
        return Ok(Box::new(CharacterNgramEmbedder::default()));
    }

    if cli.api_key.is_none() {
        warn!("no api key configured; requests go out unauthenticated");
    }
    Ok(Box::new(OpenAiEmbeddings::new(
        &cli.api_base,
        cli.api_key.clone(),
        &cli.embedding_model,
        cli.embedding_dimensions,
    )?))
}

fn build_model(cli: &Cli) -> anyhow::Result<OpenAiChat> {
    Ok(OpenAiChat::new(
        &cli.api_base,
        cli.api_key.clone(),
        &cli.chat_model,
        cli.temperature,
    )?)
}

fn session_config(
    documents: &DocumentArgs,
    conversation: ConversationConfig,
    cite_conversational_sources: bool,
) -> SessionConfig {
    SessionConfig {
        chunking: ChunkingConfig {
            chunk_size: documents.chunk_size,
            chunk_overlap: documents.chunk_overlap,
            ..ChunkingConfig::default()
        },
        boundary: if documents.isolate_documents {
            DocumentBoundary::Isolate
        } else {
            DocumentBoundary::Concatenate
        },
        top_k: documents.top_k,
        conversation,
        cite_conversational_sources,
        ..SessionConfig::default()
    }
}

fn collect_uploads(documents: &DocumentArgs) -> anyhow::Result<Vec<PdfUpload>> {
    let mut uploads = load_uploads(&documents.pdfs)?;
    if let Some(folder) = &documents.folder {
        uploads.extend(load_folder(folder)?);
    }

    if uploads.is_empty() {
        bail!("pass at least one --pdf or a --folder containing pdfs");
    }
    Ok(uploads)
}

pub(crate) fn report_upload<W: Write>(output: &mut W, report: &UploadReport) -> std::io::Result<()> {
    for skipped in &report.skipped {
        warn!(document = %skipped.name, reason = %skipped.reason, "skipped pdf");
        writeln!(output, "skipped {}: {}", skipped.name, skipped.reason)?;
    }

    writeln!(
        output,
        "{} chunks indexed from {} document(s)",
        report.chunk_count,
        report.documents.len()
    )
}
