//! CLI binary for docchat.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ChatConfig` / `ModelSelection` and prints results.

mod repl;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Password;
use docchat::extract::{self, InputKind, TextSplitter};
use docchat::{
    Assistant, ChatConfig, ChatProgressCallback, Language, ModelSelection, Notice, NoticeLevel,
    ProgressCallback, Session,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

pub(crate) fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
pub(crate) fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
pub(crate) fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
pub(crate) fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
pub(crate) fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
pub(crate) fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Shows a spinner while a provider call is in flight and a one-line
/// summary when it ends.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl ChatProgressCallback for CliProgressCallback {
    fn on_request_start(&self, provider: &str) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix(provider.to_string());
        bar.set_message("thinking…");
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(old) = slot.replace(bar) {
                old.finish_and_clear();
            }
        }
    }

    fn on_reply(&self, provider: &str, chars: usize, elapsed_ms: u64) {
        if let Some(bar) = self.take_bar() {
            bar.finish_and_clear();
        }
        eprintln!(
            "{} {}  {}  {}",
            green("✓"),
            provider,
            dim(&format!("{chars} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        );
    }

    fn on_fallback(&self, provider: &str, _notice: &Notice) {
        if let Some(bar) = self.take_bar() {
            bar.finish_and_clear();
        }
        eprintln!("{} {}  {}", red("✗"), provider, dim("using fallback reply"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Chat about a paper with a local model
  docchat chat --provider ollama --model llama3 --pdf paper.pdf

  # Ask one question with OpenAI and export the exchange
  docchat ask --provider openai --model gpt-4o --pdf paper.pdf \
      "What problem does the paper solve?" --export answer.html

  # Questions about a scanned page (OCR), answered in Chinese
  docchat ask --provider deepseek --image scan.png --language zh "总结这一页"

  # List locally installed models
  docchat models

  # Print extracted text, split into 1000-char chunks
  docchat extract paper.pdf --chunks

CHAT COMMANDS:
  /reset                 Clear the conversation
  /mode chat|latex       Switch between chat and the LaTeX editor
  /export <file>         Save the conversation (.html or .pdf)
  /models                List local Ollama models
  /transcript            Print the conversation so far
  /analyze               Structured analysis of the loaded documents
  /verify                Check the last answer against the documents
  /help, /exit

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  DEEPSEEK_API_KEY        DeepSeek API key
  DOCCHAT_PROVIDER        Default provider (ollama, openai, deepseek)
  DOCCHAT_MODEL           Default model name
  DOCCHAT_LANGUAGE        Prompt language (en, zh)
  DOCCHAT_RESOURCES       Directory with prompts.toml / providers.toml overrides
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides -v / -q

EXTERNAL TOOLS:
  libpdfium      PDF text extraction
  tesseract      Image OCR (language packs: eng, chi_sim)
  wkhtmltopdf    PDF export
  ollama         Local models
"#;

/// Chat with PDF documents and images through local or hosted LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "docchat",
    version,
    about = "Chat with PDF documents and images through local or hosted LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCCHAT_QUIET")]
    quiet: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "DOCCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Provider call timeout in seconds.
    #[arg(long, global = true, env = "DOCCHAT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Prompt language: en, zh.
    #[arg(long, global = true, env = "DOCCHAT_LANGUAGE", default_value = "en")]
    language: Language,

    /// Directory with prompts.toml / providers.toml overrides.
    #[arg(long, global = true, env = "DOCCHAT_RESOURCES")]
    resources: Option<PathBuf>,

    /// Ollama server URL.
    #[arg(long, global = true, env = "DOCCHAT_OLLAMA_ENDPOINT")]
    ollama_endpoint: Option<String>,

    /// Height in pixels of the chat view written by /view.
    #[arg(long, global = true, env = "DOCCHAT_CHAT_HEIGHT", default_value_t = 1024)]
    chat_height: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat session.
    Chat(ChatArgs),
    /// Ask one question and print the answer.
    Ask(AskArgs),
    /// List locally installed Ollama models.
    Models,
    /// Print the text of a PDF or image.
    Extract(ExtractArgs),
}

/// Provider, model and documents shared by `chat` and `ask`.
#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// Provider: ollama, openai, deepseek.
    #[arg(long, env = "DOCCHAT_PROVIDER", default_value = "ollama")]
    provider: String,

    /// Model name. Defaults to the provider's first listed model.
    #[arg(long, env = "DOCCHAT_MODEL", default_value = "")]
    model: String,

    /// PDF to chat about (path or URL). Repeatable.
    #[arg(long)]
    pdf: Vec<String>,

    /// Image to OCR and chat about (path or URL). Repeatable.
    #[arg(long)]
    image: Vec<String>,

    /// Send the conversation so far with each question.
    #[arg(long, env = "DOCCHAT_HISTORY")]
    history: bool,

    /// Sampling temperature for hosted providers (0.0–2.0).
    #[arg(long, env = "DOCCHAT_TEMPERATURE")]
    temperature: Option<f32>,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Args, Debug)]
struct AskArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// The question.
    question: String,

    /// Also write the exchange to this file (.html or .pdf).
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// PDF or image (path or URL).
    input: String,

    /// Treat the input as an image regardless of its extension.
    #[arg(long)]
    image: bool,

    /// Print the text split into chunks.
    #[arg(long)]
    chunks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight the spinner, so the default is WARN.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Chat(args) => {
            let (assistant, selection, documents) = prepare(&cli, &args.session).await?;
            repl::ChatRepl::new(assistant, selection, documents)?
                .run()
                .await
        }
        Command::Ask(args) => run_ask(&cli, args).await,
        Command::Models => {
            let assistant = Assistant::new(build_config(&cli, None)?)
                .context("Failed to load resources")?;
            for name in assistant.list_local_models().await {
                println!("{name}");
            }
            Ok(())
        }
        Command::Extract(args) => run_extract(&cli, args).await,
    }
}

/// Map CLI args to `ChatConfig`.
fn build_config(cli: &Cli, session: Option<&SessionArgs>) -> Result<ChatConfig> {
    let mut builder = ChatConfig::builder()
        .api_timeout_secs(cli.api_timeout)
        .language(cli.language)
        .chat_height(cli.chat_height);

    if let Some(ref dir) = cli.resources {
        builder = builder.resource_dir(dir);
    }
    if let Some(ref url) = cli.ollama_endpoint {
        builder = builder.ollama_endpoint(url.clone());
    }
    if let Some(args) = session {
        builder = builder.use_history(args.history);
        if let Some(t) = args.temperature {
            builder = builder.temperature(t);
        }
    }
    if !cli.quiet && !cli.no_progress && io::stderr().is_terminal() {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Build the assistant, resolve the selection (prompting for a missing
/// key), and extract the requested documents.
async fn prepare(
    cli: &Cli,
    args: &SessionArgs,
) -> Result<(Assistant, ModelSelection, Vec<String>)> {
    let config = build_config(cli, Some(args))?;
    let assistant = Assistant::new(config).context("Failed to load resources")?;

    let mut selection = ModelSelection::new(&args.provider, &args.model);
    if selection.provider.is_none() {
        print_notice(&Notice::warning(format!(
            "Unknown provider '{}'. Choose ollama, openai or deepseek.",
            args.provider
        )));
    }
    if let Some(key) = prompt_for_credential(&assistant, &selection)? {
        selection = selection.with_credential(key);
    }

    let mut documents = Vec::new();
    for pdf in &args.pdf {
        let (text, notice) = extract::document_text(pdf, assistant.config()).await;
        report_loaded(pdf, &text, notice, cli.quiet);
        documents.push(text);
    }
    for image in &args.image {
        let (text, notice) = extract::image_text(image, assistant.config()).await;
        report_loaded(image, &text, notice, cli.quiet);
        documents.push(text);
    }

    Ok((assistant, selection, documents))
}

/// Ask for a hosted API key when neither the selection nor the
/// environment supplies one. Non-interactive runs skip the prompt.
pub(crate) fn prompt_for_credential(
    assistant: &Assistant,
    selection: &ModelSelection,
) -> Result<Option<String>> {
    if !assistant.needs_credential(selection) || !io::stdin().is_terminal() {
        return Ok(None);
    }
    let env = selection
        .provider
        .and_then(|k| assistant.credential_env(k))
        .unwrap_or("API key");
    let key = Password::new()
        .with_prompt(format!("{} (not set, enter key or leave empty)", env))
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    Ok(Some(key).filter(|k| !k.trim().is_empty()))
}

pub(crate) fn report_loaded(source: &str, text: &str, notice: Option<Notice>, quiet: bool) {
    match notice {
        Some(n) => print_notice(&n),
        None if !quiet => eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold(source),
            dim(&format!("{} chars", text.chars().count()))
        ),
        None => {}
    }
}

pub(crate) fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Error => eprintln!("{} {}", red("✗"), red(&notice.message)),
        NoticeLevel::Warning => eprintln!("{} {}", yellow("⚠"), notice.message),
        NoticeLevel::Info => eprintln!("{} {}", cyan("ℹ"), notice.message),
    }
}

pub(crate) fn print_notices(session: &mut Session) {
    for notice in session.drain_notices() {
        print_notice(&notice);
    }
}

/// Join the non-empty document texts.
pub(crate) fn combined_text(documents: &[String]) -> Option<String> {
    let joined = documents
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!joined.is_empty()).then_some(joined)
}

async fn run_ask(cli: &Cli, args: &AskArgs) -> Result<()> {
    let (assistant, selection, documents) = prepare(cli, &args.session).await?;
    let text = combined_text(&documents);

    let mut session = Session::new();
    session.initialize();
    let exchange = assistant
        .submit(&mut session, &args.question, &selection, text.as_deref())
        .await;
    print_notices(&mut session);

    let Some(exchange) = exchange else {
        anyhow::bail!("The question is empty");
    };
    println!("{}", exchange.assistant.content);

    if let Some(ref path) = args.export {
        docchat::write_export(path, session.transcript())
            .await
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if exchange.fallback {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_extract(cli: &Cli, args: &ExtractArgs) -> Result<()> {
    let config = build_config(cli, None)?;
    let kind = if args.image {
        InputKind::Image
    } else {
        InputKind::from_path(&args.input)
    };

    let extracted = extract::extract(&args.input, kind, &config)
        .await
        .with_context(|| format!("Failed to extract text from {}", args.input))?;

    if !args.chunks {
        println!("{}", extracted.text);
    } else {
        let chunks = TextSplitter::default().split(&extracted.text);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            println!(
                "{}",
                dim(&format!(
                    "── chunk {}/{} ({} chars) ──",
                    i + 1,
                    total,
                    chunk.chars().count()
                ))
            );
            println!("{chunk}");
        }
    }

    if !cli.quiet {
        let pages = extracted
            .page_count
            .map(|p| format!("{p} pages, "))
            .unwrap_or_default();
        eprintln!(
            "{} {}{} chars",
            green("✔"),
            pages,
            extracted.text.chars().count()
        );
    }
    Ok(())
}
