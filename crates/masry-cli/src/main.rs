//! masry - terminal chat client for the Masry assistant

mod commands;
mod config;
mod interrupt;
mod ui;
mod utils;

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use masry_ai::Model;
use masry_core::{
    AppState, Applied, Error as CoreError, ExchangeEvent, FileStore, ImageAttachment,
    KeyValueStore, MemoryStore, Persistence, ProviderTransport, ThemeMode, Transport, UserInput,
    app::FAILURE_REPLY, drive, persona::ASSISTANT_NAME,
};
use tracing_subscriber::EnvFilter;

use crate::interrupt::Interrupt;

/// File holding conversations and settings inside the data directory
const STATE_FILE: &str = "state.json";

/// Log file used while the TUI owns the terminal
const LOG_FILE: &str = "masry.log";

/// masry - chat with the Masry assistant
#[derive(Parser, Debug)]
#[command(name = "masry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gemini-2.5-flash)
    #[arg(short, long)]
    model: Option<String>,

    /// API key (overrides config and GOOGLE_API_KEY/GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Directory for saved conversations and settings
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Theme to use (light or dark)
    #[arg(long)]
    theme: Option<ThemeMode>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Keep everything in memory; nothing is saved
    #[arg(long)]
    ephemeral: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

/// How the session talks to the user
enum RunMode {
    Command(String),
    Line,
    Tui,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let data_dir = args.data_dir.clone().unwrap_or_else(|| cfg.data_dir());

    let mode = match args.command.clone() {
        Some(prompt) => RunMode::Command(prompt),
        None if args.no_tui || !cfg.tui.unwrap_or(true) || !io::stdout().is_terminal() => {
            RunMode::Line
        }
        None => RunMode::Tui,
    };

    if args.verbose {
        init_tracing(matches!(mode, RunMode::Tui), &data_dir)?;
    }

    let model_id = args
        .model
        .clone()
        .or(cfg.model.clone())
        .unwrap_or_else(|| masry_ai::DEFAULT_MODEL_ID.to_string());
    let model = Model::gemini(model_id);

    // A missing key only fails once an exchange asks for it
    let transport: Arc<dyn Transport> =
        match config::resolve_api_key(args.api_key.as_deref(), &cfg) {
            Some(key) => Arc::new(ProviderTransport::with_api_key(key)),
            None => Arc::new(ProviderTransport::new()),
        };

    let default_theme = cfg.theme_mode().unwrap_or_default();
    let system_prompt = cfg.system_prompt();

    if args.ephemeral {
        let state = AppState::load(Persistence::new(MemoryStore::new()), default_theme);
        return run(state, &args, model, system_prompt, transport, mode).await;
    }

    let store_path = data_dir.join(STATE_FILE);
    tracing::debug!(path = %store_path.display(), "opening state file");
    let state = AppState::load(Persistence::new(FileStore::open(store_path)), default_theme);
    run(state, &args, model, system_prompt, transport, mode).await
}

/// Install the subscriber. The TUI owns the terminal, so its logs go to a file.
fn init_tracing(to_file: bool, data_dir: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("masry=debug"));

    if to_file {
        std::fs::create_dir_all(data_dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join(LOG_FILE))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

async fn run<S: KeyValueStore>(
    mut state: AppState<S>,
    args: &Args,
    model: Model,
    system_prompt: Option<String>,
    transport: Arc<dyn Transport>,
    mode: RunMode,
) -> anyhow::Result<()> {
    state = state.with_model(model).with_system_prompt(system_prompt);
    if let Some(theme) = args.theme {
        state.set_theme(theme);
    }

    match mode {
        RunMode::Command(prompt) => run_command(&mut state, transport, &prompt).await,
        RunMode::Line => run_interactive(&mut state, transport).await,
        RunMode::Tui => ui::run_tui(&mut state, transport).await,
    }
}

async fn run_command<S: KeyValueStore>(
    state: &mut AppState<S>,
    transport: Arc<dyn Transport>,
    prompt: &str,
) -> anyhow::Result<()> {
    if !state.is_logged_in() {
        anyhow::bail!("No user name saved yet. Run masry interactively once to log in.");
    }

    let mut stdout = io::stdout();
    let outcome = state
        .submit(transport, UserInput::text(prompt), |event| {
            if let ExchangeEvent::Fragment { text, .. } = event {
                print!("{}", text);
                stdout.flush().ok();
            }
        })
        .await?;
    println!();

    report_outcome(state, outcome);
    if outcome == Applied::Failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_interactive<S: KeyValueStore>(
    state: &mut AppState<S>,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::stderr().is_terminal() {
        eprintln!("{} ({})  /help for commands", ASSISTANT_NAME, state.model().id);
        eprintln!();
    }

    let interrupt = Interrupt::install();
    let mut attachment: Option<ImageAttachment> = None;

    loop {
        if !state.is_logged_in() && !prompt_login(state)? {
            break;
        }

        match &attachment {
            Some(image) => print!("[{}] > ", image.name),
            None => print!("> "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() && attachment.is_none() {
            continue;
        }

        // Handle slash commands
        if let Some(result) = commands::execute_command(input, state) {
            match result {
                commands::CommandResult::Message(msg) => println!("{}", msg),
                commands::CommandResult::Search => print_search(state),
                commands::CommandResult::Attach(image) => {
                    println!("Attached {} ({})", image.name, image.mime_type);
                    attachment = Some(image);
                }
                commands::CommandResult::Detach => {
                    attachment = None;
                    println!("Attachment removed.");
                }
                commands::CommandResult::LoggedOut => println!("Logged out."),
                commands::CommandResult::Exit => break,
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        let mut user_input = UserInput::text(input);
        if let Some(image) = attachment.take() {
            user_input = user_input.with_image(image);
        }

        println!();
        match stream_reply(state, transport.clone(), user_input, &interrupt).await {
            Ok(outcome) => report_outcome(state, outcome),
            Err(CoreError::EmptyInput) => {}
            Err(e) => eprintln!("Error: {}", e),
        }
        println!();
    }

    state.shutdown();
    Ok(())
}

/// Ask for a name until one is accepted. Returns false on EOF.
fn prompt_login<S: KeyValueStore>(state: &mut AppState<S>) -> anyhow::Result<bool> {
    loop {
        print!("Welcome to {}! What's your name? ", ASSISTANT_NAME);
        io::stdout().flush()?;

        let mut name = String::new();
        if io::stdin().read_line(&mut name)? == 0 {
            return Ok(false);
        }
        match state.login(&name) {
            Ok(()) => {
                println!();
                return Ok(true);
            }
            Err(e) => println!("{}", e),
        }
    }
}

/// Stream one reply to stdout; Ctrl+C stops it and keeps the partial text
async fn stream_reply<S: KeyValueStore>(
    state: &mut AppState<S>,
    transport: Arc<dyn Transport>,
    input: UserInput,
    interrupt: &Interrupt,
) -> masry_core::Result<Applied> {
    let pending = state.begin_exchange(input)?;
    let _armed = interrupt.arm(pending.cancel.clone());
    let mut events = drive(transport, pending.request, pending.cancel);
    let mut outcome = Applied::Ignored;

    while let Some(event) = events.next().await {
        if let ExchangeEvent::Fragment { text, .. } = &event {
            print!("{}", text);
            io::stdout().flush().ok();
        }
        outcome = state.apply(&pending.target, event);
    }
    println!();
    Ok(outcome)
}

/// Print sources or the failure notice for the reply that just ended
fn report_outcome<S: KeyValueStore>(state: &AppState<S>, outcome: Applied) {
    match outcome {
        Applied::Failed => {
            println!("{}", FAILURE_REPLY);
            if let Some(banner) = state.error_banner() {
                eprintln!("{}", banner);
            }
        }
        Applied::Cancelled => println!("[stopped]"),
        _ => {
            let sources = state
                .active_conversation()
                .messages
                .last()
                .filter(|m| !m.is_user())
                .and_then(|m| m.sources.as_ref());
            if let Some(sources) = sources {
                println!("\nSources:");
                for (i, source) in sources.iter().enumerate() {
                    let title = if source.title.is_empty() {
                        &source.uri
                    } else {
                        &source.title
                    };
                    println!("  {}. {} <{}>", i + 1, title, source.uri);
                }
            }
        }
    }
}

fn print_search<S: KeyValueStore>(state: &AppState<S>) {
    let outcome = state.search();
    if state.search_query().is_empty() {
        println!("Search cleared.");
        return;
    }

    let hits = outcome.hits();
    println!(
        "Results for \"{}\": {} found",
        state.search_query(),
        hits.len()
    );
    for hit in hits {
        let who = if hit.message.is_user() { "You" } else { ASSISTANT_NAME };
        println!(
            "  [{}] {}: {}",
            utils::truncate_chars(hit.conversation_title, 30),
            who,
            utils::truncate_chars(&utils::single_line(&hit.message.text), 80)
        );
    }
    if !hits.is_empty() {
        println!("\nOpen a conversation with /open <number> (see /list)");
    }
}
