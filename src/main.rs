use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rollcall::app::{App, InputMode, PromptKind};
use rollcall::config::{self, DEFAULT_RPC};
use rollcall::infrastructure::ethereum::ProviderConfig;
use rollcall::infrastructure::runtime::{RuntimeBridge, WorkerSettings};
use rollcall::ui;

#[derive(Debug, Parser)]
#[command(
    name = "rollcall",
    version,
    about = "Rollcall: register, submit and peer-verify attendance on-chain"
)]
struct Args {
    /// HTTP JSON-RPC endpoint (e.g. http://localhost:8545)
    #[arg(long)]
    rpc: Option<String>,

    /// WebSocket endpoint (e.g. ws://localhost:8546)
    #[arg(long)]
    ws: Option<String>,

    /// IPC path (e.g. ~/.ethereum/geth.ipc). Unix only.
    #[arg(long)]
    ipc: Option<PathBuf>,

    /// Attendance registry contract address
    #[arg(long)]
    contract: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load();
    init_logging(&config);

    let endpoints = endpoints_from_args_and_config(&args, &config)?;
    let contract: Address = args
        .contract
        .clone()
        .unwrap_or_else(|| config.contract_or_default())
        .trim()
        .parse()
        .context("Invalid contract address")?;
    let initial_endpoint = endpoints
        .first()
        .map(ProviderConfig::display)
        .unwrap_or_else(|| DEFAULT_RPC.to_string());
    info!(endpoint = %initial_endpoint, %contract, "starting");

    let runtime = RuntimeBridge::new(WorkerSettings {
        endpoints,
        contract,
        wallet: config.wallet_settings(),
    })?;

    let mut app = App::new(initial_endpoint, contract.to_string());
    app.set_status("Connecting…", rollcall::sync::StatusLevel::Info);

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, runtime);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err:?}");
    }

    Ok(())
}

/// The terminal owns stdout, so logs go to a file in the data directory.
/// Without a writable data directory logging stays off.
fn init_logging(config: &config::Config) {
    let Some(path) = config::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = File::options().create(true).append(true).open(&path) else {
        return;
    };

    let fallback = config.log_filter.clone().unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    runtime: RuntimeBridge,
) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        pump_background(&mut app, &runtime)?;
        terminal.draw(|f| ui::draw(f, &mut app))?;
        if app.should_quit {
            return Ok(());
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                handle_key(&mut app, key);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

fn pump_background(app: &mut App, runtime: &RuntimeBridge) -> Result<()> {
    for cmd in app.take_commands() {
        runtime.send(cmd)?;
    }
    for event in runtime.poll_events() {
        app.apply_event(event);
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    if app.help_open {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
            app.help_open = false;
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Command => handle_command_mode(app, key),
        InputMode::Prompt(kind) => handle_prompt_mode(app, key, kind),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => app.should_quit = true,
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => app.should_quit = true,
        (KeyCode::Char('?'), _) => app.help_open = true,
        (KeyCode::Char(':'), _) => app.enter_command(),
        (KeyCode::Char('c'), _) => app.connect(),
        (KeyCode::Char('r'), _) => app.begin_register(),
        (KeyCode::Char('s'), _) => app.submit_attendance(),
        (KeyCode::Char('v'), _) | (KeyCode::Enter, _) => app.verify_selected(),
        (KeyCode::Char('a'), _) => app.cycle_account(),
        (KeyCode::Char('u'), _) => app.refresh(),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => app.select_next(),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => app.select_prev(),
        _ => {}
    }
}

fn handle_command_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.exit_command(),
        KeyCode::Enter => app.apply_command(),
        KeyCode::Backspace => {
            app.command.input.pop();
        }
        KeyCode::Char(ch) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            app.command.input.push(ch);
        }
        _ => {}
    }
}

fn handle_prompt_mode(app: &mut App, key: KeyEvent, kind: PromptKind) {
    match key.code {
        KeyCode::Esc => app.exit_prompt(),
        KeyCode::Enter => app.apply_prompt(kind),
        KeyCode::Backspace => {
            app.command.input.pop();
        }
        KeyCode::Char(ch) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            app.command.input.push(ch);
        }
        _ => {}
    }
}

fn endpoints_from_args_and_config(
    args: &Args,
    config: &config::Config,
) -> Result<Vec<ProviderConfig>> {
    fn push_endpoint(
        endpoints: &mut Vec<ProviderConfig>,
        seen: &mut BTreeSet<String>,
        endpoint: ProviderConfig,
    ) {
        if seen.insert(endpoint.display().to_lowercase()) {
            endpoints.push(endpoint);
        }
    }

    let mut endpoints = Vec::new();
    let mut seen = BTreeSet::<String>::new();

    // CLI arguments take precedence
    if let Some(ipc) = args.ipc.clone() {
        #[cfg(unix)]
        {
            push_endpoint(&mut endpoints, &mut seen, ProviderConfig::Ipc(expand_home(ipc)));
        }
        #[cfg(not(unix))]
        {
            let _ = ipc;
            return Err(anyhow::anyhow!("IPC is not supported on this platform"));
        }
    } else if let Some(ws) = args.ws.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_endpoint(
            &mut endpoints,
            &mut seen,
            ProviderConfig::WebSocket(ws.to_string()),
        );
    } else if let Some(rpc) = args.rpc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_endpoint(
            &mut endpoints,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint(rpc)),
        );
    }

    for endpoint in config.endpoints() {
        let endpoint = match endpoint {
            ProviderConfig::Http(url) => ProviderConfig::Http(normalize_http_endpoint(&url)),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => ProviderConfig::Ipc(expand_home(path)),
            other => other,
        };
        push_endpoint(&mut endpoints, &mut seen, endpoint);
    }

    // Default fallback
    if endpoints.is_empty() {
        push_endpoint(
            &mut endpoints,
            &mut seen,
            ProviderConfig::Http(DEFAULT_RPC.to_string()),
        );
    }

    Ok(endpoints)
}

fn normalize_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(unix)]
fn expand_home(path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return home.join(rest);
        }
    }
    path
}
