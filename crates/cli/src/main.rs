use clap::{Parser, Subcommand};
use folio::config::{self, ConfigOrigin, ConfigSource, FallbackReason, LoadedConfig, SessionConfig};
use folio::gateway::{BackendGateway, HttpGateway};
use folio::health::{HealthMonitor, HealthReport};
use folio::i18n::{
    FilePreferenceStore, Language, LanguageState, MemoryPreferenceStore, PreferenceStore, UiStrings,
};
use folio::session::{self, Message, SessionController, SessionEvent, UiState};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: FOLIO_CONFIG_PATH or ~/.folio/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Print the resolved configuration and every field that fell back to its default.
    Config {
        /// Config file path or http(s) URL (default: FOLIO_CONFIG_PATH or ~/.folio/config.json)
        #[arg(long, short, value_name = "PATH|URL")]
        config: Option<String>,
    },

    /// Probe the chat backend once. Exits non-zero when it is unreachable.
    Health {
        /// Config file path or http(s) URL (default: FOLIO_CONFIG_PATH or ~/.folio/config.json)
        #[arg(long, short, value_name = "PATH|URL")]
        config: Option<String>,
    },

    /// Chat with the portfolio assistant (interactive).
    Chat {
        /// Config file path or http(s) URL (default: FOLIO_CONFIG_PATH or ~/.folio/config.json)
        #[arg(long, short, value_name = "PATH|URL")]
        config: Option<String>,

        /// Language to switch to on start (zh, en, ja).
        #[arg(long, value_name = "CODE")]
        lang: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("folio {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Config { config }) => {
            if let Err(e) = run_config(config).await {
                log::error!("config failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Health { config }) => {
            if let Err(e) = run_health(config).await {
                log::error!("health failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, lang }) => {
            if let Err(e) = run_chat(config, lang).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// env_logger with a `warn` default. The logger itself accepts debug records so that
/// `debugMode` can raise the global max level after the configuration is loaded;
/// an explicit RUST_LOG always wins.
fn init_logging() {
    let explicit = std::env::var_os("RUST_LOG").is_some();
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).build();
    let max = if explicit {
        logger.filter()
    } else {
        log::LevelFilter::Warn
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max);
    }
}

fn apply_debug_mode(config: &SessionConfig) {
    if config.debug_mode
        && std::env::var_os("RUST_LOG").is_none()
        && log::max_level() < log::LevelFilter::Debug
    {
        log::set_max_level(log::LevelFilter::Debug);
        log::debug!("debug mode enabled by configuration");
    }
}

fn config_source(arg: Option<String>) -> ConfigSource {
    match arg {
        Some(s) => ConfigSource::parse(&s),
        None => ConfigSource::File(config::default_config_path()),
    }
}

async fn load_config(arg: Option<String>) -> (ConfigSource, LoadedConfig) {
    let source = config_source(arg);
    let loaded = config::load(&source).await;
    apply_debug_mode(&loaded.config);
    (source, loaded)
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = folio::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_config(arg: Option<String>) -> anyhow::Result<()> {
    let (source, loaded) = load_config(arg).await;
    match &loaded.origin {
        ConfigOrigin::Loaded => println!("# source: {}", source),
        ConfigOrigin::Absent => println!("# source: {} (not found, defaults)", source),
        ConfigOrigin::Defaulted(e) => println!("# source: {} (unusable: {}; defaults)", source, e),
    }
    for fb in &loaded.fallbacks {
        let why = match fb.reason {
            FallbackReason::Missing => "missing",
            FallbackReason::Invalid => "invalid",
        };
        println!("# {}: {}, default used", fb.field, why);
    }
    println!("{}", serde_json::to_string_pretty(&loaded.config.to_document())?);
    Ok(())
}

async fn run_health(arg: Option<String>) -> anyhow::Result<()> {
    let (_, loaded) = load_config(arg).await;
    let config = Arc::new(loaded.config);
    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&config.backend_url));
    let controller = SessionController::new(config.clone(), gateway.clone(), Language::DEFAULT);
    let monitor = HealthMonitor::new(gateway, &config);
    match monitor.probe(&controller).await {
        HealthReport::Reachable {
            chat_enabled,
            remote_override,
        } => {
            println!(
                "{}: reachable, chat {}{}",
                config.backend_url,
                if chat_enabled { "enabled" } else { "disabled" },
                match remote_override {
                    Some(false) => " (turned off by backend)",
                    _ => "",
                }
            );
            Ok(())
        }
        HealthReport::Unreachable { detail, .. } => {
            anyhow::bail!("{}: {}", config.backend_url, detail)
        }
    }
}

fn preference_store() -> Box<dyn PreferenceStore> {
    match FilePreferenceStore::default_location() {
        Some(store) => Box::new(store),
        None => {
            log::warn!("no home directory; language preference kept in memory");
            Box::new(MemoryPreferenceStore::new())
        }
    }
}

fn host_locale() -> Option<String> {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

async fn run_chat(arg: Option<String>, lang: Option<String>) -> anyhow::Result<()> {
    let (_, loaded) = load_config(arg).await;
    let config = Arc::new(loaded.config);

    let mut languages = LanguageState::new(preference_store(), &config.supported_languages);
    let initial = languages.resolve_initial_language(host_locale().as_deref());

    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&config.backend_url));
    let controller = SessionController::new(config.clone(), gateway.clone(), initial);
    let mut events = controller.subscribe();
    let _bridge = session::spawn_language_bridge(languages.subscribe(), controller.clone());
    let _probe = HealthMonitor::new(gateway, &config).spawn(controller.clone());

    let mut printer = Printer::new(initial);
    printer.banner();
    for m in controller.messages().await {
        printer.bubble(&m);
    }
    if let Some(code) = lang {
        let applied = languages.apply_language(&code, &mut []);
        printer.await_language(&mut events, applied).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            // Health and language changes arrive while waiting for input.
            ev = events.recv() => {
                printer.drain(ev, &mut events);
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/clear") {
            controller.clear().await;
        } else if let Some(code) = input.strip_prefix("/lang") {
            let code = code.trim();
            if code.is_empty() {
                let supported: Vec<&str> = languages.supported().iter().map(|l| l.code()).collect();
                println!("{} ({})", languages.current(), supported.join(", "));
            } else {
                let applied = languages.apply_language(code, &mut []);
                printer.await_language(&mut events, applied).await;
            }
        } else {
            controller.input_changed(input).await;
            controller.send(input).await;
        }
        printer.drain_pending(&mut events);
    }

    if languages.persistence_degraded() {
        log::warn!("language preference could not be saved");
    }
    Ok(())
}

/// Renders controller events as terminal lines.
struct Printer {
    lang: Language,
    strings: &'static UiStrings,
    last_status: Option<String>,
}

impl Printer {
    fn new(lang: Language) -> Self {
        Self {
            lang,
            strings: UiStrings::for_language(lang),
            last_status: None,
        }
    }

    fn banner(&self) {
        println!("== {} ==", self.strings.title);
        println!(
            "({}; Enter: {}, /clear: {}, /lang <code>, /exit)",
            self.strings.placeholder, self.strings.send_label, self.strings.clear_label
        );
    }

    fn bubble(&self, m: &Message) {
        println!("{} [{}]: {}", m.role.label(self.lang), m.timestamp.format("%H:%M"), m.content.trim());
    }

    fn event(&mut self, ev: SessionEvent) {
        match ev {
            // The terminal already echoes what was typed.
            SessionEvent::MessageAppended(m) if m.role.is_user() => {}
            SessionEvent::MessageAppended(m) => self.bubble(&m),
            SessionEvent::Status(status) => {
                if self.last_status.as_deref() != Some(status.text.as_str()) {
                    println!("  · {}", status.text);
                    self.last_status = Some(status.text);
                }
            }
            SessionEvent::StateChanged { state, .. } => {
                if state == UiState::Disabled {
                    log::info!("chat controls disabled");
                }
            }
            SessionEvent::Cleared => self.last_status = None,
            SessionEvent::LanguageChanged { language, strings } => {
                self.lang = language;
                self.strings = strings;
                self.last_status = None;
                self.banner();
            }
            SessionEvent::InputCleared => {}
        }
    }

    fn drain(
        &mut self,
        first: Result<SessionEvent, broadcast::error::RecvError>,
        rx: &mut broadcast::Receiver<SessionEvent>,
    ) {
        match first {
            Ok(ev) => self.event(ev),
            Err(broadcast::error::RecvError::Lagged(n)) => log::debug!("printer skipped {} events", n),
            Err(broadcast::error::RecvError::Closed) => return,
        }
        self.drain_pending(rx);
    }

    /// Print events until the controller has re-rendered for `applied`.
    async fn await_language(&mut self, rx: &mut broadcast::Receiver<SessionEvent>, applied: Language) {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let done = matches!(
                        &ev,
                        SessionEvent::LanguageChanged { language, .. } if *language == applied
                    );
                    self.event(ev);
                    if done {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::debug!("printer skipped {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    fn drain_pending(&mut self, rx: &mut broadcast::Receiver<SessionEvent>) {
        loop {
            match rx.try_recv() {
                Ok(ev) => self.event(ev),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    log::debug!("printer skipped {} events", n)
                }
                Err(_) => break,
            }
        }
    }
}
