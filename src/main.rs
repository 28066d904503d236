//! Hostel Cache CLI
//!
//! Inspect and drive the hostel frontend cache from a terminal: read and
//! write entries in any backend, print stats, close a session, preview page
//! lists and run cached GETs against the REST backend.
//!
//! The memory backend lives only as long as one invocation; session and local
//! data persist in the configured directories.

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hostel_cache::pagination::PageWindow;
use hostel_cache::{page_model, ApiClient, AppConfig, Backend, CacheService, Result, Ttl};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Hostel Cache - TTL cache and REST facade for the hostel frontend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "HOSTEL_CACHE_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Directory of the local (durable) backend
    #[arg(long, env = "HOSTEL_CACHE_LOCAL_DIR")]
    local_dir: Option<std::path::PathBuf>,

    /// Parent directory of session backends
    #[arg(long, env = "HOSTEL_CACHE_SESSION_ROOT")]
    session_root: Option<std::path::PathBuf>,

    /// Session identifier
    #[arg(long, env = "HOSTEL_CACHE_SESSION_ID")]
    session_id: Option<String>,

    /// REST API base URL
    #[arg(long, env = "HOSTEL_API_URL")]
    api_url: Option<String>,

    /// REST API bearer token
    #[arg(long, env = "HOSTEL_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the live value under a key
    Get {
        key: String,
        #[arg(long, value_enum, default_value_t = Backend::Local)]
        backend: Backend,
    },

    /// Store a value; VALUE is parsed as JSON, falling back to a plain string
    Set {
        key: String,
        value: String,
        /// TTL in milliseconds (<= 0 never expires); defaults to the configured TTL
        #[arg(long)]
        ttl_ms: Option<i64>,
        #[arg(long, value_enum, default_value_t = Backend::Local)]
        backend: Backend,
    },

    /// Exit with status 0 if a live value exists, 1 otherwise
    Has {
        key: String,
        #[arg(long, value_enum, default_value_t = Backend::Local)]
        backend: Backend,
    },

    /// Remove a key
    Remove {
        key: String,
        #[arg(long, value_enum, default_value_t = Backend::Local)]
        backend: Backend,
    },

    /// Remove every entry in a backend
    Clear {
        #[arg(value_enum)]
        backend: Backend,
    },

    /// Print entry counts and counters as JSON
    Stats,

    /// Wipe and remove the session backend
    CloseSession,

    /// Print the page list for CURRENT of TOTAL pages
    Pages {
        current: u32,
        total: u32,
        /// Treat TOTAL as an item count with this many items per page
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// GET a path from the REST backend through the cache
    Fetch {
        path: String,
        #[arg(long)]
        ttl_ms: Option<i64>,
        #[arg(long, value_enum, default_value_t = Backend::Session)]
        backend: Backend,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    info!(version = hostel_cache::VERSION, "Starting hostel cache");

    let cache = CacheService::with_config(&config.cache)?;
    let ttl_or_default = |ttl_ms: Option<i64>| ttl_ms.map_or(cache.default_ttl(), Ttl::from_millis);

    match args.command {
        Command::Get { key, backend } => match cache.get_value(&key, backend) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => std::process::exit(1),
        },
        Command::Set {
            key,
            value,
            ttl_ms,
            backend,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            cache.try_set(&key, &value, ttl_or_default(ttl_ms), backend)?;
        }
        Command::Has { key, backend } => {
            if !cache.has(&key, backend) {
                std::process::exit(1);
            }
        }
        Command::Remove { key, backend } => cache.try_remove(&key, backend)?,
        Command::Clear { backend } => cache.try_clear(backend)?,
        Command::Stats => println!("{}", serde_json::to_string_pretty(&cache.stats())?),
        Command::CloseSession => cache.close_session()?,
        Command::Pages {
            current,
            total,
            page_size,
        } => {
            let model = match page_size {
                Some(size) => {
                    let window = PageWindow::new(current, size, u64::from(total));
                    if let Some(shown) = window.shown() {
                        println!("showing {}-{} of {}", shown.start(), shown.end(), total);
                    }
                    window.model()
                }
                None => page_model(current, total),
            };
            let rendered: Vec<String> = model.iter().map(ToString::to_string).collect();
            println!("{}", rendered.join(" "));
        }
        Command::Fetch {
            path,
            ttl_ms,
            backend,
        } => {
            let client = ApiClient::new(config.api.clone())?;
            let body = client
                .cached_get(&cache, &path, ttl_or_default(ttl_ms), backend)
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

/// Load the config file, then apply CLI and environment overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_yaml_file(path)?,
        None => AppConfig::default(),
    };

    if let Some(dir) = &args.local_dir {
        config.cache.local_dir = Some(dir.clone());
    }
    if let Some(root) = &args.session_root {
        config.cache.session_root = Some(root.clone());
    }
    if let Some(id) = &args.session_id {
        config.cache.session_id = id.clone();
    }
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(token) = &args.api_token {
        config.api.auth_token = Some(token.clone());
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so command output stays pipeable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
