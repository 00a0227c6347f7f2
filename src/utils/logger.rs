//! log4rs wiring.
//!
//! Library code only talks to the `log` facade. Applications pick one of the
//! initializers here: a `log4rs.yaml` file, an explicit directory/level pair,
//! or the `NEXUSQUERY_LOG_*` environment variables.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::errors::DbError;

/// Target for queries slower than the configured threshold.
pub const SLOW_TARGET: &str = "nexusquery::slow";
/// Target of the bench lines written by `devlog::record`.
pub const DEV6_TARGET: &str = "nexusquery::dev6";

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns `Config` when the file is missing or invalid.
pub fn init() -> Result<(), DbError> {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes logging from a specific log4rs config file.
///
/// # Errors
/// Returns `Config` when the file is missing or invalid.
pub fn init_path(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Config(format!("log config {}: {e}", path.display())))
}

/// Parses a level name; unknown names fall back to `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| DbError::Config(format!("{stem} roller: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(|e| DbError::Io(format!("{stem}.log: {e}")))
}

/// Builds the log4rs configuration: `app.log` for everything, `slow.log` for
/// slow queries and, with `enable_dev6`, `dev6.log` for bench lines.
///
/// # Errors
/// Returns `Io` when the directory or files cannot be created.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> Result<Config, DbError> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base).map_err(|e| DbError::Io(format!("log dir {}: {e}", base.display())))?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("slow", Box::new(rolling(&base, "slow", keep)?)))
        .logger(Logger::builder().appender("slow").additive(false).build(SLOW_TARGET, LevelFilter::Warn));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };

    builder
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Config(e.to_string()))
}

/// Installs the configuration from [`build_config`] as the global logger.
/// A second call in the same process keeps the first logger.
///
/// # Errors
/// Returns `Io` or `Config` when the configuration cannot be built.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> Result<(), DbError> {
    let config = build_config(dir, level, retention, enable_dev6)?;
    if let Err(e) = log4rs::init_config(config) {
        log::debug!("logger already installed: {e}");
    }
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `NEXUSQUERY_LOG_DIR`
/// - `NEXUSQUERY_LOG_LEVEL`
/// - `NEXUSQUERY_LOG_RETENTION`
/// - `NEXUSQUERY_DEV6` (`1`, `true` or `yes`)
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("NEXUSQUERY_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("NEXUSQUERY_LOG_LEVEL").ok();
    let retention = std::env::var("NEXUSQUERY_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    let dev6 = std::env::var("NEXUSQUERY_DEV6").is_ok_and(|s| is_truthy(&s));
    configure_logging(dir.as_deref(), level.as_deref(), retention, dev6)
}

pub(crate) fn is_truthy(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
