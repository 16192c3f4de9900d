use crate::config::LoggingConfig;
use crate::constants::{dirs, env as env_vars};
use crate::errors::ConfigError;
use chrono::Local;
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SESSION_PREFIX: &str = "taskprobe_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<u8> for LogLevel {
    fn from(val: u8) -> Self {
        match val {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

static DEFAULT_LOG_LEVEL: Mutex<LogLevel> = Mutex::new(LogLevel::Info);

pub fn set_log_level(level: LogLevel) {
    if let Ok(mut default_level) = DEFAULT_LOG_LEVEL.lock() {
        *default_level = level;
    }
}

/// Applies `TASKPROBE_LOG_LEVEL` when it names a level; other values are
/// ignored.
pub fn set_log_level_from_env() {
    if let Some(level) = env::var(env_vars::LOG_LEVEL)
        .ok()
        .and_then(|v| v.parse::<LogLevel>().ok())
    {
        set_log_level(level);
    }
}

fn get_default_log_level() -> Level {
    DEFAULT_LOG_LEVEL
        .lock()
        .map(|level| (*level).into())
        .unwrap_or(Level::INFO)
}

struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Session files are named `<prefix><date>_<time>_<pid>.log`.
fn session_file_date(path: &Path, prefix: &str) -> Option<chrono::NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix(prefix)?;
    let date = rest.split('_').next()?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn rotate_logs(log_dir: &Path, prefix: &str, config: &LoggingConfig) -> Result<(), ConfigError> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".log"))
        })
        .collect();

    entries.sort();

    if config.max_files > 0 && entries.len() > config.max_files {
        let to_delete = entries.len() - config.max_files;
        for path in entries.drain(0..to_delete) {
            let _ = fs::remove_file(path);
        }
    }

    if config.max_age_days > 0 {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(config.max_age_days * 24 * 60 * 60);

        entries.retain(|path| {
            let Some(log_time) = session_file_date(path, prefix)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .and_then(|dt| dt.and_local_timezone(Local).single())
            else {
                return true;
            };
            match now.duration_since(SystemTime::from(log_time)) {
                Ok(age) if age > max_age => {
                    let _ = fs::remove_file(path);
                    false
                }
                _ => true,
            }
        });
    }

    Ok(())
}

fn workspace_root() -> PathBuf {
    env::var("CARGO_MANIFEST_DIR")
        .ok()
        .and_then(|p| {
            let path = PathBuf::from(p);
            path.parent()?.parent().map(|p| p.to_path_buf())
        })
        .unwrap_or_else(|| env::current_dir().unwrap_or_default())
}

fn init_tracing_subscriber(log_path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let root = workspace_root();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(get_default_log_level().as_str().to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .event_format(SessionFormatter {
            workspace_root: root.clone(),
        });

    let tee_layer = env::var_os(env_vars::TEST_LOG_TEE).map(|_| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .event_format(SessionFormatter {
                workspace_root: root,
            })
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(tee_layer)
        .try_init()
        .map_err(|e| ConfigError::General(format!("logger already set: {}", e)))?;

    tracing::info!("Session log opened at {}", log_path.display());
    Ok(())
}

/// File log line: `[time] [LEVEL] scenario{name=..}: file:line message`.
struct SessionFormatter {
    workspace_root: PathBuf,
}

/// Source path relative to the workspace, or `crates/<crate>/<file>` when
/// the compiler recorded a relative path.
fn source_location(metadata: &tracing::Metadata<'_>, workspace_root: &Path) -> Option<String> {
    let file = metadata.file()?;
    let path = Path::new(file);
    let shown = if path.is_absolute() {
        path.strip_prefix(workspace_root)
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|_| file.to_string())
    } else {
        match metadata.module_path().and_then(|m| m.split("::").next()) {
            Some(krate) => format!("crates/{}/{}", krate.replace('_', "-"), file),
            None => file.to_string(),
        }
    };
    Some(format!("{}:{}", shown, metadata.line().unwrap_or(0)))
}

impl<S, N> FormatEvent<S, N> for SessionFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        write!(writer, "[")?;
        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, "] [{:5}] ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{}}}", fields)?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        if let Some(location) = source_location(metadata, &self.workspace_root) {
            write!(writer, "{} ", location)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn init_session_logger(config: &LoggingConfig) -> Result<PathBuf, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(dirs::TASKPROBE);
    let cache_home = xdg_dirs
        .get_cache_home()
        .ok_or(ConfigError::HomeDirectoryNotFound)?;
    let logs_dir = cache_home.join(dirs::LOGS);

    rotate_logs(&logs_dir, SESSION_PREFIX, config)?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let pid = std::process::id();
    let filename = format!("{}{}_{}.log", SESSION_PREFIX, timestamp, pid);
    let log_path = logs_dir.join(&filename);

    init_tracing_subscriber(&log_path)?;

    let symlink_path = cache_home.join("taskprobe.log");
    let _ = fs::remove_file(&symlink_path);
    #[cfg(unix)]
    {
        use std::os::unix::fs::symlink;
        let target = Path::new(dirs::LOGS).join(filename);
        let _ = symlink(&target, &symlink_path);
    }

    Ok(log_path)
}

pub fn init_stderr_logger() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(get_default_log_level().to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_timer(LocalTimeFormatter)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .try_init();
}

fn format_command_for_display(command: &Command) -> String {
    let program = command.get_program().to_string_lossy();
    let args = command
        .get_args()
        .map(|arg| {
            let s = arg.to_string_lossy();
            if s.contains(char::is_whitespace) || s.is_empty() {
                format!("'{}'", s)
            } else {
                s.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", program, args)
}

pub fn log_and_print_command(command: &Command) {
    let command_str = format_command_for_display(command);
    tracing::debug!("[CMD] {}", command_str);
}
