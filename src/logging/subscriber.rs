//! Tracing subscriber setup.
//!
//! Events are sorted into a `LineKind` from their level and target, and
//! both the console and the log file render from that one classification.
//! Artifact outcomes and rollback events carry their own targets so a
//! failed run reads as a sequence of tagged lines in either place.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing::Level;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Event targets understood by the formatters.
pub(super) mod target {
    /// Phase headers.
    pub const STAGE: &str = "devkit::stage";
    /// Actions a dry run skipped.
    pub const DRY_RUN: &str = "devkit::dry_run";
    /// Per-artifact outcomes, with `artifact` and `status` fields.
    pub const ARTIFACT: &str = "devkit::artifact";
    /// Rollback progress (`WARN`) and restore failures (`ERROR`).
    pub const ROLLBACK: &str = "devkit::rollback";
}

/// How an event is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Stage,
    DryRun,
    Artifact,
    RollingBack,
    RestoreFailed,
    Error,
    Warn,
    Info,
    Debug,
}

impl LineKind {
    fn classify(level: Level, event_target: &str) -> Self {
        match (level, event_target) {
            (Level::ERROR, target::ROLLBACK) => Self::RestoreFailed,
            (_, target::ROLLBACK) => Self::RollingBack,
            (_, target::ARTIFACT) => Self::Artifact,
            (Level::ERROR, _) => Self::Error,
            (Level::WARN, _) => Self::Warn,
            (_, target::STAGE) => Self::Stage,
            (_, target::DRY_RUN) => Self::DryRun,
            (Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// Fields pulled out of a [`tracing::Event`].
#[derive(Debug, Default)]
struct EventFields {
    message: String,
    artifact: Option<String>,
    status: Option<String>,
}

impl EventFields {
    fn from_event(event: &tracing::Event<'_>) -> Self {
        let mut fields = Self::default();
        event.record(&mut fields);
        fields
    }

    /// Message text, prefixed with the artifact outcome when there is one.
    fn text(&self) -> String {
        match (&self.status, &self.artifact) {
            (Some(status), Some(name)) if self.message.is_empty() => format!("{status}: {name}"),
            (Some(status), Some(name)) => format!("{status}: {name} ({})", self.message),
            _ => self.message.clone(),
        }
    }
}

impl tracing::field::Visit for EventFields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        match field.name() {
            "message" => self.message = text,
            "artifact" => self.artifact = Some(text),
            "status" => self.status = Some(text),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "artifact" => self.artifact = Some(value.to_string()),
            "status" => self.status = Some(value.to_string()),
            _ => {}
        }
    }
}

fn console_line(kind: LineKind, text: &str) -> String {
    match kind {
        LineKind::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{text}\x1b[0m"),
        LineKind::DryRun => format!("  \x1b[33m[DRY RUN]\x1b[0m {text}"),
        LineKind::Artifact => format!("  \x1b[2m{text}\x1b[0m"),
        LineKind::RollingBack => format!("\x1b[35mROLLBACK\x1b[0m {text}"),
        LineKind::RestoreFailed => format!("\x1b[1;31mRESTORE FAILED\x1b[0m {text}"),
        LineKind::Error => format!("\x1b[31mERROR\x1b[0m {text}"),
        LineKind::Warn => format!("\x1b[33mWARN\x1b[0m  {text}"),
        LineKind::Info => format!("  {text}"),
        LineKind::Debug => format!("  \x1b[2m{text}\x1b[0m"),
    }
}

fn file_line(kind: LineKind, ts: &str, text: &str) -> String {
    let text = strip_ansi(text);
    let tag = match kind {
        LineKind::Stage => return format!("[{ts}] ==> {text}"),
        LineKind::Info => return format!("[{ts}]     {text}"),
        LineKind::DryRun => "dry run",
        LineKind::Artifact => "artifact",
        LineKind::RollingBack => "rollback",
        LineKind::RestoreFailed => "restore failed",
        LineKind::Error => "error",
        LineKind::Warn => "warn",
        LineKind::Debug => "debug",
    };
    format!("[{ts}]     [{tag}] {text}")
}

/// A [`tracing_subscriber::Layer`] that appends every event to the command's
/// log file, timestamped and with ANSI codes stripped.
///
/// Captures `DEBUG` and above whatever the console verbosity.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `command`, write a run header and open it
    /// for appending.
    ///
    /// Returns `None` if the cache directory or the file is unavailable.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let header = format!(
            "# devkit {} {command} started {} UTC\n",
            crate::VERSION,
            format_utc_datetime(),
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let kind = LineKind::classify(*metadata.level(), metadata.target());
        let line = file_line(kind, &format_utc_time(), &EventFields::from_event(event).text());
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console event format built on `console_line`.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let kind = LineKind::classify(*metadata.level(), metadata.target());
        writeln!(writer, "{}", console_line(kind, &EventFields::from_event(event).text()))
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout; `DEBUG`
/// reaches the console only when `verbose`.  Every event at `DEBUG` and
/// above is also appended to `$XDG_CACHE_HOME/devkit/<command>.log`.
/// Call once, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
