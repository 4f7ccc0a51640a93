//! A console logger for `tracing` events.
//!
//! [`init`] installs the [`Logger`] as the global default subscriber. The maximum level is read
//! from the `RUST_LOG` environment variable and defaults to `INFO`.

use std::fmt::{self, Debug, Display, Formatter, Write as _};
use std::io::{IsTerminal, Write as _};

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::metadata::LevelFilter;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// Installs the [`Logger`] as the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber was already installed.
pub fn init() -> Result<(), SetGlobalDefaultError> {
    let registry = tracing_subscriber::registry().with(Logger::new());
    set_global_default(registry)
}

#[derive(Debug)]
pub struct Logger {
    is_tty: bool,
    level: LevelFilter,
}

impl Logger {
    pub fn new() -> Self {
        let level = std::env::var("RUST_LOG")
            .map(|e| parse_level(&e))
            .unwrap_or(LevelFilter::INFO);

        Self::with_level(level)
    }

    pub fn with_level(level: LevelFilter) -> Self {
        Self {
            is_tty: std::io::stdout().is_terminal(),
            level,
        }
    }

    fn log(&self, target: &str, level: Level, fields: &Visitor) {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S:%f");

        let mut line = String::with_capacity(64 + fields.buf.len());
        if self.is_tty {
            let _ = write!(
                line,
                "{} {} {} {}",
                Sgr::DIM.paint(format_args!("[{}]", now)),
                Sgr::level(level).paint(level.as_str()),
                Sgr::DIM.paint(target),
                fields,
            );
        } else {
            let _ = write!(line, "[{}] {} {} {}", now, level.as_str(), target, fields);
        }

        // A single write per event keeps lines from the engine and producer threads intact.
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for Logger
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.level {
            return;
        }

        let mut visitor = Visitor::new();
        event.record(&mut visitor);

        let target = metadata.module_path().unwrap_or("???");
        self.log(target, *metadata.level(), &visitor);
    }
}

fn parse_level(s: &str) -> LevelFilter {
    match s {
        "error" | "ERROR" => LevelFilter::ERROR,
        "warn" | "WARN" => LevelFilter::WARN,
        "info" | "INFO" => LevelFilter::INFO,
        "debug" | "DEBUG" => LevelFilter::DEBUG,
        "trace" | "TRACE" => LevelFilter::TRACE,
        "off" | "OFF" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

struct Visitor {
    buf: String,
}

impl Visitor {
    fn new() -> Self {
        Self {
            buf: String::with_capacity(32),
        }
    }
}

impl Visit for Visitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if !self.buf.is_empty() {
            self.buf.push_str(", ");
        }

        let _ = match field.name() {
            "message" => write!(self.buf, "{:?}", value),
            _ => write!(self.buf, "{} = {:?}", field, value),
        };
    }
}

impl Display for Visitor {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.buf, f)
    }
}

/// An ANSI select graphic rendition sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Sgr(&'static str);

impl Sgr {
    const DIM: Self = Self("2;37");

    fn level(level: Level) -> Self {
        match level {
            Level::ERROR => Self("1;31"),
            Level::WARN => Self("1;33"),
            Level::INFO => Self("1;32"),
            Level::DEBUG | Level::TRACE => Self("1;37"),
        }
    }

    fn paint<T>(self, text: T) -> Painted<T>
    where
        T: Display,
    {
        Painted { sgr: self, text }
    }
}

struct Painted<T> {
    sgr: Sgr,
    text: T,
}

impl<T> Display for Painted<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}m{}\x1b[0m", self.sgr.0, self.text)
    }
}

#[cfg(test)]
mod tests {
    use tracing::metadata::LevelFilter;
    use tracing::Level;

    use super::{parse_level, Sgr, Visitor};

    #[test]
    fn parse_level_filters() {
        assert_eq!(parse_level("warn"), LevelFilter::WARN);
        assert_eq!(parse_level("TRACE"), LevelFilter::TRACE);
        assert_eq!(parse_level("off"), LevelFilter::OFF);
        assert_eq!(parse_level("garbage"), LevelFilter::INFO);
    }

    #[test]
    fn visitor_starts_empty() {
        let visitor = Visitor::new();
        assert_eq!(visitor.to_string(), "");
    }

    #[test]
    fn painted_text_is_reset() {
        let text = Sgr::level(Level::WARN).paint("WARN").to_string();
        assert_eq!(text, "\x1b[1;33mWARN\x1b[0m");
    }
}
