use colored::*;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RELEVE_LOG";

/// One line per event: a colored level tag, the module, then the fields.
pub struct ReleveFormatter;

impl<S, N> FormatEvent<S, N> for ReleveFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();

        let (tag, paint): (&str, fn(ColoredString) -> ColoredString) = match *meta.level() {
            Level::TRACE => ("trace", |s| s.dimmed()),
            Level::DEBUG => ("debug", |s| s.blue()),
            Level::INFO => ("info", |s| s.green()),
            Level::WARN => ("warn", |s| s.yellow().bold()),
            Level::ERROR => ("error", |s| s.red().bold()),
        };
        let target = meta.target().trim_start_matches("releve::");

        write!(writer, "{} {} ", paint(format!("{tag:>5}").into()), target.dimmed())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `RELEVE_LOG` wins over the configured level; `warn` when neither is set.
pub fn filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

pub fn init(configured: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(configured))
        .with_writer(std::io::stderr)
        .event_format(ReleveFormatter)
        .try_init();
}
