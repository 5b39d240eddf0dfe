use env_logger::{Builder, Target};
use log::{Level, LevelFilter, Record};
use std::io::Write;

/// Environment variable with env_logger directives, e.g. `ipsniff::filter=debug`
pub const LOG_ENV: &str = "IPSNIFF_LOG";

/// Initialize the logger on stderr; stdout is reserved for packet records.
///
/// `level` comes from `--log-level`. Directives in `IPSNIFF_LOG` are applied
/// on top of it, so single modules can be turned up without flooding the rest.
pub fn init_logger(level: LevelFilter) {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| writeln!(buf, "{}", render(record)))
        .filter_level(level)
        .target(Target::Stderr);

    if let Ok(directives) = std::env::var(LOG_ENV) {
        builder.parse_filters(&directives);
    }

    builder.init();
}

/// `<timestamp> [LEVEL] - message`; debug and trace lines also name the module
fn render(record: &Record<'_>) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    match record.level() {
        Level::Debug | Level::Trace => format!(
            "{} [{}] {} - {}",
            timestamp,
            record.level(),
            record.target(),
            record.args()
        ),
        level => format!("{} [{}] - {}", timestamp, level, record.args()),
    }
}

/// Parse a `--log-level` value (trace, debug, info, warn, error, off)
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level
        .parse()
        .map_err(|_| format!("unknown log level '{}'", level))
}
