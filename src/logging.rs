use std::str::FromStr;

use tracing::Level;

use crate::config::LogOptions;

/// Installs a compact `fmt` subscriber when logging is enabled.
///
/// Returns `false` when logging is disabled or a global subscriber is
/// already set.
pub fn init(options: &LogOptions) -> bool {
    if !options.enabled {
        return false;
    }

    let level = Level::from_str(&options.level).unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .compact()
        .try_init()
        .is_ok()
}
