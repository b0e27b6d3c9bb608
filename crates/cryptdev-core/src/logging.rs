//! Process-wide logger setup.

use env_logger::{Builder, Env, Target};

/// Install the global logger, writing to stderr so stdout stays reserved for
/// the JSON result. `RUST_LOG` overrides `default_level`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(default_level: &str) {
    let env = Env::default().default_filter_or(default_level);
    let _ = Builder::from_env(env)
        .target(Target::Stderr)
        .format_timestamp_secs()
        .try_init();
}
