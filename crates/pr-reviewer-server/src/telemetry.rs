//! `tracing` subscriber setup.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Env;

/// Install the global subscriber for `env`. `RUST_LOG` overrides the
/// default level.
///
/// `local` prints human-readable output at DEBUG; `dev` and `prod` emit
/// JSON lines at DEBUG and INFO respectively.
pub fn init(env: Env) {
  let default_level = match env {
    Env::Local | Env::Dev => LevelFilter::DEBUG,
    Env::Prod => LevelFilter::INFO,
  };
  let filter = EnvFilter::builder()
    .with_default_directive(default_level.into())
    .from_env_lossy();

  let fmt = tracing_subscriber::fmt().with_env_filter(filter);
  match env {
    Env::Local => fmt.pretty().init(),
    Env::Dev | Env::Prod => fmt.json().with_current_span(true).init(),
  }
}
