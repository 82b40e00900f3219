use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "gym_mate=info,sqlx=warn,reqwest=warn,hyper=warn";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_writer(std::io::stderr)
    .compact()
    .try_init();
}
