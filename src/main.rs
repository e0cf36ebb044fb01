use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use zeitgeist::{
    app::{self, APP_NAME, AppError, Cli},
    config::Config,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = Config::from_env()
        .map_err(AppError::from)
        .and_then(|config| {
            init_tracing(&config.log_level);
            app::run(cli, &config)
        });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{APP_NAME}: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
