use std::process::ExitCode;

use ants::config::SimConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match SimConfig::from_json_file(&path) {
            Ok(config) => {
                log::info!("loaded configuration from {path}");
                config
            }
            Err(e) => {
                log::error!("{path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SimConfig::default(),
    };

    match ants::app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
