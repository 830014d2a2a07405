//! `fieldgen <header-file> <output-root>`

use fieldgen::{Error, driver};
use std::{env, process::ExitCode};
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{Registry, filter::LevelFilter, fmt, layer::SubscriberExt};

const USAGE: &str = "usage: fieldgen <header-file> <output-root>";

/// Environment variable selecting the log level (`debug` for per-field detail).
const LOG_ENV: &str = "FIELDGEN_LOG";

fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("fieldgen: logging disabled: {err}");
    }

    let config = match parse_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match driver::run(&config) {
        Ok(written) => {
            tracing::info!(files = written.len(), "done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "generation failed");
            ExitCode::from(1)
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<driver::Config, Error> {
    match (args.next(), args.next(), args.next()) {
        (Some(header), Some(root), None) => Ok(driver::Config::new(header, root)),
        (_, _, Some(extra)) => Err(Error::Usage(format!("unexpected argument {extra:?}"))),
        _ => Err(Error::Usage("expected two arguments".into())),
    }
}

fn init_tracing() -> Result<(), SetGlobalDefaultError> {
    let level = match env::var(LOG_ENV).as_deref() {
        Ok("debug") => LevelFilter::DEBUG,
        Ok("trace") => LevelFilter::TRACE,
        Ok("warn") => LevelFilter::WARN,
        _ => LevelFilter::INFO,
    };
    let subscriber = Registry::default()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(level);
    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn two_arguments() {
        let config = parse_args(args(&["header.txt", "out"])).unwrap();
        assert_eq!(config.header_path.to_str(), Some("header.txt"));
        assert_eq!(config.output_root.to_str(), Some("out"));
    }

    #[test]
    fn wrong_argument_count() {
        assert!(matches!(parse_args(args(&["header.txt"])), Err(Error::Usage(_))));
        assert!(matches!(
            parse_args(args(&["a", "b", "c"])),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn second_subscriber_is_rejected() {
        // the first call may or may not win, depending on test order
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
