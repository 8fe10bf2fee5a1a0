//! Co-sign every committed header below the tip with the default account of each configured
//! wallet.
//!
//! # Usage
//!
//! ```sh
//! supplysign --config ./config.json --genesis ./genesis.json --data-dir ./Chain
//! ```
//!
//! `config.json` lists the wallets to load (`{"Path": ["./wallet.dat"]}`). Each wallet's
//! password is prompted for on the terminal unless `--password-env` names an environment
//! variable holding it. Pressing Ctrl-C stops the run after the header being processed.
//!
//! The process exits with status 0 only if every header below the tip was processed.

use clap::{value_parser, Arg, ArgMatches, Command};
use commonware_runtime::{tokio as tokio_runtime, Metrics as _, Runner, Spawner as _};
use futures::channel::oneshot;
use std::{path::PathBuf, str::FromStr};
use supplysign::{Config, Engine, Error, Lock, Logger, Summary};
use supplysign_keyring::{
    secret::{Env, Prompt},
    Locations, SignerIdentity,
};
use supplysign_ledger::{genesis, HeaderStore, Ledger};
use tracing::{error, info, Level};

fn command() -> Command {
    Command::new("supplysign")
        .about("co-sign committed block headers with local bookkeeper keys")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Signer configuration listing wallet files")
                .default_value("./config.json")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("genesis")
                .long("genesis")
                .value_name("PATH")
                .help("Chain configuration (network and authorized bookkeepers)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("PATH")
                .help("Directory holding the header store")
                .default_value("./Chain")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("password-env")
                .long("password-env")
                .value_name("VAR")
                .help("Environment variable holding the wallet password (prompted otherwise)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
                .default_value("info"),
        )
}

fn main() {
    // Parse arguments
    let matches = command().get_matches();

    // Configure logging
    let level = matches
        .get_one::<String>("log-level")
        .map_or(Ok(Level::INFO), |level| Level::from_str(level))
        .unwrap_or_else(|err| {
            eprintln!("invalid log level: {err}");
            std::process::exit(2);
        });
    tracing_subscriber::fmt().with_max_level(level).init();

    match run(Args::from(&matches)) {
        Ok(summary) => info!(
            processed = summary.processed,
            modified = summary.modified,
            signatures = summary.signatures,
            "done"
        ),
        Err(err) => {
            error!(%err, "failed");
            std::process::exit(1);
        }
    }
}

struct Args {
    config: PathBuf,
    genesis: PathBuf,
    data_dir: PathBuf,
    password_env: Option<String>,
}

impl From<&ArgMatches> for Args {
    fn from(matches: &ArgMatches) -> Self {
        // Every path argument is required or has a default
        let path = |name: &str| {
            matches
                .get_one::<PathBuf>(name)
                .cloned()
                .unwrap_or_default()
        };
        Self {
            config: path("config"),
            genesis: path("genesis"),
            data_dir: path("data-dir"),
            password_env: matches.get_one::<String>("password-env").cloned(),
        }
    }
}

fn run(args: Args) -> Result<Summary, Error> {
    // Load chain configuration
    let chain = genesis::Config::read(&args.genesis).map_err(|err| Error::Config(err.to_string()))?;
    let authorized = chain
        .authorized()
        .map_err(|err| Error::Config(err.to_string()))?;
    info!(
        network = %chain.network,
        bookkeepers = authorized.len(),
        "loaded chain configuration"
    );

    // Load identities (all or nothing)
    let locations = Locations::read(&args.config)?;
    let identities: Vec<SignerIdentity> = match args.password_env {
        Some(variable) => supplysign_keyring::load(&locations, &mut Env::new(variable))?,
        None => supplysign_keyring::load(&locations, &mut Prompt)?,
    };

    // Prevent concurrent runs against the same store
    let _lock = Lock::acquire(&args.data_dir)?;

    let executor = tokio_runtime::Runner::new(
        tokio_runtime::Config::default().with_storage_directory(args.data_dir.clone()),
    );
    executor.start(|context| async move {
        // Request a halt on Ctrl-C
        let (halt, halted) = oneshot::channel();
        context.with_label("signal").spawn(|_| async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping after the current header");
                let _ = halt.send(());
            }
        });

        // Open the header store
        let store = Ledger::init(
            context.with_label("ledger"),
            supplysign_ledger::Config {
                partition: chain.partition(),
                genesis: genesis::header(&authorized, chain.timestamp),
            },
        )
        .await
        .map_err(Error::Store)?;

        // Co-sign
        let mut engine = Engine::new(
            context.with_label("engine"),
            store,
            Config {
                identities,
                authorized,
                reporter: Logger,
                halt: Some(halted),
            },
        );
        let result = engine.run().await;
        let closed = engine.into_store().close().await.map_err(Error::Store);
        finish(result, closed)
    })
}

/// Combine the outcome of a run with closing the store, preferring the run's error.
fn finish(result: Result<Summary, Error>, closed: Result<(), Error>) -> Result<Summary, Error> {
    match (result, closed) {
        (Err(err), Err(close)) => {
            error!(%close, "failed to close header store");
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(_), Err(close)) => Err(close),
        (Ok(summary), Ok(())) => Ok(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supplysign_ledger::Error as LedgerError;

    #[test]
    fn test_args_defaults() {
        let matches = command()
            .try_get_matches_from(["supplysign", "--genesis", "./genesis.json"])
            .unwrap();
        let args = Args::from(&matches);
        assert_eq!(args.config, PathBuf::from("./config.json"));
        assert_eq!(args.genesis, PathBuf::from("./genesis.json"));
        assert_eq!(args.data_dir, PathBuf::from("./Chain"));
        assert_eq!(args.password_env, None);

        // Genesis is required
        assert!(command().try_get_matches_from(["supplysign"]).is_err());
    }

    #[test]
    fn test_finish_prefers_run_error() {
        let result = finish(
            Err(Error::Halted { height: 4 }),
            Err(Error::Store(LedgerError::Unavailable(0))),
        );
        assert!(matches!(result, Err(Error::Halted { height: 4 })));

        let result = finish(
            Ok(Summary::default()),
            Err(Error::Store(LedgerError::Unavailable(0))),
        );
        assert!(matches!(result, Err(Error::Store(LedgerError::Unavailable(0)))));

        assert_eq!(
            finish(Ok(Summary::default()), Ok(())).unwrap(),
            Summary::default()
        );
    }
}
