//! Create a wallet holding one freshly generated bookkeeper key.
//!
//! ```sh
//! supplysign-wallet --output ./wallet.dat
//! ```
//!
//! The password is read from the terminal (twice). The new public key is printed so it can be
//! added to the chain configuration.

use clap::{value_parser, Arg, Command};
use commonware_codec::Encode;
use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt as _, Signer as _};
use commonware_utils::hex;
use rand::rngs::OsRng;
use std::path::PathBuf;
use supplysign_keyring::{secret, Account, Kdf, Wallet};

fn main() {
    let matches = Command::new("supplysign-wallet")
        .about("create a wallet holding a new bookkeeper key")
        .arg(
            Arg::new("output")
                .long("output")
                .value_name("PATH")
                .help("Where to write the wallet (must not exist)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .help("Name recorded in the wallet")
                .default_value("bookkeeper"),
        )
        .arg(
            Arg::new("label")
                .long("label")
                .help("Label of the generated account")
                .default_value("default"),
        )
        .get_matches();

    let Some(output) = matches.get_one::<PathBuf>("output") else {
        eprintln!("missing --output");
        std::process::exit(2);
    };
    let name = matches
        .get_one::<String>("name")
        .map_or("bookkeeper", String::as_str);
    let label = matches
        .get_one::<String>("label")
        .map_or("default", String::as_str);
    if output.exists() {
        eprintln!("{} already exists", output.display());
        std::process::exit(1);
    }

    // Read password
    let password = secret::prompt_new(output).unwrap_or_else(|err| {
        eprintln!("cannot read password: {err}");
        std::process::exit(1);
    });

    // Generate and store key
    let key = PrivateKey::from_rng(&mut OsRng);
    let account = Account::encrypt(&mut OsRng, label, &key, &password, Kdf::default())
        .unwrap_or_else(|err| {
            eprintln!("cannot encrypt key: {err}");
            std::process::exit(1);
        });
    let mut wallet = Wallet::new(name);
    wallet.add(account, true);
    if let Err(err) = wallet.save(output) {
        eprintln!("cannot write {}: {err}", output.display());
        std::process::exit(1);
    }
    println!("{}", hex(&key.public_key().encode()));
}
