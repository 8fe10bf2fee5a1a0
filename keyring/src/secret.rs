//! Sources of the secrets that unlock wallets.

use std::{
    io::Write as _,
    path::Path,
};
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors that can occur when obtaining a secret.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("environment variable {0} is not set")]
    MissingVariable(String),
    #[error("secret is empty")]
    Empty,
    #[error("secrets do not match")]
    Mismatch,
}

/// Supplies the secret protecting a wallet.
pub trait SecretSource {
    /// Returns the secret for the wallet at `wallet`.
    fn secret(&mut self, wallet: &Path) -> Result<Zeroizing<String>, Error>;
}

/// Reads each secret from the terminal without echo.
#[derive(Clone, Copy, Debug, Default)]
pub struct Prompt;

impl SecretSource for Prompt {
    fn secret(&mut self, wallet: &Path) -> Result<Zeroizing<String>, Error> {
        eprint!("Password for {}: ", wallet.display());
        std::io::stderr().flush()?;
        let secret = Zeroizing::new(rpassword::read_password()?);
        if secret.is_empty() {
            return Err(Error::Empty);
        }
        Ok(secret)
    }
}

/// Read a new secret from the terminal, asking for it twice.
pub fn prompt_new(wallet: &Path) -> Result<Zeroizing<String>, Error> {
    let secret = Prompt.secret(wallet)?;
    eprint!("Confirm password: ");
    std::io::stderr().flush()?;
    let confirmation = Zeroizing::new(rpassword::read_password()?);
    if *secret != *confirmation {
        return Err(Error::Mismatch);
    }
    Ok(secret)
}

/// Reads the secret (shared by all wallets) from an environment variable.
#[derive(Clone, Debug)]
pub struct Env {
    variable: String,
}

impl Env {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl SecretSource for Env {
    fn secret(&mut self, _: &Path) -> Result<Zeroizing<String>, Error> {
        let secret = std::env::var(&self.variable)
            .map(Zeroizing::new)
            .map_err(|_| Error::MissingVariable(self.variable.clone()))?;
        if secret.is_empty() {
            return Err(Error::Empty);
        }
        Ok(secret)
    }
}

/// Returns the same secret for every wallet.
#[derive(Clone)]
pub struct Fixed {
    secret: Zeroizing<String>,
}

impl Fixed {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }
}

impl SecretSource for Fixed {
    fn secret(&mut self, _: &Path) -> Result<Zeroizing<String>, Error> {
        Ok(self.secret.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env() {
        let variable = "SUPPLYSIGN_TEST_SECRET_ENV";
        let mut source = Env::new(variable);
        assert!(matches!(
            source.secret(Path::new("a.dat")),
            Err(Error::MissingVariable(_))
        ));

        std::env::set_var(variable, "");
        assert!(matches!(source.secret(Path::new("a.dat")), Err(Error::Empty)));

        std::env::set_var(variable, "hunter2");
        assert_eq!(source.secret(Path::new("a.dat")).unwrap().as_str(), "hunter2");
        std::env::remove_var(variable);
    }

    #[test]
    fn test_fixed() {
        let mut source = Fixed::new("hunter2");
        assert_eq!(source.secret(Path::new("a.dat")).unwrap().as_str(), "hunter2");
        assert_eq!(source.secret(Path::new("b.dat")).unwrap().as_str(), "hunter2");
    }
}
