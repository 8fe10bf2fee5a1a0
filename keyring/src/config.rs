use crate::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Ordered list of wallet files holding the local signing identities.
///
/// ```json
/// { "Path": ["./wallet1.dat", "./wallet2.dat"] }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Locations {
    #[serde(rename = "Path", alias = "path")]
    paths: Vec<PathBuf>,
}

impl Locations {
    /// Build from an explicit list of wallet paths.
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, Error> {
        let locations = Self { paths };
        locations.check()?;
        Ok(locations)
    }

    /// Read and parse the signer configuration at `path`.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::parse(&data)
    }

    /// Parse a signer configuration from JSON.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let locations: Self = serde_json::from_slice(data)
            .map_err(|err| Error::Config(format!("malformed signer config: {err}")))?;
        locations.check()?;
        Ok(locations)
    }

    fn check(&self) -> Result<(), Error> {
        if self.paths.is_empty() {
            return Err(Error::Config("no wallets configured".into()));
        }
        if self.paths.iter().any(|path| path.as_os_str().is_empty()) {
            return Err(Error::Config("empty wallet path".into()));
        }
        Ok(())
    }

    /// Iterate over wallet paths in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let locations = Locations::parse(br#"{"Path": ["./a.dat", "b.dat"]}"#).unwrap();
        assert_eq!(
            locations.iter().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("./a.dat"), PathBuf::from("b.dat")]
        );

        let lower = Locations::parse(br#"{"path": ["a.dat"]}"#).unwrap();
        assert_eq!(lower.len(), 1);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let cases: [&[u8]; 5] = [
            br#"{"Path": []}"#,
            br#"{"Path": [""]}"#,
            br#"{"Wallets": ["a.dat"]}"#,
            br#"{"Path": "a.dat"}"#,
            b"not json",
        ];
        for data in cases {
            assert!(matches!(Locations::parse(data), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Locations::read(&dir.path().join("config.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
