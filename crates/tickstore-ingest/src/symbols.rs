use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Where a run's symbols come from: a file, inline arguments, or both.
///
/// File symbols come first. Blank lines and `#` comments are skipped, and a
/// symbol seen twice (ignoring case) keeps its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSource {
    pub file: Option<PathBuf>,
    pub inline: Vec<String>,
}

impl SymbolSource {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            inline: Vec::new(),
        }
    }

    pub fn inline<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file: None,
            inline: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Ordered, de-duplicated raw symbols. Validation happens per security.
    pub fn load(&self) -> Result<Vec<String>, ConfigError> {
        let mut raw = Vec::new();
        if let Some(path) = &self.file {
            let contents = fs::read_to_string(path).map_err(|source| {
                if source.kind() == ErrorKind::NotFound {
                    ConfigError::SymbolSourceMissing { path: path.clone() }
                } else {
                    ConfigError::SymbolSourceUnreadable {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
            raw.extend(contents.lines().map(str::to_owned));
        }
        raw.extend(self.inline.iter().cloned());

        let mut seen = HashSet::new();
        let symbols: Vec<String> = raw
            .iter()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|symbol| !symbol.is_empty())
            .filter(|symbol| seen.insert(symbol.to_ascii_uppercase()))
            .map(str::to_owned)
            .collect();

        if symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_comments_blanks_and_duplicates_are_dropped() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("symbols.txt");
        fs::write(&path, "# watchlist\nMSFT\n\n aapl  # apple\nmsft\nBRK-B\n").expect("write");

        let symbols = SymbolSource {
            file: Some(path),
            inline: vec![String::from("AAPL"), String::from("NVDA")],
        }
        .load()
        .expect("load");

        assert_eq!(symbols, vec!["MSFT", "aapl", "BRK-B", "NVDA"]);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let temp = tempdir().expect("tempdir");
        let err = SymbolSource::from_file(temp.path().join("absent.txt"))
            .load()
            .expect_err("missing");
        assert!(matches!(err, ConfigError::SymbolSourceMissing { .. }));
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = SymbolSource::inline(["  ", "# nothing"]).load().expect_err("empty");
        assert!(matches!(err, ConfigError::NoSymbols));
    }
}
