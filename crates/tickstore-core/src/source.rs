use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifies the market-data provider a batch was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Yahoo,
    Fixture,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Fixture => "fixture",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_the_lowercase_name() {
        assert_eq!(ProviderId::Fixture.to_string(), "fixture");
        assert_eq!(
            serde_json::to_string(&ProviderId::Yahoo).ok().as_deref(),
            Some("\"yahoo\"")
        );
    }
}
