//! Network identity and per-network gating.

use serde::{Deserialize, Serialize};

/// Predicate deciding whether a deployment or verification applies to a network.
///
/// Serialized in TOML as `"any"`, `{ only = ["optimism"] }` or `{ except = ["mainnet"] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFilter {
    #[default]
    Any,
    Only(Vec<String>),
    Except(Vec<String>),
}

impl NetworkFilter {
    /// Filter matching only the given networks.
    pub fn only<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(networks.into_iter().map(Into::into).collect())
    }

    /// Returns true if `network` passes this filter.
    pub fn matches(&self, network: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(names) => names.iter().any(|n| n == network),
            Self::Except(names) => !names.iter().any(|n| n == network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_matches_everything() {
        assert!(NetworkFilter::Any.matches("mainnet"));
        assert!(NetworkFilter::Any.matches("hardhat"));
    }

    #[test]
    fn test_only_and_except() {
        let only = NetworkFilter::only(["optimism-kovan", "optimism"]);
        assert!(only.matches("optimism"));
        assert!(!only.matches("mainnet"));

        let except = NetworkFilter::Except(vec!["mainnet".to_string()]);
        assert!(!except.matches("mainnet"));
        assert!(except.matches("polygon"));
    }

    #[test]
    fn test_filter_toml_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            networks: NetworkFilter,
        }

        let any: Wrapper = toml::from_str(r#"networks = "any""#).unwrap();
        assert_eq!(any.networks, NetworkFilter::Any);

        let only: Wrapper = toml::from_str(r#"networks = { only = ["optimism"] }"#).unwrap();
        assert_eq!(only.networks, NetworkFilter::only(["optimism"]));
    }
}
