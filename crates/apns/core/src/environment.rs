//! Gateway environments.

/// Production gateway host.
pub const PRODUCTION_URL: &str = "https://api.push.apple.com";

/// Development (sandbox) gateway host.
pub const DEVELOPMENT_URL: &str = "https://api.sandbox.push.apple.com";

/// Which APNs gateway family to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// `api.push.apple.com`, for apps signed for distribution.
    #[default]
    Production,
    /// `api.sandbox.push.apple.com`, for development builds.
    Development,
}

impl Environment {
    /// Default base URL for this environment.
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_URL,
            Self::Development => DEVELOPMENT_URL,
        }
    }

    /// Name as accepted by [`str::parse`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown environment name.
#[derive(Debug, thiserror::Error)]
#[error("unknown environment `{0}`, expected `production` or `development`")]
pub struct ParseEnvironmentError(String);

impl std::str::FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => Err(ParseEnvironmentError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        assert_eq!(Environment::default(), Environment::Production);
        assert_eq!(Environment::default().base_url(), PRODUCTION_URL);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert!("sandbox".parse::<Environment>().is_err());
    }
}
