//! 联合登录提供方

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 外部身份提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Github,
    Google,
}

impl IdentityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
        }
    }

    /// 生成用户名时使用的前缀
    pub fn username_prefix(&self) -> &'static str {
        match self {
            Self::Github => "GIT_",
            Self::Google => "GO_",
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Self::Github),
            "google" => Ok(Self::Google),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Unknown identity provider: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!("GitHub".parse::<IdentityProvider>().unwrap(), IdentityProvider::Github);
        assert_eq!("google".parse::<IdentityProvider>().unwrap(), IdentityProvider::Google);
        assert!("facebook".parse::<IdentityProvider>().is_err());
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(IdentityProvider::Github.username_prefix(), "GIT_");
        assert_eq!(IdentityProvider::Google.username_prefix(), "GO_");
    }
}
