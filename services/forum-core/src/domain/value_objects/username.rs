//! Username 值对象

use serde::{Deserialize, Serialize};
use std::fmt;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 64;

/// Username 值对象
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// 创建新的 Username
    pub fn new(username: impl Into<String>) -> Result<Self, UsernameError> {
        let username = username.into();
        Self::validate(&username)?;
        Ok(Self(username))
    }

    fn validate(username: &str) -> Result<(), UsernameError> {
        let len = username.chars().count();
        if len < USERNAME_MIN_LEN {
            return Err(UsernameError::TooShort);
        }
        if len > USERNAME_MAX_LEN {
            return Err(UsernameError::TooLong);
        }

        // 只允许字母、数字、下划线、连字符
        if !username.chars().all(is_username_char) {
            return Err(UsernameError::InvalidCharacters);
        }

        if !username.chars().next().is_some_and(char::is_alphanumeric) {
            return Err(UsernameError::InvalidStart);
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 用户名允许的字符
pub fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Username 错误
#[derive(Debug, thiserror::Error)]
pub enum UsernameError {
    #[error("Username is too short (minimum 3 characters)")]
    TooShort,

    #[error("Username is too long (maximum 64 characters)")]
    TooLong,

    #[error("Username contains invalid characters (only alphanumeric, underscore, and hyphen allowed)")]
    InvalidCharacters,

    #[error("Username must start with an alphanumeric character")]
    InvalidStart,
}
