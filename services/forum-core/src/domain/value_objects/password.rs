//! 密码值对象

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::fmt;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Argon2 哈希后的密码
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// 校验长度后哈希明文密码
    pub fn from_plain(plain_password: &str) -> Result<Self, PasswordError> {
        let len = plain_password.chars().count();
        if len < PASSWORD_MIN_LEN {
            return Err(PasswordError::TooShort(PASSWORD_MIN_LEN));
        }
        if len > PASSWORD_MAX_LEN {
            return Err(PasswordError::TooLong(PASSWORD_MAX_LEN));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(plain_password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
            .to_string();

        Ok(Self(password_hash))
    }

    /// 从已存储的哈希创建
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// 验证明文密码是否匹配
    pub fn verify(&self, plain_password: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(&self.0).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(plain_password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword([REDACTED])")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password is too short (minimum {0} characters)")]
    TooShort(usize),

    #[error("Password is too long (maximum {0} characters)")]
    TooLong(usize),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Stored password hash is invalid: {0}")]
    InvalidHash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = HashedPassword::from_plain("correct horse").unwrap();
        assert!(hashed.verify("correct horse").unwrap());
        assert!(!hashed.verify("wrong horse").unwrap());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let h1 = HashedPassword::from_plain("correct horse").unwrap();
        let h2 = HashedPassword::from_plain("correct horse").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_length_limits() {
        assert!(matches!(
            HashedPassword::from_plain("short"),
            Err(PasswordError::TooShort(_))
        ));
        assert!(matches!(
            HashedPassword::from_plain(&"x".repeat(129)),
            Err(PasswordError::TooLong(_))
        ));
    }

    #[test]
    fn test_empty_hash_is_invalid() {
        let hashed = HashedPassword::from_hash("");
        assert!(matches!(
            hashed.verify("anything"),
            Err(PasswordError::InvalidHash(_))
        ));
    }
}
