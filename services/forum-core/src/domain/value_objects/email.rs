//! Email 值对象

use serde::{Deserialize, Serialize};
use std::fmt;

/// Email 值对象（统一小写）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// 创建新的 Email
    pub fn new(email: impl AsRef<str>) -> Result<Self, EmailError> {
        let email = email.as_ref().trim();

        if email.is_empty() {
            return Err(EmailError::Empty);
        }

        if !email_address::EmailAddress::is_valid(email) {
            return Err(EmailError::InvalidFormat(email.to_string()));
        }

        Ok(Self(email.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 获取邮箱本地部分
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Email 错误
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email is empty")]
    Empty,

    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        let email = Email::new("test@example.com").unwrap();
        assert_eq!(email.as_str(), "test@example.com");
    }

    #[test]
    fn test_email_case_insensitive() {
        let email1 = Email::new("Test@Example.COM").unwrap();
        let email2 = Email::new("test@example.com").unwrap();
        assert_eq!(email1, email2);
    }

    #[test]
    fn test_empty_email() {
        assert!(matches!(Email::new(""), Err(EmailError::Empty)));
        assert!(matches!(Email::new("   "), Err(EmailError::Empty)));
    }

    #[test]
    fn test_invalid_email() {
        assert!(matches!(
            Email::new("invalid.email.com"),
            Err(EmailError::InvalidFormat(_))
        ));
        assert!(Email::new("@example.com").is_err());
    }

    #[test]
    fn test_local_part() {
        let email = Email::new("john.smith@gmail.com").unwrap();
        assert_eq!(email.local_part(), "john.smith");
    }
}
