//! 领域错误到 AppError 的转换

use forum_errors::AppError;

use crate::domain::{EmailError, PasswordError, ProviderError, ReactionError, UsernameError};

impl From<EmailError> for AppError {
    fn from(e: EmailError) -> Self {
        AppError::validation(e.to_string())
    }
}

impl From<UsernameError> for AppError {
    fn from(e: UsernameError) -> Self {
        AppError::validation(e.to_string())
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort(_) | PasswordError::TooLong(_) => {
                AppError::validation(e.to_string())
            }
            PasswordError::HashingFailed(_) | PasswordError::InvalidHash(_) => {
                AppError::internal(e.to_string())
            }
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        AppError::validation(e.to_string())
    }
}

impl From<ReactionError> for AppError {
    fn from(e: ReactionError) -> Self {
        AppError::validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Email, Polarity};

    #[test]
    fn test_domain_errors_become_validation() {
        let err: AppError = Email::new("").unwrap_err().into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = "sideways".parse::<Polarity>().unwrap_err().into();
        assert_eq!(err.status_code(), 400);
    }
}
