use thiserror::Error;

use crate::error::ApiError;

/// Errors from the account service.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login failed: {0}")]
    InvalidCredentials(String),

    /// The account exists but its email has not been verified yet.
    #[error("account not verified: {0}")]
    Unverified(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("too many requests, try again later")]
    RateLimited,

    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("token has already been used")]
    UsedToken,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Api(ApiError::Http(e))
    }
}

impl AuthError {
    /// Map a failed login response.
    pub(crate) fn from_login(err: ApiError) -> Self {
        match err {
            ApiError::Api { status, message } if status == 401 || status == 403 => {
                if mentions(&message, "verif") {
                    Self::Unverified(message)
                } else {
                    Self::InvalidCredentials(message)
                }
            }
            ApiError::Api { status: 400, message } => Self::InvalidCredentials(message),
            other => Self::Api(other),
        }
    }

    /// Map a failed password-reset response by the wording of its 400 body.
    pub(crate) fn from_reset(err: ApiError) -> Self {
        match err {
            ApiError::Api { status: 400, message } if mentions(&message, "invalid") => {
                Self::InvalidToken
            }
            ApiError::Api { status: 400, message } if mentions(&message, "expired") => {
                Self::ExpiredToken
            }
            ApiError::Api { status: 400, message } if mentions(&message, "used") => Self::UsedToken,
            other => Self::from_form(other),
        }
    }

    /// Map a failed form submission (register, profile edit, resend, forgot).
    pub(crate) fn from_form(err: ApiError) -> Self {
        match err {
            ApiError::Api { status: 429, .. } => Self::RateLimited,
            ApiError::Api {
                status: 400 | 409 | 422,
                message,
            } => Self::Validation(message),
            other => Self::Api(other),
        }
    }

    /// Map a failed verification-link check.
    pub(crate) fn from_verify(err: ApiError) -> Self {
        match err {
            ApiError::Api {
                status: 400 | 404 | 410,
                ..
            } => Self::InvalidToken,
            other => Self::Api(other),
        }
    }
}

fn mentions(message: &str, needle: &str) -> bool {
    message.to_lowercase().contains(needle)
}
