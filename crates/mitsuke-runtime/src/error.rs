use mitsuke_api::backend::AuthError;
use mitsuke_api::ApiError;
use mitsuke_core::error::MitsukeError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("you must be logged in")]
    NotLoggedIn,

    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("service unavailable, try again later")]
    Unavailable,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(#[from] MitsukeError),
}
