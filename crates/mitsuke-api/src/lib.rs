pub mod backend;
pub mod error;
pub mod jikan;
pub mod traits;

pub use backend::AuthError;
pub use error::ApiError;
