//! cutout: an HTTP service that removes image backgrounds.
//!
//! Accepts an image upload, hands the decoded bitmap to a pluggable
//! [`remover::BackgroundRemover`], and returns the result as a PNG with an
//! alpha channel.

pub mod config;
pub mod cors;
pub mod error;
pub mod imaging;
pub mod middleware;
pub mod remover;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
