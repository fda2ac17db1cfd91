pub mod config;
pub mod download;
pub mod error;
pub mod listing;
pub mod logger;
pub mod resolver;
pub mod root;
pub mod routes;
pub mod upload;

pub use config::{BindMode, Config, HandlerSet};
pub use error::AppError;
pub use resolver::{resolve, BindTarget};
pub use root::ServedRoot;
pub use routes::router;
