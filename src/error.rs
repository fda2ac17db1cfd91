use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Startup configuration error: {message}")]
    StartupConfig {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("Network enumeration error: {message}")]
    NetworkEnumeration {
        message: String,
        #[source]
        source: Option<nix::Error>,
    },

    #[error("I/O error while {action} {name}: {source}")]
    RequestIo {
        action: IoAction,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Missing query parameter {0}")]
    MissingQuery(&'static str),

    #[error("File {name} not found")]
    NotFound { name: String },

    #[error("Path {name} escapes the served root")]
    PathContainment { name: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),

    #[error("Failed to render page: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// The filesystem step a request was performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoAction {
    ReadingDir,
    Resolving,
    Creating,
    Writing,
    Renaming,
}

impl fmt::Display for IoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadingDir => write!(f, "reading directory"),
            Self::Resolving => write!(f, "resolving"),
            Self::Creating => write!(f, "creating"),
            Self::Writing => write!(f, "writing"),
            Self::Renaming => write!(f, "renaming into"),
        }
    }
}

/// Body shared by the upload acknowledgement and every error response.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub code: i32,
    pub msg: &'static str,
}

impl AppError {
    pub fn io(action: IoAction, name: impl Into<String>, source: io::Error) -> Self {
        Self::RequestIo {
            action,
            name: name.into(),
            source,
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn containment(name: impl Into<String>) -> Self {
        Self::PathContainment { name: name.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Multipart(_) | AppError::MissingQuery(_) | AppError::PathContainment { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error text for clients. Details stay in the log.
    fn public_message(&self) -> &'static str {
        match self {
            AppError::Multipart(_) => "Malformed upload request",
            AppError::MissingQuery(_) => "Missing required query parameter",
            AppError::NotFound { .. } => "File not found",
            AppError::PathContainment { .. } => "Path is outside the shared directory",
            AppError::RequestIo {
                action: IoAction::ReadingDir,
                ..
            } => "Failed to read shared directory",
            AppError::RequestIo { .. } => "Failed to access file",
            _ => "Internal server error",
        }
    }

    fn code(&self) -> i32 {
        match self {
            AppError::Multipart(_) => 2,
            AppError::NotFound { .. } => 3,
            AppError::PathContainment { .. } => 4,
            AppError::MissingQuery(_) => 5,
            _ => 1,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(err = %self, "request failed");
        } else {
            tracing::warn!(err = %self, "request rejected");
        }

        let body = Ack {
            code: self.code(),
            msg: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
