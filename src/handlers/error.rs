// src/handlers/error.rs
use std::fmt;
use warp::reject::Reject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Database,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError { kind: ErrorKind::NotFound, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError { kind: ErrorKind::BadRequest, message: message.into() }
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        ApiError { kind: ErrorKind::Database, message: message.into() }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
