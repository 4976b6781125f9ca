//! Error types
//!
//! The decision core itself never fails at runtime. Only course setup and
//! tuning files are validated, and they must be checked before racing starts.

use thiserror::Error;

/// Malformed course geometry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CourseError {
    #[error("course needs {required} marks, found {found}")]
    TooFewMarks { found: usize, required: usize },

    #[error("boundary radius must be positive, got {radius}")]
    InvalidBoundary { radius: f32 },

    #[error("island {index} has {vertices} vertices, at least 3 required")]
    DegenerateIsland { index: usize, vertices: usize },
}

/// Tuning file could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid tuning value: {field} = {value}")]
    InvalidValue { field: &'static str, value: f32 },
}
