use std::{path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// Errors that can occur during build operations
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to read toolchain file
    #[error("failed to read toolchain file at {path}: {source}")]
    ToolchainFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing required field in toolchain file
    #[error("missing required field '{field}' in toolchain file")]
    MissingToolchainField { field: String },

    /// Invalid toolchain channel value
    #[error("invalid toolchain channel value: {0}")]
    InvalidToolchainChannel(String),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Could not start the nested cargo invocation
    #[error("failed to run cargo for {package}: {source}")]
    CargoSpawn {
        package: String,
        #[source]
        source: std::io::Error,
    },

    /// Nested cargo invocation exited unsuccessfully
    #[error("cargo build of {package} failed: {status}")]
    CargoFailed { package: String, status: ExitStatus },
}

impl BuildError {
    pub fn toolchain_file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ToolchainFileRead {
            path: path.into(),
            source,
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingToolchainField {
            field: field.into(),
        }
    }
}
