//! Error types for relayctl

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Calibration store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Simulation incomplete: {completed} of {expected} actions finished")]
    Incomplete { expected: u64, completed: u64 },

    #[error("Command rejected: {0}")]
    Rejected(#[from] relaysync_manager::MessageError),

    #[error(transparent)]
    Manager(#[from] relaysync_manager::ManagerError),

    #[error(transparent)]
    Registration(#[from] relaysync_manager::RegistrationError),

    #[error("Zero-cross source error: {0}")]
    ZeroCross(#[from] relaysync_zerocross::ZeroCrossError),

    #[error("Store error: {0}")]
    Store(#[from] relaysync_calibration::StoreError),

    #[error(transparent)]
    Calibration(#[from] relaysync_calibration::CalibrationError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigNotFound(_) | CliError::StoreNotFound(_) => 2,
            CliError::Incomplete { .. } | CliError::Rejected(_) => 3,
            CliError::InvalidConfiguration(_)
            | CliError::YamlError(_)
            | CliError::JsonError(_) => 4,
            CliError::Store(_) | CliError::Calibration(_) | CliError::IoError(_) => 5,
            _ => 1,
        }
    }
}
