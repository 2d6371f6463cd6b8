use std::path::PathBuf;

use thiserror::Error;

/// A problem with `.aws-web-pub.json`. Every variant names the offending property.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config file must contain a JSON object")]
    NotAnObject,

    #[error("config property \"{0}\" must exist and must be a string")]
    MissingString(&'static str),

    #[error("config property \"{field}\" must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("domain.name missing (domains[{index}])")]
    DomainNameMissing { index: usize },

    #[error("when present domain.dnsZoneName must be a string (domains[{index}])")]
    DnsZoneNameNotString { index: usize },
}

impl ConfigError {
    /// the config property this error is about, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingString(f) => Some(f),
            ConfigError::WrongType { field, .. } => Some(field),
            ConfigError::DomainNameMissing { .. } | ConfigError::DnsZoneNameNotString { .. } => {
                Some("domains")
            }
            ConfigError::Read { .. } | ConfigError::Parse { .. } | ConfigError::NotAnObject => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid stack name {name}\nMust only consist of alphanumeric characters and hyphens, must start with an alphabetical character, and cannot be longer than 128 characters.")]
    InvalidStackName { name: String },

    #[error("Invalid resource name {0:?}\nMust contain only alphanumeric characters [A-Za-z0-9] and be at most 255 characters")]
    InvalidResourceName(String),

    #[error("Validation failed on resource '{resource}'\n{message}")]
    Validation { resource: String, message: String },

    #[error("resource '{0}' is defined more than once")]
    DuplicateResource(String),

    #[error("Cannot retrieve value from context provider {provider} since the account is not specified")]
    UnresolvedEnvironment { provider: &'static str },

    #[error("missing required context value '{0}'")]
    MissingContext(&'static str),

    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("custom resource handler package not found at {0:?}\nBuild it with `cargo lambda build --release --arm64 -p custom_resource_handler --output-format zip` and point AWS_WEB_PUB_HANDLER_PACKAGE at the zip")]
    HandlerPackageMissing(PathBuf),

    #[error("failed to invoke {program}: {source}")]
    EngineSpawn {
        program: String,
        source: std::io::Error,
    },

    #[error("CDK {operation} failed with status: {}", status.map(|s| s.to_string()).unwrap_or_else(|| "terminated by signal".into()))]
    EngineFailed {
        operation: String,
        status: Option<i32>,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
