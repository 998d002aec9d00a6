use diesel::result::Error as DieselError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Missing argument: {0}")]
    MissingArgument(String),
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("Step not found: {0}")]
    StepNotFound(String),
    #[error("No workflow is resolved for this conversation")]
    NoActiveWorkflow,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Delegate error: {0}")]
    Delegate(String),
    #[error("History error: {0}")]
    History(String),
    #[error("Diesel error: {0}")]
    DieselError(#[from] DieselError),
    #[error("Pool error: {0}")]
    PoolError(#[from] r2d2::Error),
    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
