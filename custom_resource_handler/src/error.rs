use thiserror::Error;

/// Anything that makes a custom resource request fail. The message is what
/// CloudFormation shows as the failure reason.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0} is required")]
    MissingProperty(&'static str),

    #[error("unsupported resource type {0}")]
    UnsupportedResourceType(String),

    #[error("cloudfront request failed: {0}")]
    CloudFront(String),

    #[error("s3 request failed: {0}")]
    S3(String),

    #[error("failed to read deployment archive: {0}")]
    Archive(String),

    #[error("failed to send response: {0}")]
    Callback(String),

    #[error("response endpoint answered with status {0}")]
    CallbackStatus(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
