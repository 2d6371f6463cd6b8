//! Publishes a static website to AWS: an S3 website bucket behind CloudFront,
//! with optional custom domains, certificates and redirect domains, deployed
//! through the CDK toolkit.

pub mod assembly;
pub mod cdk;
pub mod cfn;
pub mod error;
pub mod hosted_zone;
pub mod project_config;
pub mod resources;
pub mod stack;
pub mod static_website;

pub use error::{ConfigError, Error, Result};
