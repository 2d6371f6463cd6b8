use serde::Serialize;
use serde_json::Value;

mod s3_bucket;
pub use s3_bucket::*;
mod cloudfront;
pub use cloudfront::*;
mod route53;
pub use route53::*;
mod acm_cert;
pub use acm_cert::*;
mod lambda;
pub use lambda::*;
mod custom_resource;
pub use custom_resource::*;

// higher level resources:
mod domain_redirect;
pub use domain_redirect::*;
mod bucket_deployment;
pub use bucket_deployment::*;

pub(crate) fn to_properties<T: Serialize>(props: &T) -> crate::Result<Value> {
    Ok(serde_json::to_value(props)?)
}
