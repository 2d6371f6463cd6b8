use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INVALIDATION_TYPE: &str = "Custom::CloudFrontInvalidation";
pub const BUCKET_DEPLOYMENT_TYPE: &str = "Custom::BucketDeployment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// what CloudFormation sends a custom resource's service token.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub resource_type: String,
    pub logical_resource_id: String,
    /// absent on Create
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Map<String, Value>,
}

impl CustomResourceEvent {
    /// a non-empty string property.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.resource_properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
