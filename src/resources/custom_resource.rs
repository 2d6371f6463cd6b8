use serde_json::{Map, Value};

use crate::cfn::get_att;
use crate::stack::CfnResource;

/// a `Custom::*` resource whose lifecycle events go to a lambda function.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomResource {
    pub resource_type: String,
    pub service_token: Value,
    pub properties: Map<String, Value>,
}

impl CustomResource {
    pub fn new(resource_type: &str, function_logical_id: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            service_token: get_att(function_logical_id, "Arn"),
            properties: Map::new(),
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

impl CfnResource for CustomResource {
    fn type_string(&self) -> &str {
        &self.resource_type
    }

    fn properties(&self) -> crate::Result<Value> {
        let mut props = self.properties.clone();
        props.insert("ServiceToken".into(), self.service_token.clone());
        Ok(Value::Object(props))
    }

    fn validate(&self) -> Result<(), String> {
        let name = self.resource_type.strip_prefix("Custom::").unwrap_or_default();
        if name.is_empty() || name.len() > 60 {
            return Err(format!(
                "custom resource type {:?} must look like Custom::Name, with at most 60 characters after the prefix",
                self.resource_type
            ));
        }
        Ok(())
    }
}
