use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const TEMPLATE_VERSION: &str = "2010-09-09";

/// anything that can be rendered as a resource in a CloudFormation template.
pub trait CfnResource {
    fn type_string(&self) -> &str;
    fn properties(&self) -> Result<Value>;

    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// applied as both DeletionPolicy and UpdateReplacePolicy
    fn removal_policy(&self) -> Option<RemovalPolicy> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Delete,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: TEMPLATE_VERSION.to_string(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetPackaging {
    /// a directory, zipped by the engine before upload
    #[serde(rename = "zip")]
    ZipDirectory,
    /// a single file uploaded as is
    #[serde(rename = "file")]
    File,
}

/// a local file or directory the engine uploads to its assets bucket before deploying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAsset {
    pub hash: String,
    pub source_path: PathBuf,
    pub packaging: AssetPackaging,
}

impl FileAsset {
    pub fn object_key(&self) -> String {
        let extension = match self.packaging {
            AssetPackaging::ZipDirectory => Some("zip".to_string()),
            AssetPackaging::File => self
                .source_path
                .extension()
                .map(|e| e.to_string_lossy().to_string()),
        };
        match extension {
            Some(ext) => format!("{}.{}", self.hash, ext),
            None => self.hash.clone(),
        }
    }
}

/// a value the stack needed from the engine's context but didn't find.
/// the engine resolves these and runs synthesis again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingContext {
    pub key: String,
    pub provider: String,
    pub props: BTreeMap<String, Value>,
}

/// the in-memory template for one deployable stack.
#[derive(Debug)]
pub struct Stack {
    artifact_id: String,
    stack_name: String,
    template: SavedTemplate,
    assets: Vec<FileAsset>,
}

impl Stack {
    pub fn new(artifact_id: &str, stack_name: &str) -> Result<Self> {
        validate_stack_name(stack_name)?;
        Ok(Self {
            artifact_id: artifact_id.to_string(),
            stack_name: stack_name.to_string(),
            template: SavedTemplate::default(),
            assets: vec![],
        })
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn template(&self) -> &SavedTemplate {
        &self.template
    }

    pub fn assets(&self) -> &[FileAsset] {
        &self.assets
    }

    /// returns the saved resource so callers can attach dependencies.
    pub fn add_resource<R: CfnResource>(
        &mut self,
        logical_id: &str,
        resource: &R,
    ) -> Result<&mut SavedResource> {
        verify_resource_name(logical_id)?;
        if self.template.resources.contains_key(logical_id) {
            return Err(Error::DuplicateResource(logical_id.to_string()));
        }
        if let Err(e) = resource.validate() {
            return Err(Error::Validation {
                resource: logical_id.to_string(),
                message: e,
            });
        }
        let policy = resource.removal_policy();
        let saved = SavedResource {
            ty: resource.type_string().to_string(),
            properties: resource.properties()?,
            depends_on: vec![],
            deletion_policy: policy,
            update_replace_policy: policy,
        };
        tracing::trace!(logical_id, ty = %saved.ty, "adding resource");
        Ok(self
            .template
            .resources
            .entry(logical_id.to_string())
            .or_insert(saved))
    }

    pub fn add_output(&mut self, name: &str, value: Value) {
        self.template.outputs.insert(
            name.to_string(),
            ResourceOutput {
                description: None,
                value,
            },
        );
    }

    /// the same content is only uploaded once.
    pub fn add_file_asset(&mut self, asset: FileAsset) {
        if !self.assets.iter().any(|a| a.hash == asset.hash) {
            self.assets.push(asset);
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&SavedResource> {
        self.template.resources.get(logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        ty: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a SavedResource)> + 'a {
        self.template
            .resources
            .iter()
            .filter(move |(_, r)| r.ty == ty)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.template.outputs.get(name).map(|o| &o.value)
    }
}

/// Logical ids must be alphanumeric, and up to 255 characters.
pub fn verify_resource_name(resource_name: &str) -> Result<()> {
    let valid = !resource_name.is_empty()
        && resource_name.len() <= 255
        && resource_name.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(Error::InvalidResourceName(resource_name.to_string()));
    }
    Ok(())
}

/// A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
/// It must start with an alphabetical character and can't be longer than 128 characters.
pub fn validate_stack_name(stack_name: &str) -> Result<()> {
    let starts_alpha = stack_name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false);
    let valid = starts_alpha
        && stack_name.len() <= 128
        && stack_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(Error::InvalidStackName {
            name: stack_name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Thing {
        ok: bool,
    }

    impl CfnResource for Thing {
        fn type_string(&self) -> &str {
            "AWS::Test::Thing"
        }
        fn properties(&self) -> Result<Value> {
            Ok(json!({ "Ok": self.ok }))
        }
        fn validate(&self) -> std::result::Result<(), String> {
            if self.ok {
                Ok(())
            } else {
                Err("thing is not ok".into())
            }
        }
        fn removal_policy(&self) -> Option<RemovalPolicy> {
            Some(RemovalPolicy::Delete)
        }
    }

    #[test]
    fn stack_names_are_validated() {
        assert!(Stack::new("app", "my-site-2").is_ok());
        assert!(Stack::new("app", "2site").is_err());
        assert!(Stack::new("app", "my_site").is_err());
        assert!(Stack::new("app", "").is_err());
        assert!(Stack::new("app", &"a".repeat(129)).is_err());
    }

    #[test]
    fn resources_render_into_the_template() {
        let mut stack = Stack::new("app", "site").unwrap();
        stack
            .add_resource("Thing", &Thing { ok: true })
            .unwrap()
            .depends_on
            .push("Other".into());
        stack.add_output("Answer", json!("42"));

        let rendered = serde_json::to_value(stack.template()).unwrap();
        assert_eq!(rendered["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(rendered["Resources"]["Thing"]["Type"], "AWS::Test::Thing");
        assert_eq!(rendered["Resources"]["Thing"]["DependsOn"], json!(["Other"]));
        assert_eq!(rendered["Resources"]["Thing"]["DeletionPolicy"], "Delete");
        assert_eq!(rendered["Outputs"]["Answer"], json!({ "Value": "42" }));
    }

    #[test]
    fn duplicate_and_invalid_resources_are_rejected() {
        let mut stack = Stack::new("app", "site").unwrap();
        stack.add_resource("Thing", &Thing { ok: true }).unwrap();
        assert!(matches!(
            stack.add_resource("Thing", &Thing { ok: true }),
            Err(Error::DuplicateResource(_))
        ));
        assert!(matches!(
            stack.add_resource("Bad-Name", &Thing { ok: true }),
            Err(Error::InvalidResourceName(_))
        ));
        assert!(matches!(
            stack.add_resource("Broken", &Thing { ok: false }),
            Err(Error::Validation { .. })
        ));
    }

    /// json objects need string keys, so this can't be rendered.
    struct Unrenderable;

    impl CfnResource for Unrenderable {
        fn type_string(&self) -> &str {
            "AWS::Test::Thing"
        }
        fn properties(&self) -> Result<Value> {
            let props = BTreeMap::from([((1, 2), "pair")]);
            crate::resources::to_properties(&props)
        }
    }

    #[test]
    fn unrenderable_properties_are_an_error() {
        let mut stack = Stack::new("app", "site").unwrap();
        assert!(matches!(
            stack.add_resource("Thing", &Unrenderable),
            Err(Error::Json(_))
        ));
        assert!(stack.resource("Thing").is_none());
    }

    #[test]
    fn object_keys_follow_packaging() {
        let dir = FileAsset {
            hash: "abc".into(),
            source_path: "/tmp/site".into(),
            packaging: AssetPackaging::ZipDirectory,
        };
        assert_eq!(dir.object_key(), "abc.zip");
        let file = FileAsset {
            hash: "def".into(),
            source_path: "/tmp/handler.zip".into(),
            packaging: AssetPackaging::File,
        };
        assert_eq!(file.object_key(), "def.zip");
    }
}
