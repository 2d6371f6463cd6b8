use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::resources::CustomErrorResponse;
use crate::static_website::{DomainTopology, StackProps};

/// name of the project file, looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = ".aws-web-pub.json";

/// single page apps get every "not found"-ish origin response rewritten to `/`.
pub const SPA_ERROR_CODES: [u16; 3] = [400, 403, 404];
pub const SPA_ERROR_CACHING_MIN_TTL: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    /// fully qualified, eg: `www.mysite.com`
    pub name: String,
    /// zone the records for `name` live in. Derived from `name` when missing.
    pub dns_zone_name: Option<String>,
}

impl DomainInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dns_zone_name: None,
        }
    }

    pub fn in_zone(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dns_zone_name: Some(zone.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectConfig {
    pub project_name: String,
    pub publish_dir: String,
    pub delete_old_files: Option<bool>,
    pub not_found_path: Option<String>,
    pub is_single_page_app: Option<bool>,
    pub domains: Option<Vec<DomainInfo>>,
    pub certificate_arn: Option<String>,
}

impl ProjectConfig {
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }

    /// reads and validates `<project_dir>/.aws-web-pub.json`
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(project_dir);
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        let config = Self::from_value(&value)?;
        tracing::debug!(project = %config.project_name, "loaded project config");
        Ok(config)
    }

    /// validates a parsed config. Stops at the first invalid property, in this order:
    /// projectName, publishDir, notFoundPath, deleteOldFiles, isSinglePageApp, domains, certificateArn.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let obj = value.as_object().ok_or(ConfigError::NotAnObject)?;
        let project_name = required_str(obj, "projectName")?;
        let publish_dir = required_str(obj, "publishDir")?;
        let not_found_path = optional_str(obj, "notFoundPath")?;
        let delete_old_files = optional_bool(obj, "deleteOldFiles")?;
        let is_single_page_app = optional_bool(obj, "isSinglePageApp")?;
        let domains = match present(obj, "domains") {
            None => None,
            Some(Value::Array(items)) => Some(parse_domains(items)?),
            Some(_) => {
                return Err(ConfigError::WrongType {
                    field: "domains",
                    expected: "array",
                })
            }
        };
        let certificate_arn = optional_str(obj, "certificateArn")?;

        Ok(Self {
            project_name,
            publish_dir,
            delete_old_files,
            not_found_path,
            is_single_page_app,
            domains,
            certificate_arn,
        })
    }

    /// everything the website stack needs, derived once from the project config.
    /// `project_dir` is expected to be absolute already.
    pub fn stack_props(&self, project_dir: &Path) -> StackProps {
        let domains = self.domains.as_deref().unwrap_or_default();
        StackProps {
            stack_name: self.project_name.clone(),
            publish_dir: project_dir.join(&self.publish_dir),
            delete_old_files: self.delete_old_files.unwrap_or(false),
            error_configurations: self.error_configurations(),
            topology: DomainTopology::from_domains(domains),
            certificate_arn: self.certificate_arn.clone(),
        }
    }

    /// single page app rules win over a custom not found page.
    pub fn error_configurations(&self) -> Vec<CustomErrorResponse> {
        if self.is_single_page_app.unwrap_or(false) {
            return SPA_ERROR_CODES
                .iter()
                .map(|code| CustomErrorResponse {
                    error_code: *code,
                    response_code: Some(200),
                    response_page_path: Some("/".into()),
                    error_caching_min_ttl: Some(SPA_ERROR_CACHING_MIN_TTL),
                })
                .collect();
        }
        match &self.not_found_path {
            Some(path) => vec![CustomErrorResponse {
                error_code: 404,
                response_code: Some(404),
                response_page_path: Some(path.clone()),
                error_caching_min_ttl: None,
            }],
            None => vec![],
        }
    }
}

/// `null` counts as absent.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, ConfigError> {
    match present(obj, field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ConfigError::MissingString(field)),
    }
}

/// an empty string is treated the same as leaving the property out.
fn optional_str(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ConfigError> {
    match present(obj, field) {
        None => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn optional_bool(obj: &Map<String, Value>, field: &'static str) -> Result<Option<bool>, ConfigError> {
    match present(obj, field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ConfigError::WrongType {
            field,
            expected: "boolean",
        }),
    }
}

fn parse_domains(items: &[Value]) -> Result<Vec<DomainInfo>, ConfigError> {
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let name = match item.get("name") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ConfigError::DomainNameMissing { index }),
        };
        let dns_zone_name = match item.get("dnsZoneName").filter(|v| !v.is_null()) {
            None => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ConfigError::DnsZoneNameNotString { index }),
        };
        out.push(DomainInfo {
            name,
            dns_zone_name,
        });
    }
    Ok(out)
}
