use serde::Serialize;
use serde_json::{json, Value};

use super::to_properties;
use crate::cfn::{get_ref, sub};
use crate::stack::{CfnResource, RemovalPolicy};

pub struct PublicWebsite {
    pub index_document: String,
    pub error_document: String,
}

impl Default for PublicWebsite {
    fn default() -> Self {
        Self {
            index_document: "index.html".into(),
            // CloudFormation doesn't require this but the S3 console ui does
            error_document: "error.html".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedirectAllRequestsTo {
    pub host_name: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_all_requests_to: Option<RedirectAllRequestsTo>,
}

impl From<PublicWebsite> for WebsiteConfiguration {
    fn from(website: PublicWebsite) -> Self {
        Self {
            index_document: Some(website.index_document),
            error_document: Some(website.error_document),
            redirect_all_requests_to: None,
        }
    }
}

/// new buckets block public policies by default, website buckets need them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlockConfiguration {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    pub fn allow_public_policy() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: false,
            ignore_public_acls: true,
            restrict_public_buckets: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Bucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
    #[serde(skip)]
    pub removal_policy: Option<RemovalPolicy>,
}

impl S3Bucket {
    /// a publicly readable website bucket that goes away with the stack.
    pub fn public_website(website: PublicWebsite) -> Self {
        Self {
            website_configuration: Some(website.into()),
            public_access_block_configuration: Some(
                PublicAccessBlockConfiguration::allow_public_policy(),
            ),
            removal_policy: Some(RemovalPolicy::Delete),
        }
    }

    /// a website bucket with no content that sends every request to `host_name`.
    pub fn redirect_all_to(host_name: &str, protocol: &str) -> Self {
        Self {
            website_configuration: Some(WebsiteConfiguration {
                redirect_all_requests_to: Some(RedirectAllRequestsTo {
                    host_name: host_name.to_string(),
                    protocol: protocol.to_string(),
                }),
                ..Default::default()
            }),
            public_access_block_configuration: None,
            removal_policy: Some(RemovalPolicy::Delete),
        }
    }
}

impl CfnResource for S3Bucket {
    fn type_string(&self) -> &str {
        "AWS::S3::Bucket"
    }

    fn properties(&self) -> crate::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(website) = &self.website_configuration {
            if website.redirect_all_requests_to.is_some() && website.index_document.is_some() {
                return Err("a redirecting bucket website cannot also have an index document".into());
            }
        }
        Ok(())
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        self.removal_policy
    }
}

/// lets anyone read objects of the bucket.
pub struct PublicReadPolicy {
    pub bucket_logical_id: String,
}

impl CfnResource for PublicReadPolicy {
    fn type_string(&self) -> &str {
        "AWS::S3::BucketPolicy"
    }

    fn properties(&self) -> crate::Result<Value> {
        let bucket = &self.bucket_logical_id;
        Ok(json!({
            "Bucket": get_ref(bucket),
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": "s3:GetObject",
                    "Effect": "Allow",
                    "Principal": "*",
                    "Resource": sub(&format!("arn:aws:s3:::${{{bucket}}}/*")),
                }]
            }
        }))
    }
}
