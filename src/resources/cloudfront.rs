use serde::Serialize;
use serde_json::Value;

use super::{to_properties, CertificateRef};
use crate::cfn::select_s3website_domain;
use crate::stack::CfnResource;

/// caching optimized:
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html#managed-cache-caching-optimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";
pub const DEFAULT_ORIGIN_ID: &str = "origin1";
/// longest `DistributionConfig.Comment` CloudFront accepts, in characters.
pub const MAX_COMMENT_LENGTH: usize = 128;

/// cuts `comment` down to what CloudFront accepts.
pub fn truncate_comment(comment: &str) -> String {
    comment.chars().take(MAX_COMMENT_LENGTH).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomOriginConfig {
    #[serde(rename = "HTTPPort")]
    pub http_port: u16,
    #[serde(rename = "HTTPSPort")]
    pub https_port: u16,
    #[serde(rename = "OriginProtocolPolicy")]
    pub origin_protocol_policy: String,
}

impl Default for CustomOriginConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            https_port: 443,
            // s3 website endpoints only speak http
            origin_protocol_policy: "http-only".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub domain_name: Value,
    pub id: String,
    pub custom_origin_config: CustomOriginConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: String,
    pub cache_policy_id: String,
    pub compress: bool,
}

impl DefaultCacheBehavior {
    pub fn to_origin(origin_id: &str) -> Self {
        Self {
            target_origin_id: origin_id.to_string(),
            viewer_protocol_policy: "redirect-to-https".into(),
            cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.into(),
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acm_certificate_arn: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_front_default_certificate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_support_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_protocol_version: Option<String>,
}

impl ViewerCertificate {
    pub fn from_acm(certificate: &CertificateRef) -> Self {
        Self {
            acm_certificate_arn: Some(certificate.arn()),
            cloud_front_default_certificate: None,
            ssl_support_method: Some("sni-only".into()),
            minimum_protocol_version: Some("TLSv1.2_2021".into()),
        }
    }

    /// the shared `*.cloudfront.net` certificate, no aliases possible.
    pub fn cloudfront_default() -> Self {
        Self {
            cloud_front_default_certificate: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomErrorResponse {
    #[serde(rename = "ErrorCode")]
    pub error_code: u16,
    #[serde(rename = "ResponseCode", skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(rename = "ResponsePagePath", skip_serializing_if = "Option::is_none")]
    pub response_page_path: Option<String>,
    #[serde(rename = "ErrorCachingMinTTL", skip_serializing_if = "Option::is_none")]
    pub error_caching_min_ttl: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub comment: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_error_responses: Vec<CustomErrorResponse>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_root_object: Option<String>,
    pub enabled: bool,
    pub http_version: String,
    pub origins: Vec<Origin>,
    pub price_class: String,
    pub viewer_certificate: ViewerCertificate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudfrontDistribution {
    pub distribution_config: DistributionConfig,
}

impl CloudfrontDistribution {
    /// a distribution whose single origin is the website endpoint of `bucket_logical_id`.
    /// aliases are only attached when there's a certificate to serve them with.
    /// comments longer than CloudFront allows are truncated.
    pub fn for_s3_website(
        bucket_logical_id: &str,
        comment: &str,
        certificate: Option<(&CertificateRef, Vec<String>)>,
    ) -> Self {
        let (aliases, viewer_certificate) = match certificate {
            Some((cert, aliases)) => (aliases, ViewerCertificate::from_acm(cert)),
            None => (vec![], ViewerCertificate::cloudfront_default()),
        };
        Self {
            distribution_config: DistributionConfig {
                aliases,
                comment: truncate_comment(comment),
                custom_error_responses: vec![],
                default_cache_behavior: DefaultCacheBehavior::to_origin(DEFAULT_ORIGIN_ID),
                default_root_object: None,
                enabled: true,
                http_version: "http2".into(),
                origins: vec![Origin {
                    domain_name: select_s3website_domain(bucket_logical_id),
                    id: DEFAULT_ORIGIN_ID.into(),
                    custom_origin_config: CustomOriginConfig::default(),
                }],
                price_class: "PriceClass_100".into(),
                viewer_certificate,
            },
        }
    }

    pub fn with_default_root_object(mut self, object: &str) -> Self {
        self.distribution_config.default_root_object = Some(object.to_string());
        self
    }

    pub fn with_error_responses(mut self, responses: Vec<CustomErrorResponse>) -> Self {
        self.distribution_config.custom_error_responses = responses;
        self
    }
}

impl CfnResource for CloudfrontDistribution {
    fn type_string(&self) -> &str {
        "AWS::CloudFront::Distribution"
    }

    fn properties(&self) -> crate::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if config.origins.is_empty() {
            return Err("Must provide at least one origin to cloudfront distribution".into());
        }
        if !config
            .origins
            .iter()
            .any(|o| o.id == config.default_cache_behavior.target_origin_id)
        {
            return Err(format!(
                "default cache behavior targets unknown origin '{}'",
                config.default_cache_behavior.target_origin_id
            ));
        }
        if config.comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(format!(
                "cloudfront distribution comment is longer than {MAX_COMMENT_LENGTH} characters"
            ));
        }
        if !config.aliases.is_empty() && config.viewer_certificate.acm_certificate_arn.is_none() {
            return Err("cloudfront distribution aliases require an ACM certificate".into());
        }
        Ok(())
    }
}
