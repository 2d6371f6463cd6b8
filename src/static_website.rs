//! The website stack: a public website bucket behind a CloudFront
//! distribution, with optional custom domains, a certificate for them, and
//! redirects from every secondary domain to the primary one.

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::cfn::{get_att, get_ref, join, logical_id, prefixed, select_s3website_domain};
use crate::error::Result;
use crate::hosted_zone::{HostedZoneResolver, ZoneLookup};
use crate::project_config::DomainInfo;
use crate::resources::{
    AcmCertificate, BucketDeployment, CertificateRef, CloudfrontDistribution, CustomErrorResponse,
    DomainRedirect, DomainValidationOption, PublicReadPolicy, PublicWebsite, RedirectSource,
    Route53RecordSet, S3Bucket,
};
use crate::stack::{FileAsset, Stack};

/// id of the stack inside the cloud assembly. The deployed stack is named after the project.
pub const ARTIFACT_ID: &str = "aws-web-pub";
pub const DEFAULT_COMMENT: &str = "aws-web-pub site";

pub const BUCKET_ID: &str = "Bucket";
pub const BUCKET_POLICY_ID: &str = "BucketPolicy";
pub const DISTRIBUTION_ID: &str = "WebDistribution";
pub const IMPORTED_CERT_ID: &str = "ImportedCert";
pub const GENERATED_CERT_ID: &str = "GeneratedCert";

/// which custom domains the site is served on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainTopology {
    None,
    Primary(DomainInfo),
    PrimaryWithRedirects {
        primary: DomainInfo,
        redirects: Vec<DomainInfo>,
    },
}

impl DomainTopology {
    /// the first domain is the primary one, the rest redirect to it.
    pub fn from_domains(domains: &[DomainInfo]) -> Self {
        match domains {
            [] => DomainTopology::None,
            [primary] => DomainTopology::Primary(primary.clone()),
            [primary, redirects @ ..] => DomainTopology::PrimaryWithRedirects {
                primary: primary.clone(),
                redirects: redirects.to_vec(),
            },
        }
    }

    pub fn primary(&self) -> Option<&DomainInfo> {
        match self {
            DomainTopology::None => None,
            DomainTopology::Primary(primary) => Some(primary),
            DomainTopology::PrimaryWithRedirects { primary, .. } => Some(primary),
        }
    }

    pub fn redirects(&self) -> &[DomainInfo] {
        match self {
            DomainTopology::PrimaryWithRedirects { redirects, .. } => redirects,
            _ => &[],
        }
    }

    /// primary first, then the redirects in config order.
    pub fn all(&self) -> Vec<DomainInfo> {
        self.primary()
            .into_iter()
            .chain(self.redirects())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackProps {
    pub stack_name: String,
    pub publish_dir: PathBuf,
    pub delete_old_files: bool,
    pub error_configurations: Vec<CustomErrorResponse>,
    pub topology: DomainTopology,
    pub certificate_arn: Option<String>,
}

/// the files the engine uploads for this stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAssets {
    /// the publish directory, zipped
    pub content: FileAsset,
    /// the custom resource handler's lambda package
    pub handler_package: FileAsset,
}

/// Composes the whole website stack. Zone lookups go through `zones`, which
/// only asks its lookup once per zone name.
pub fn build_stack<L: ZoneLookup>(
    props: &StackProps,
    assets: SiteAssets,
    zones: &mut HostedZoneResolver<L>,
) -> Result<Stack> {
    let mut stack = Stack::new(ARTIFACT_ID, &props.stack_name)?;
    let primary = props.topology.primary();
    let redirects = props.topology.redirects();

    let certificate = match primary {
        Some(primary) => Some(add_certificate(&mut stack, props, primary, redirects, zones)?),
        None => None,
    };

    stack.add_resource(BUCKET_ID, &S3Bucket::public_website(PublicWebsite::default()))?;
    stack.add_resource(
        BUCKET_POLICY_ID,
        &PublicReadPolicy {
            bucket_logical_id: BUCKET_ID.into(),
        },
    )?;

    let comment = primary.map(|d| d.name.as_str()).unwrap_or(DEFAULT_COMMENT);
    let viewer = match (&certificate, primary) {
        (Some(cert), Some(primary)) => Some((cert, vec![primary.name.clone()])),
        _ => None,
    };
    let distribution = CloudfrontDistribution::for_s3_website(BUCKET_ID, comment, viewer)
        .with_default_root_object("index.html")
        .with_error_responses(props.error_configurations.clone());
    stack.add_resource(DISTRIBUTION_ID, &distribution)?;

    if let Some(primary) = primary {
        let zone = zones.resolve(primary)?;
        let record = Route53RecordSet::cloudfront_alias(&primary.name, &zone, DISTRIBUTION_ID);
        stack.add_resource(&logical_id("ARecord", &primary.name), &record)?;
    }

    BucketDeployment {
        content: assets.content,
        handler_package: assets.handler_package,
        destination_bucket_id: BUCKET_ID,
        distribution_id: DISTRIBUTION_ID,
        prune: props.delete_old_files,
    }
    .add_to(&mut stack)?;

    let mut distribution_ids = vec![DISTRIBUTION_ID.to_string()];
    if let (Some(primary), Some(certificate)) = (primary, &certificate) {
        if !redirects.is_empty() {
            let mut sources = Vec::with_capacity(redirects.len());
            for domain in redirects {
                sources.push(RedirectSource {
                    domain_name: domain.name.clone(),
                    zone: zones.resolve(domain)?,
                });
            }
            let redirect = DomainRedirect {
                certificate,
                target_domain: &primary.name,
                sources,
            };
            distribution_ids.push(redirect.add_to(&mut stack)?);
        }
    }

    add_outputs(&mut stack, props, &distribution_ids);
    tracing::info!(
        stack = %props.stack_name,
        resources = stack.template().resources.len(),
        "built website stack"
    );
    Ok(stack)
}

fn add_certificate<L: ZoneLookup>(
    stack: &mut Stack,
    props: &StackProps,
    primary: &DomainInfo,
    redirects: &[DomainInfo],
    zones: &mut HostedZoneResolver<L>,
) -> Result<CertificateRef> {
    if let Some(arn) = &props.certificate_arn {
        tracing::debug!(logical_id = IMPORTED_CERT_ID, %arn, "using existing certificate");
        return Ok(CertificateRef::Imported(arn.clone()));
    }
    let resolved = zones.resolve_all(&props.topology.all())?;
    let validation_options = resolved
        .iter()
        .map(|(domain_name, zone)| DomainValidationOption {
            domain_name: domain_name.clone(),
            hosted_zone_id: zone.hosted_zone_id.clone(),
        })
        .collect();
    let sans = redirects.iter().map(|d| d.name.clone()).collect();
    let cert = AcmCertificate::dns_validated(&primary.name, sans, validation_options);
    stack.add_resource(GENERATED_CERT_ID, &cert)?;
    Ok(CertificateRef::Generated(GENERATED_CERT_ID.into()))
}

fn add_outputs(stack: &mut Stack, props: &StackProps, distribution_ids: &[String]) {
    stack.add_output("BucketName", get_ref(BUCKET_ID));
    stack.add_output("S3Url", prefixed("http://", select_s3website_domain(BUCKET_ID)));

    let ids: Vec<Value> = distribution_ids.iter().map(|id| get_ref(id)).collect();
    stack.add_output("WebDistributionIds", join(", ", ids));
    let urls: Vec<Value> = distribution_ids
        .iter()
        .map(|id| prefixed("https://", get_att(id, "DomainName")))
        .collect();
    stack.add_output("WebDistributionUrls", join(", ", urls));

    let redirecting: Vec<String> = props
        .topology
        .redirects()
        .iter()
        .map(|d| format!("https://{}", d.name))
        .collect();
    stack.add_output("RedirectingUrls", json!(redirecting.join(", ")));

    let url = match props.topology.primary() {
        Some(primary) => format!("https://{}", primary.name),
        None => String::new(),
    };
    stack.add_output("Urls", json!(url));
}
