use crate::cfn::logical_id;
use crate::error::Result;
use crate::hosted_zone::ZoneHandle;
use crate::stack::Stack;

use super::{CertificateRef, CloudfrontDistribution, Route53RecordSet, S3Bucket};

pub const DOMAIN_REDIRECTS_PREFIX: &str = "DomainRedirects";

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectSource {
    pub domain_name: String,
    pub zone: ZoneHandle,
}

/// Sends every request for the source domains to `https://<target_domain>`.
/// An empty bucket with a redirect-all website configuration sits behind a
/// distribution that serves all source domains with the shared certificate.
pub struct DomainRedirect<'a> {
    pub certificate: &'a CertificateRef,
    pub target_domain: &'a str,
    pub sources: Vec<RedirectSource>,
}

impl DomainRedirect<'_> {
    pub fn bucket_id() -> String {
        format!("{DOMAIN_REDIRECTS_PREFIX}RedirectBucket")
    }

    pub fn distribution_id() -> String {
        format!("{DOMAIN_REDIRECTS_PREFIX}WebDistribution")
    }

    /// adds the redirect resources and returns the logical id of its distribution.
    pub fn add_to(&self, stack: &mut Stack) -> Result<String> {
        let bucket_id = Self::bucket_id();
        let distribution_id = Self::distribution_id();
        stack.add_resource(&bucket_id, &S3Bucket::redirect_all_to(self.target_domain, "https"))?;

        let aliases: Vec<String> = self.sources.iter().map(|s| s.domain_name.clone()).collect();
        let comment = format!("Redirect to {} from {}", self.target_domain, aliases.join(", "));
        let distribution = CloudfrontDistribution::for_s3_website(
            &bucket_id,
            &comment,
            Some((self.certificate, aliases)),
        );
        stack.add_resource(&distribution_id, &distribution)?;

        for source in &self.sources {
            let record = Route53RecordSet::cloudfront_alias(&source.domain_name, &source.zone, &distribution_id);
            let record_id = logical_id(&format!("{DOMAIN_REDIRECTS_PREFIX}ARecord"), &source.domain_name);
            stack.add_resource(&record_id, &record)?;
        }
        tracing::debug!(
            target_domain = self.target_domain,
            sources = self.sources.len(),
            "added domain redirects"
        );
        Ok(distribution_id)
    }
}
