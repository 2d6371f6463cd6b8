use serde::Serialize;
use serde_json::Value;

use super::to_properties;
use crate::cfn::get_ref;
use crate::stack::CfnResource;

/// the certificate a distribution serves its aliases with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateRef {
    /// an existing certificate, by ARN
    Imported(String),
    /// logical id of a certificate created in this stack
    Generated(String),
}

impl CertificateRef {
    pub fn arn(&self) -> Value {
        match self {
            CertificateRef::Imported(arn) => Value::String(arn.clone()),
            // Ref on a certificate gives back its ARN
            CertificateRef::Generated(logical_id) => get_ref(logical_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: String,
}

/// An ACM certificate validated through DNS records that CloudFormation
/// creates in the hosted zone of each domain. Only works when every domain is
/// hosted in Route 53 in the same account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AcmCertificate {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl AcmCertificate {
    pub fn dns_validated(
        domain_name: &str,
        subject_alternative_names: Vec<String>,
        domain_validation_options: Vec<DomainValidationOption>,
    ) -> Self {
        Self {
            domain_name: domain_name.to_string(),
            subject_alternative_names,
            validation_method: "DNS".into(),
            domain_validation_options,
        }
    }
}

/// Examples of valid values:
/// - www.mysite.com
/// - multiple.sub.domains.mysite.com
/// - *.mysite.com
///
/// Examples of invalid values:
/// - *.something.*.mysite.com
/// - cannotendwithdot.com.
fn validate_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("Must provide a domain name".into());
    }
    if domain.ends_with('.') {
        return Err(format!("{domain} must not end with a dot"));
    }
    if domain.contains('*') {
        if domain.matches('*').count() > 1 {
            return Err(format!("Must only provide 1 wildcard. {domain} is invalid."));
        }
        if !domain.starts_with("*.") {
            return Err(format!("If using a wildcard, it must be the first component of your domain, eg: \"*.something.com\". {domain} is invalid."));
        }
    }
    Ok(())
}

impl CfnResource for AcmCertificate {
    fn type_string(&self) -> &str {
        "AWS::CertificateManager::Certificate"
    }

    fn properties(&self) -> crate::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        validate_domain(&self.domain_name)?;
        for name in &self.subject_alternative_names {
            validate_domain(name)?;
        }
        let all_names = std::iter::once(&self.domain_name).chain(&self.subject_alternative_names);
        for name in all_names {
            if !self.domain_validation_options.iter().any(|o| &o.domain_name == name) {
                return Err(format!("no hosted zone to validate {name} with"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(name: &str) -> DomainValidationOption {
        DomainValidationOption {
            domain_name: name.into(),
            hosted_zone_id: "Z1".into(),
        }
    }

    #[test]
    fn wildcards_must_lead() {
        assert!(validate_domain("*.example.com").is_ok());
        assert!(validate_domain("www.*.example.com").is_err());
        assert!(validate_domain("*.*.example.com").is_err());
        assert!(validate_domain("example.com.").is_err());
        assert!(validate_domain("").is_err());
    }

    #[test]
    fn every_name_needs_a_validation_zone() {
        let cert = AcmCertificate::dns_validated(
            "example.com",
            vec!["www.example.com".into()],
            vec![option("example.com")],
        );
        assert!(cert.validate().is_err());

        let cert = AcmCertificate::dns_validated(
            "example.com",
            vec!["www.example.com".into()],
            vec![option("example.com"), option("www.example.com")],
        );
        assert!(cert.validate().is_ok());
        assert_eq!(cert.properties().unwrap()["ValidationMethod"], "DNS");
    }

    #[test]
    fn generated_certificate_arn_is_a_ref() {
        assert_eq!(
            CertificateRef::Generated("GeneratedCert".into()).arn(),
            serde_json::json!({ "Ref": "GeneratedCert" })
        );
    }
}
