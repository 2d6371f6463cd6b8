use serde::Serialize;
use serde_json::Value;

use super::to_properties;
use crate::cfn::get_att;
use crate::hosted_zone::ZoneHandle;
use crate::stack::CfnResource;

/// the hosted zone id every cloudfront alias target lives in.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Value,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Route53RecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub hosted_zone_id: String,
    pub alias_target: AliasTarget,
    pub comment: String,
}

impl Route53RecordSet {
    /// an A record for `name` that aliases the distribution's domain name.
    pub fn cloudfront_alias(name: &str, zone: &ZoneHandle, distribution_logical_id: &str) -> Self {
        Self {
            name: name.to_string(),
            record_type: "A".into(),
            hosted_zone_id: zone.hosted_zone_id.clone(),
            alias_target: AliasTarget {
                dns_name: get_att(distribution_logical_id, "DomainName"),
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
            },
            comment: name.to_string(),
        }
    }
}

impl CfnResource for Route53RecordSet {
    fn type_string(&self) -> &str {
        "AWS::Route53::RecordSet"
    }

    fn properties(&self) -> crate::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Route53 record must have a name. Example mysubdomain.mywebsite.com".into());
        }
        if self.hosted_zone_id.is_empty() {
            return Err(format!("Route53 record {} has no hosted zone", self.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alias_record_points_at_distribution() {
        let zone = ZoneHandle {
            zone_name: "example.com".into(),
            hosted_zone_id: "Z123".into(),
        };
        let record = Route53RecordSet::cloudfront_alias("www.example.com", &zone, "WebDistribution");
        assert!(record.validate().is_ok());
        let props = record.properties().unwrap();
        assert_eq!(props["Type"], "A");
        assert_eq!(props["HostedZoneId"], "Z123");
        assert_eq!(
            props["AliasTarget"],
            json!({
                "DNSName": { "Fn::GetAtt": ["WebDistribution", "DomainName"] },
                "HostedZoneId": "Z2FDTNDATAQYW2",
            })
        );
    }
}
