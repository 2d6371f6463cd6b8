//! CloudFormation intrinsic functions, built as plain JSON values so they can
//! be dropped into any resource property.

use serde_json::{json, Value};

pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// the WebsiteURL attribute of a bucket is `http://<domain>`, cloudfront origins
/// want just the domain:
/// { "Fn::Select" : [ "2", { "Fn::Split": ["/", { "Fn::GetAtt": ["bucket", "WebsiteURL"] }] } ] }
pub fn select_s3website_domain(bucket_logical_id: &str) -> Value {
    json!({
        "Fn::Select": [
            "2",
            { "Fn::Split": ["/", get_att(bucket_logical_id, "WebsiteURL")] }
        ]
    })
}

pub fn prefixed(prefix: &str, value: Value) -> Value {
    join("", vec![Value::String(prefix.to_string()), value])
}

/// length of the hash suffix `logical_id` appends.
pub const LOGICAL_ID_HASH_LEN: usize = 8;
const MAX_LOGICAL_ID_LEN: usize = 255;

/// strips everything CloudFormation doesn't allow in a logical id, then appends
/// a hash of the full name so names that only differ in stripped characters
/// stay distinct.
/// eg: `ARecord` + `www.my-site.com` -> `ARecordwwwmysitecom` + 8 hex chars
pub fn logical_id(prefix: &str, name: &str) -> String {
    let hash = blake3::hash(name.as_bytes()).to_hex();
    let suffix = hash.as_str()[..LOGICAL_ID_HASH_LEN].to_ascii_uppercase();
    let room = MAX_LOGICAL_ID_LEN.saturating_sub(prefix.len() + LOGICAL_ID_HASH_LEN);
    let mut out = prefix.to_string();
    out.extend(name.chars().filter(|c| c.is_ascii_alphanumeric()).take(room));
    out.push_str(&suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_ids_are_alphanumeric() {
        let id = logical_id("ARecord", "www.my-site.com");
        assert!(id.starts_with("ARecordwwwmysitecom"));
        assert_eq!(id.len(), "ARecordwwwmysitecom".len() + LOGICAL_ID_HASH_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(id, logical_id("ARecord", "www.my-site.com"));
    }

    #[test]
    fn names_differing_in_punctuation_get_distinct_ids() {
        assert_ne!(
            logical_id("ARecord", "ab.example.com"),
            logical_id("ARecord", "a-b.example.com")
        );
    }

    #[test]
    fn long_names_fit_the_logical_id_limit() {
        let name = format!("{}.example.com", "a".repeat(240));
        let id = logical_id("DomainRedirectsARecord", &name);
        assert_eq!(id.len(), 255);
        assert!(id.starts_with("DomainRedirectsARecordaaa"));
    }

    #[test]
    fn website_domain_is_selected_from_the_url() {
        let v = select_s3website_domain("Bucket");
        assert_eq!(v["Fn::Select"][0], "2");
        assert_eq!(
            v["Fn::Select"][1]["Fn::Split"][1],
            json!({ "Fn::GetAtt": ["Bucket", "WebsiteURL"] })
        );
    }
}
