use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::project_config::DomainInfo;

/// a Route 53 hosted zone that records can be created in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneHandle {
    pub zone_name: String,
    /// the bare id, without the `/hostedzone/` prefix.
    pub hosted_zone_id: String,
}

/// the external lookup of a zone by name. Called at most once per zone name
/// by a `HostedZoneResolver`.
pub trait ZoneLookup {
    fn lookup(&mut self, zone_name: &str) -> Result<ZoneHandle>;
}

/// name of the zone a domain's records belong in: the explicit `dnsZoneName`,
/// otherwise everything after the first label, eg: `www.mysite.com` -> `mysite.com`.
pub fn zone_name(domain: &DomainInfo) -> &str {
    if let Some(zone) = &domain.dns_zone_name {
        return zone;
    }
    match domain.name.split_once('.') {
        Some((_, rest)) => rest,
        None => &domain.name,
    }
}

/// memoizes zone lookups for the duration of one stack construction.
pub struct HostedZoneResolver<L> {
    lookup: L,
    zones: HashMap<String, ZoneHandle>,
}

impl<L: ZoneLookup> HostedZoneResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            zones: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, domain: &DomainInfo) -> Result<ZoneHandle> {
        let name = zone_name(domain);
        if let Some(zone) = self.zones.get(name) {
            return Ok(zone.clone());
        }
        tracing::debug!(zone = name, domain = %domain.name, "looking up hosted zone");
        let zone = self.lookup.lookup(name)?;
        self.zones.insert(name.to_string(), zone.clone());
        Ok(zone)
    }

    /// domain name -> zone, sharing the cache with `resolve`.
    pub fn resolve_all(&mut self, domains: &[DomainInfo]) -> Result<BTreeMap<String, ZoneHandle>> {
        let mut out = BTreeMap::new();
        for domain in domains {
            out.insert(domain.name.clone(), self.resolve(domain)?);
        }
        Ok(out)
    }

    pub fn into_lookup(self) -> L {
        self.lookup
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// hands out fake zone ids and remembers every lookup it was asked for.
    #[derive(Default)]
    pub(crate) struct CountingLookup {
        pub calls: Vec<String>,
    }

    impl ZoneLookup for CountingLookup {
        fn lookup(&mut self, zone_name: &str) -> Result<ZoneHandle> {
            self.calls.push(zone_name.to_string());
            Ok(ZoneHandle {
                zone_name: zone_name.to_string(),
                hosted_zone_id: format!("Z{}", zone_name.replace('.', "").to_uppercase()),
            })
        }
    }

    #[test]
    fn zone_name_strips_leftmost_label() {
        assert_eq!(zone_name(&DomainInfo::new("www.example.com")), "example.com");
        assert_eq!(zone_name(&DomainInfo::new("a.b.example.co.uk")), "b.example.co.uk");
        assert_eq!(zone_name(&DomainInfo::new("localhost")), "localhost");
    }

    #[test]
    fn explicit_zone_name_wins() {
        let domain = DomainInfo::in_zone("example.com", "example.com");
        assert_eq!(zone_name(&domain), "example.com");
    }

    #[test]
    fn shared_zone_is_looked_up_once() {
        let mut resolver = HostedZoneResolver::new(CountingLookup::default());
        let domains = vec![
            DomainInfo::new("www.example.com"),
            DomainInfo::new("blog.example.com"),
            DomainInfo::in_zone("example.com", "example.com"),
            DomainInfo::new("www.other.org"),
        ];
        let zones = resolver.resolve_all(&domains).unwrap();
        assert_eq!(zones.len(), 4);
        assert_eq!(zones["www.example.com"], zones["example.com"]);
        assert_eq!(zones["www.other.org"].zone_name, "other.org");

        // a later single resolve still hits the cache
        resolver.resolve(&DomainInfo::new("shop.example.com")).unwrap();
        assert_eq!(
            resolver.into_lookup().calls,
            vec!["example.com".to_string(), "other.org".to_string()]
        );
    }
}
