use crate::manifest::ManifestEntry;

/// Which candidate updates a plan is allowed to include, each a predicate
/// over the manifest entry's `advisory` field. The exact threshold for
/// "recommended" vs. "latest" is a deployment policy concern, not a
/// constant baked in here; this only distinguishes security-tagged
/// entries from the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpdatePolicy {
    Manual,
    Recommended,
    Latest,
    SecurityOnly,
}

impl UpdatePolicy {
    pub fn allows(self, entry: &ManifestEntry) -> bool {
        match self {
            UpdatePolicy::Manual => false,
            UpdatePolicy::Recommended | UpdatePolicy::Latest => true,
            UpdatePolicy::SecurityOnly => entry.advisory.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::UpdateMethod;

    fn entry(advisory: Option<&str>) -> ManifestEntry {
        ManifestEntry {
            device_type: "s2.c2.large".to_string(),
            component: "BMC".to_string(),
            version: "3.2".to_string(),
            url: "https://example.com/bmc.bin".to_string(),
            sha256: "deadbeef".to_string(),
            method: UpdateMethod::Redfish,
            advisory: advisory.map(str::to_string),
        }
    }

    #[test]
    fn manual_allows_nothing() {
        assert!(!UpdatePolicy::Manual.allows(&entry(None)));
        assert!(!UpdatePolicy::Manual.allows(&entry(Some("CVE-1"))));
    }

    #[test]
    fn security_only_requires_an_advisory() {
        assert!(!UpdatePolicy::SecurityOnly.allows(&entry(None)));
        assert!(UpdatePolicy::SecurityOnly.allows(&entry(Some("CVE-1"))));
    }

    #[test]
    fn latest_allows_everything() {
        assert!(UpdatePolicy::Latest.allows(&entry(None)));
    }
}
