// Detection side: resolve version-info templates against live responses
pub mod detector;
pub mod matcher;
pub mod placeholders;
pub mod transport;

use serde::{Deserialize, Serialize};

use crate::probes::{Match, MatchKind, VersionInfo};

pub use detector::ServiceDetector;
pub use matcher::{PatternMatcher, RegexMatcher, ResponseMatcher};
pub use placeholders::expand;
pub use transport::{Connector, Transport};

/// Outcome of a successful response match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Service name from the winning rule.
    pub service: String,
    #[serde(default)]
    pub kind: MatchKind,
    /// Name of the probe whose response matched.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub probe: String,
    #[serde(rename = "versioninfo", default, skip_serializing_if = "VersionInfo::is_empty")]
    pub version_info: VersionInfo,
}

impl ServiceIdentity {
    /// Build the identity for `rule` from the groups it captured.
    pub fn resolve<B: AsRef<[u8]>>(probe: &str, rule: &Match, groups: &[B]) -> Self {
        Self {
            service: rule.name.clone(),
            kind: rule.kind,
            probe: probe.to_string(),
            version_info: resolve_version_info(&rule.version_info, groups),
        }
    }

    pub fn is_soft(&self) -> bool {
        self.kind == MatchKind::SoftMatch
    }
}

/// Expand every placeholder in `template`, CPE components included.
pub fn resolve_version_info<B: AsRef<[u8]>>(template: &VersionInfo, groups: &[B]) -> VersionInfo {
    template.map_fields(|field| placeholders::expand(field, groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::parse_match;

    #[test]
    fn test_resolve_version_info() {
        let rule = parse_match(
            r#"match vshell m|^SSH-2\.0-(\d+)_(\S+) VShell| p/VanDyke VShell sshd/ v/$SUBST(2,"_",".")/ i/build $1/ cpe:/a:vandyke:vshell:$SUBST(2,"_",".")/"#,
        )
        .unwrap();
        let groups: Vec<&[u8]> = vec![&b"SSH-2.0-7_2_3_578 VShell"[..], &b"7"[..], &b"2_3_578"[..]];

        let identity = ServiceIdentity::resolve("NULL", &rule, &groups);
        assert_eq!(identity.service, "vshell");
        assert_eq!(identity.probe, "NULL");
        assert!(!identity.is_soft());
        assert_eq!(identity.version_info.version.as_deref(), Some("2.3.578"));
        assert_eq!(identity.version_info.info.as_deref(), Some("build 7"));
        assert_eq!(identity.version_info.cpe[0].version, "2.3.578");

        // the template is not touched
        assert_eq!(rule.version_info.info.as_deref(), Some("build $1"));
    }

    #[test]
    fn test_identity_serialization() {
        let identity = ServiceIdentity {
            service: "ssh".to_string(),
            kind: MatchKind::SoftMatch,
            probe: "NULL".to_string(),
            version_info: VersionInfo::default(),
        };
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(json, r#"{"service":"ssh","kind":"softmatch","probe":"NULL"}"#);

        let back: ServiceIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
