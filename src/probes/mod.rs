// Service probe database model: probes, match rules and version-info templates
pub mod cpe;
pub mod escape;
pub mod match_line;
pub mod parser;
pub mod version_info;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ParseError, ParseResult};

pub use cpe::{Cpe, CpePart};
pub use match_line::parse_match;
pub use parser::{parse_file, parse_probes, parse_str, ProbeBuilder};
pub use version_info::extract_version_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    TCP,
    UDP,
}

impl Protocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::TCP => "tcp",
            Protocol::UDP => "udp",
        }
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TCP" => Ok(Protocol::TCP),
            "UDP" => Ok(Protocol::UDP),
            other => Err(ParseError::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::TCP => write!(f, "TCP"),
            Protocol::UDP => write!(f, "UDP"),
        }
    }
}

/// One service fingerprinting definition.
///
/// `matches` keeps declaration order; the first rule that matches a
/// response wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub protocol: Protocol,
    #[serde(rename = "probename")]
    pub name: String,
    /// Raw probe string, still escaped as written in the database.
    #[serde(rename = "probestring", default)]
    pub probe_string: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(rename = "sslports", default, skip_serializing_if = "Vec::is_empty")]
    pub ssl_ports: Vec<String>,
    #[serde(rename = "totalwaitms", default, skip_serializing_if = "Option::is_none")]
    pub total_wait_ms: Option<String>,
    #[serde(rename = "tcpwrappedms", default, skip_serializing_if = "Option::is_none")]
    pub tcp_wrapped_ms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<Match>,
}

impl Probe {
    pub fn new(protocol: Protocol, name: impl Into<String>, probe_string: impl Into<String>) -> Self {
        Self {
            protocol,
            name: name.into(),
            probe_string: probe_string.into(),
            ports: Vec::new(),
            ssl_ports: Vec::new(),
            total_wait_ms: None,
            tcp_wrapped_ms: None,
            rarity: None,
            fallback: None,
            matches: Vec::new(),
        }
    }

    /// True when every field still holds its zero value.
    ///
    /// `protocol` has no zero value of its own, so TCP stands in for it.
    pub fn is_empty(&self) -> bool {
        self.protocol == Protocol::TCP
            && self.name.is_empty()
            && self.probe_string.is_empty()
            && self.ports.is_empty()
            && self.ssl_ports.is_empty()
            && self.total_wait_ms.is_none()
            && self.tcp_wrapped_ms.is_none()
            && self.rarity.is_none()
            && self.fallback.is_none()
            && self.matches.is_empty()
    }

    /// Bytes to put on the wire for this probe.
    ///
    /// When `host` is given, the first `{$host}` token is replaced before
    /// escape sequences are decoded.
    pub fn payload(&self, host: Option<&str>) -> ParseResult<Vec<u8>> {
        match host {
            Some(host) if self.probe_string.contains(HOST_TOKEN) => {
                escape::unescape(&self.probe_string.replacen(HOST_TOKEN, host, 1))
            }
            _ => escape::unescape(&self.probe_string),
        }
    }

    pub fn total_wait(&self) -> Option<Duration> {
        parse_millis(self.total_wait_ms.as_deref())
    }

    pub fn tcp_wrapped(&self) -> Option<Duration> {
        parse_millis(self.tcp_wrapped_ms.as_deref())
    }

    pub fn rarity_level(&self) -> Option<u8> {
        self.rarity.as_deref().and_then(|r| r.trim().parse().ok())
    }

    /// Names of the probes whose rules should also be tried on this
    /// probe's response.
    pub fn fallbacks(&self) -> impl Iterator<Item = &str> {
        self.fallback
            .as_deref()
            .into_iter()
            .flat_map(|f| f.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

const HOST_TOKEN: &str = "{$host}";

fn parse_millis(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Match,
    SoftMatch,
}

impl FromStr for MatchKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(MatchKind::Match),
            "softmatch" => Ok(MatchKind::SoftMatch),
            other => Err(ParseError::Malformed(format!("expected match or softmatch, got `{}`", other))),
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Match => write!(f, "match"),
            MatchKind::SoftMatch => write!(f, "softmatch"),
        }
    }
}

/// One fingerprint rule within a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    #[serde(default)]
    pub kind: MatchKind,
    pub pattern: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_flag: Option<String>,
    #[serde(rename = "versioninfo", default, skip_serializing_if = "VersionInfo::is_empty")]
    pub version_info: VersionInfo,
}

impl Match {
    pub fn is_soft(&self) -> bool {
        self.kind == MatchKind::SoftMatch
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.pattern_flag.as_deref().map_or(false, |f| f.contains(flag))
    }
}

/// Service metadata template attached to a match rule.
///
/// Every string field may hold placeholders (`$1`, `$P(2)`, ...) that are
/// expanded against captured bytes at detection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "vendorproductname", default, skip_serializing_if = "Option::is_none")]
    pub vendor_product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(rename = "operatingsystem", default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    #[serde(rename = "devicetype", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpe: Vec<Cpe>,
}

impl VersionInfo {
    pub fn is_empty(&self) -> bool {
        self.vendor_product_name.is_none()
            && self.version.is_none()
            && self.info.is_none()
            && self.hostname.is_none()
            && self.operating_system.is_none()
            && self.device_type.is_none()
            && self.cpe.is_empty()
    }

    /// Builds a new record with `f` applied to every string field and every
    /// identifier component. The template itself is left untouched.
    pub fn map_fields<F>(&self, mut f: F) -> VersionInfo
    where
        F: FnMut(&str) -> String,
    {
        VersionInfo {
            vendor_product_name: self.vendor_product_name.as_deref().map(&mut f),
            version: self.version.as_deref().map(&mut f),
            info: self.info.as_deref().map(&mut f),
            hostname: self.hostname.as_deref().map(&mut f),
            operating_system: self.operating_system.as_deref().map(&mut f),
            device_type: self.device_type.as_deref().map(&mut f),
            cpe: self.cpe.iter().map(|c| c.map_components(&mut f)).collect(),
        }
    }
}
