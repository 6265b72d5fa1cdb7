//! Parser for nmap-style service probe databases and a matcher that turns
//! captured responses into service identities.
//!
//! ```no_run
//! use probescope::{parse_file, DetectorConfig, ServiceDetector};
//!
//! let probes = parse_file("/usr/share/nmap/nmap-service-probes")?;
//! let detector = ServiceDetector::new(DetectorConfig::default());
//! if let Some(identity) = detector.identify_response(&probes, b"SSH-2.0-OpenSSH_8.9\r\n") {
//!     println!("{} via {}", identity.service, identity.probe);
//! }
//! # Ok::<(), probescope::ParseError>(())
//! ```
pub mod config;
pub mod detection;
pub mod error;
pub mod probes;

pub use config::DetectorConfig;
pub use detection::{
    resolve_version_info, Connector, PatternMatcher, RegexMatcher, ResponseMatcher, ServiceDetector,
    ServiceIdentity, Transport,
};
pub use error::{CpeError, MatchEngineError, ParseError, ParseResult, Partial, TransportError};
pub use probes::{
    parse_file, parse_match, parse_probes, parse_str, Cpe, CpePart, Match, MatchKind, Probe, Protocol,
    VersionInfo,
};
