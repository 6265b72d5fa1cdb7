// Probe block assembler: groups directive lines into probe records
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::error::{ParseError, ParseResult};
use crate::probes::{parse_match, Probe, Protocol};

/// Accumulates the directives that follow one `Probe` header.
#[derive(Debug)]
pub struct ProbeBuilder {
    probe: Probe,
}

impl ProbeBuilder {
    pub fn new(protocol: Protocol, name: &str, probe_string: &str) -> Self {
        Self {
            probe: Probe::new(protocol, name, probe_string),
        }
    }

    /// Parse a `Probe <TCP|UDP> <name> q|<probe string>|` header.
    pub fn from_header(line: &str) -> ParseResult<Self> {
        let mut segments = line.splitn(4, ' ');
        let (protocol, name, raw) = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(protocol), Some(name), Some(raw)) => (protocol, name, raw),
            _ => return Err(ParseError::Malformed(format!("incomplete probe header: {}", line))),
        };

        let protocol: Protocol = protocol.parse()?;
        let probe_string = raw.strip_prefix("q|").unwrap_or(raw);
        let probe_string = probe_string.strip_suffix('|').unwrap_or(probe_string);

        Ok(Self::new(protocol, name, probe_string))
    }

    /// Apply one non-header directive line.
    pub fn apply(&mut self, line: &str) {
        if line.starts_with("match ") || line.starts_with("softmatch ") {
            match parse_match(line) {
                Ok(rule) => self.probe.matches.push(rule),
                Err(ParseError::IncompleteMatch(partial)) => {
                    debug!("Keeping partial rule in probe {}: {} ({})", self.probe.name, partial, line);
                    self.probe.matches.push((*partial).into_inner());
                }
                Err(e) => debug!("Dropping rule in probe {}: {} ({})", self.probe.name, e, line),
            }
        } else if let Some(rest) = line.strip_prefix("ports ") {
            self.probe.ports = split_list(rest);
        } else if let Some(rest) = line.strip_prefix("sslports ") {
            self.probe.ssl_ports = split_list(rest);
        } else if let Some(rest) = line.strip_prefix("totalwaitms ") {
            self.probe.total_wait_ms = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("tcpwrappedms ") {
            self.probe.tcp_wrapped_ms = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("rarity ") {
            self.probe.rarity = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("fallback ") {
            self.probe.fallback = Some(rest.to_string());
        } else {
            trace!("Ignoring unknown directive: {}", line);
        }
    }

    pub fn build(self) -> Probe {
        self.probe
    }
}

fn split_list(rest: &str) -> Vec<String> {
    rest.split(',').map(str::to_string).collect()
}

fn flush(current: &mut Option<ProbeBuilder>, probes: &mut Vec<Probe>) {
    if let Some(builder) = current.take() {
        let probe = builder.build();
        if !probe.is_empty() {
            probes.push(probe);
        }
    }
}

/// Assemble probes from a stream of database lines.
///
/// Malformed headers and rules are dropped and parsing carries on; only a
/// read failure aborts. A rule whose version info stops at an unterminated
/// field is kept with the fields read so far. A header with an unsupported protocol is ignored
/// entirely, so the directives after it keep attaching to the probe that
/// was already open.
pub fn parse_probes<R: BufRead>(reader: R) -> ParseResult<Vec<Probe>> {
    let mut probes = Vec::new();
    let mut current: Option<ProbeBuilder> = None;

    for (index, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let text = String::from_utf8_lossy(&raw);
        let line = text.strip_suffix('\r').unwrap_or(&text);

        if line.is_empty() || line.starts_with('#') || line.starts_with("Exclude ") {
            continue;
        }

        if line.starts_with("Probe ") {
            match ProbeBuilder::from_header(line) {
                Ok(builder) => {
                    flush(&mut current, &mut probes);
                    current = Some(builder);
                }
                Err(e) => warn!("Ignoring probe header on line {}: {}", index + 1, e),
            }
            continue;
        }

        match current.as_mut() {
            Some(builder) => builder.apply(line),
            None => debug!("Directive before first probe on line {}: {}", index + 1, line),
        }
    }

    flush(&mut current, &mut probes);
    Ok(probes)
}

/// Parse a probe database held in memory.
pub fn parse_str(source: &str) -> Vec<Probe> {
    // Reading from memory cannot fail.
    parse_probes(Cursor::new(source)).unwrap_or_default()
}

/// Parse the probe database at `path`.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Vec<Probe>> {
    let file = File::open(path.as_ref())?;
    let probes = parse_probes(BufReader::new(file))?;
    debug!("Loaded {} probes from {}", probes.len(), path.as_ref().display());
    Ok(probes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATABASE: &str = r#"# Nmap service detection probe list
Exclude T:9100-9107

Probe TCP NULL q||
totalwaitms 6000
tcpwrappedms 3000
match ftp m|^220 ProFTPD (\d\S+) Server| p/ProFTPD/ v/$1/ cpe:/a:proftpd:proftpd:$1/
softmatch ftp m|^220 ([-.\w]+) FTP|i h/$1/

Probe TCP GetRequest q|GET / HTTP/1.0\r\n\r\n|
rarity 1
ports 80,81,8080
sslports 443,8443
fallback NULL
match http m|^HTTP/1\.[01] \d\d\d .*\r\nServer: nginx/([\d.]+)|s p/nginx/ v/$1/
"#;

    #[test]
    fn test_parse_probe_blocks() {
        let probes = parse_str(DATABASE);
        assert_eq!(probes.len(), 2);

        let null = &probes[0];
        assert_eq!(null.protocol, Protocol::TCP);
        assert_eq!(null.name, "NULL");
        assert_eq!(null.probe_string, "");
        assert_eq!(null.total_wait_ms.as_deref(), Some("6000"));
        assert_eq!(null.tcp_wrapped_ms.as_deref(), Some("3000"));
        assert_eq!(null.matches.len(), 2);
        assert!(null.matches[1].is_soft());

        let get = &probes[1];
        assert_eq!(get.name, "GetRequest");
        assert_eq!(get.probe_string, r"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(get.rarity.as_deref(), Some("1"));
        assert_eq!(get.ports, vec!["80", "81", "8080"]);
        assert_eq!(get.ssl_ports, vec!["443", "8443"]);
        assert_eq!(get.fallback.as_deref(), Some("NULL"));
        assert_eq!(get.matches.len(), 1);
        assert_eq!(get.matches[0].pattern_flag.as_deref(), Some("s"));
    }

    #[test]
    fn test_unsupported_protocol_header_is_ignored() {
        let source = "Probe TCP First q|a|\n\
                      match one m|^one|\n\
                      Probe SCTP Bogus q|b|\n\
                      match two m|^two|\n\
                      Probe UDP Second q|c|\n\
                      match three m|^three|\n";
        let probes = parse_str(source);

        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].name, "First");
        assert_eq!(probes[0].matches.len(), 2);
        assert_eq!(probes[0].matches[1].name, "two");
        assert_eq!(probes[1].protocol, Protocol::UDP);
        assert_eq!(probes[1].matches.len(), 1);
    }

    #[test]
    fn test_malformed_rules_are_dropped() {
        let source = "Probe TCP NULL q||\n\
                      match broken m|^no end\n\
                      match partial m|^x| p/ok/ v/unterminated\n\
                      match good m|^good|\n";
        let probes = parse_str(source);

        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].matches.len(), 2);
        assert_eq!(probes[0].matches[0].name, "partial");
        assert_eq!(probes[0].matches[0].version_info.vendor_product_name.as_deref(), Some("ok"));
        assert_eq!(probes[0].matches[0].version_info.version, None);
        assert_eq!(probes[0].matches[1].name, "good");
    }

    #[test]
    fn test_rule_with_identifier_ending_in_flag_tag_is_kept() {
        let source = "Probe TCP GetRequest q|GET / HTTP/1.0\\r\\n\\r\\n|\n\
                      match http-proxy m|^HTTP/1\\.[01] \\d\\d\\d .*Server: squid|s p/Squid http proxy/ cpe:/a:squid-cache:squid/\n";
        let probes = parse_str(source);

        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].matches.len(), 1);
        let rule = &probes[0].matches[0];
        assert_eq!(rule.name, "http-proxy");
        assert_eq!(rule.pattern_flag.as_deref(), Some("s"));
        assert_eq!(rule.version_info.vendor_product_name.as_deref(), Some("Squid http proxy"));
        assert_eq!(rule.version_info.cpe.len(), 1);
        assert_eq!(rule.version_info.cpe[0].product, "squid");
    }

    #[test]
    fn test_scalars_overwrite() {
        let source = "Probe TCP NULL q||\nrarity 3\nrarity 5\n";
        let probes = parse_str(source);
        assert_eq!(probes[0].rarity.as_deref(), Some("5"));
    }

    #[test]
    fn test_directives_before_first_probe() {
        let source = "match orphan m|^x|\nports 1\n";
        assert!(parse_str(source).is_empty());
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_str("").is_empty());
        assert!(parse_str("# only a comment\n\n").is_empty());
    }

    #[test]
    fn test_incomplete_header_is_ignored() {
        let source = "Probe TCP\nProbe TCP Ok q|x|\n";
        let probes = parse_str(source);
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].probe_string, "x");
    }

    #[test]
    fn test_parse_missing_file() {
        let result = parse_file("/nonexistent/nmap-service-probes");
        assert!(matches!(result, Err(ParseError::Io(_))));
    }
}
