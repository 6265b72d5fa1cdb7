// `match` / `softmatch` directive parsing
use crate::error::{ParseError, ParseResult, Partial};
use crate::probes::{extract_version_info, Match, MatchKind, VersionInfo};

/// Parse one `match` or `softmatch` line into a rule.
///
/// Layout: `<directive> <service> m<d><pattern><d><flags> <version info>`,
/// where `<d>` is the pattern delimiter (normally `|`). The `m` marker is
/// optional so `|<pattern>|` alone is accepted too.
///
/// When the version info is cut short by an unterminated field, the error
/// is [`ParseError::IncompleteMatch`] and still carries the rule with the
/// fields extracted up to that point.
pub fn parse_match(line: &str) -> ParseResult<Match> {
    let line = line.trim();

    let mut segments = line.splitn(3, ' ');
    let (directive, name, remainder) = match (segments.next(), segments.next(), segments.next()) {
        (Some(directive), Some(name), Some(remainder)) => (directive, name, remainder),
        _ => return Err(ParseError::Malformed(format!("expected `<directive> <name> <pattern>`: {}", line))),
    };
    let kind: MatchKind = directive.parse()?;

    let (pattern, trailing) = split_pattern(remainder)
        .ok_or_else(|| ParseError::Malformed(format!("unterminated pattern: {}", line)))?;

    let mut pattern_flag = None;
    let mut version_segment = None;
    if let Some(trailing) = trailing {
        let mut parts = trailing.splitn(2, ' ');
        if let Some(flags) = parts.next().filter(|f| !f.is_empty()) {
            pattern_flag = Some(flags.to_string());
        }
        version_segment = parts.next();
    }

    let mut rule = Match {
        kind,
        pattern: pattern.to_string(),
        name: name.to_string(),
        pattern_flag,
        version_info: VersionInfo::default(),
    };

    if let Some(segment) = version_segment {
        match extract_version_info(segment) {
            Ok(info) => rule.version_info = info,
            Err(partial) => {
                let Partial { value, error } = partial;
                rule.version_info = value;
                return Err(Box::new(Partial::new(rule, error)).into());
            }
        }
    }

    Ok(rule)
}

/// Split `m|pattern|rest` into the pattern and whatever follows the
/// closing delimiter.
fn split_pattern(remainder: &str) -> Option<(&str, Option<&str>)> {
    let body = remainder.strip_prefix('m').unwrap_or(remainder);
    let delimiter = body.chars().next()?;
    let body = &body[delimiter.len_utf8()..];

    let mut parts = body.splitn(2, delimiter);
    let pattern = parts.next()?;
    let trailing = parts.next()?;

    Some((pattern, Some(trailing).filter(|t| !t.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMANDA: &str = "match amanda m|^ld\\.so\\.1: amandad: fatal: (libsunmath\\.so\\.1): open failed: No such file or directory\\n$| p/Amanda backup system index server/ i/broken: $1 not found/ cpe:/a:amanda:amanda/\n\t";

    #[test]
    fn test_parse_full_rule() {
        let rule = parse_match(AMANDA).unwrap();
        assert_eq!(rule.kind, MatchKind::Match);
        assert_eq!(rule.name, "amanda");
        assert_eq!(
            rule.pattern,
            "^ld\\.so\\.1: amandad: fatal: (libsunmath\\.so\\.1): open failed: No such file or directory\\n$"
        );
        assert_eq!(rule.pattern_flag, None);
        assert_eq!(rule.version_info.device_type, None);
        assert_eq!(rule.version_info.info.as_deref(), Some("broken: $1 not found"));
        assert_eq!(rule.version_info.cpe.len(), 1);
    }

    #[test]
    fn test_parse_out_of_order_fields() {
        let line = "match amanda m|^ld\\.so\\.1: amandad: fatal: (libsunmath\\.so\\.1): open failed: No such file or directory\\n$| i/broken: $1 not found/ cpe:/a:amanda:amanda/ o/Windows/ p/Amanda backup system index server/\n\t";
        let rule = parse_match(line).unwrap();
        assert_eq!(rule.version_info.operating_system.as_deref(), Some("Windows"));
        assert_eq!(
            rule.version_info.vendor_product_name.as_deref(),
            Some("Amanda backup system index server")
        );
    }

    #[test]
    fn test_parse_softmatch_with_flags() {
        let rule = parse_match("softmatch ftp m|^220 ([-.\\w]+) FTP|si h/$1/").unwrap();
        assert!(rule.is_soft());
        assert_eq!(rule.name, "ftp");
        assert_eq!(rule.pattern, "^220 ([-.\\w]+) FTP");
        assert_eq!(rule.pattern_flag.as_deref(), Some("si"));
        assert_eq!(rule.version_info.hostname.as_deref(), Some("$1"));
    }

    #[test]
    fn test_parse_rule_without_version_info() {
        let rule = parse_match("match ssh m|^SSH-|").unwrap();
        assert_eq!(rule.pattern, "^SSH-");
        assert_eq!(rule.pattern_flag, None);
        assert!(rule.version_info.is_empty());

        let rule = parse_match("match ssh m|^SSH-|i").unwrap();
        assert_eq!(rule.pattern_flag.as_deref(), Some("i"));
        assert!(rule.version_info.is_empty());
    }

    #[test]
    fn test_parse_unflagged_version_text() {
        let rule = parse_match("match echo m|^hello$| just some words").unwrap();
        assert!(rule.version_info.is_empty());
    }

    #[test]
    fn test_parse_alternate_delimiter() {
        let rule = parse_match("match http m=^HTTP/1\\.[01] \\d+ (.*)= p/HTTP/ i/$1/").unwrap();
        assert_eq!(rule.pattern, "^HTTP/1\\.[01] \\d+ (.*)");
        assert_eq!(rule.version_info.vendor_product_name.as_deref(), Some("HTTP"));
    }

    #[test]
    fn test_parse_bare_delimiter() {
        let rule = parse_match("match redis |^-ERR unknown command| p/Redis key-value store/").unwrap();
        assert_eq!(rule.pattern, "^-ERR unknown command");
        assert_eq!(rule.version_info.vendor_product_name.as_deref(), Some("Redis key-value store"));
    }

    #[test]
    fn test_parse_incomplete_version_info() {
        let err = parse_match("match http m|^HTTP| p/nginx/ v/1.2").unwrap_err();
        let partial = err.partial_match().unwrap();
        assert_eq!(partial.name, "http");
        assert_eq!(partial.version_info.vendor_product_name.as_deref(), Some("nginx"));
        assert_eq!(partial.version_info.version, None);
    }

    #[test]
    fn test_parse_structural_errors() {
        assert!(matches!(parse_match("match ssh"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_match("match ssh m|^SSH-"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_match("match ssh m"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_match("rematch ssh m|x|"), Err(ParseError::Malformed(_))));
    }
}
