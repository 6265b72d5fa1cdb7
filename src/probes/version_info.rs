// Version-info field extraction: `p/…/ v/…/ i/…/ h/…/ o/…/ d/…/` plus CPE tokens
use tracing::debug;

use crate::error::{ParseError, Partial};
use crate::probes::{Cpe, VersionInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    VendorProductName,
    Version,
    Info,
    Hostname,
    OperatingSystem,
    DeviceType,
}

impl Field {
    /// Scan order. Fields are looked up in this order no matter where they
    /// sit in the source text.
    const ORDER: [Field; 6] = [
        Field::VendorProductName,
        Field::Version,
        Field::Info,
        Field::Hostname,
        Field::OperatingSystem,
        Field::DeviceType,
    ];

    const fn tag(self) -> &'static str {
        match self {
            Field::VendorProductName => "p/",
            Field::Version => "v/",
            Field::Info => "i/",
            Field::Hostname => "h/",
            Field::OperatingSystem => "o/",
            Field::DeviceType => "d/",
        }
    }

    fn assign(self, info: &mut VersionInfo, value: String) {
        let slot = match self {
            Field::VendorProductName => &mut info.vendor_product_name,
            Field::Version => &mut info.version,
            Field::Info => &mut info.info,
            Field::Hostname => &mut info.hostname,
            Field::OperatingSystem => &mut info.operating_system,
            Field::DeviceType => &mut info.device_type,
        };
        *slot = Some(value);
    }
}

const CPE22_MARKER: &str = "cpe:/";
const CPE23_MARKER: &str = "cpe:2.3";

/// Extract the six flagged fields and any CPE identifiers from one
/// version-info segment.
///
/// Each flag is located by its first occurrence in the text left over after
/// earlier flags were cut out. A value that contains another flag's tag
/// (`i/not found/` holds `d/`) is therefore consumed before that flag is
/// searched for. A flag without a closing `/` stops extraction; the error
/// carries the fields filled so far plus any identifiers left in the text.
pub fn extract_version_info(segment: &str) -> Result<VersionInfo, Partial<VersionInfo>> {
    let mut info = VersionInfo::default();
    let mut remaining = segment.to_string();

    for field in Field::ORDER {
        if remaining.is_empty() {
            break;
        }

        let tag = field.tag();
        let start = match remaining.find(tag) {
            Some(start) => start,
            None => continue,
        };
        let value_start = start + tag.len();

        let value_len = match find_delimiter(&remaining[value_start..]) {
            Some(len) => len,
            None => {
                info.cpe = extract_cpes(&remaining);
                return Err(Partial::new(info, ParseError::UnterminatedField { flag: tag }));
            }
        };

        let value = remaining[value_start..value_start + value_len].to_string();
        field.assign(&mut info, value);
        remaining.replace_range(start..value_start + value_len + 1, "");
    }

    info.cpe = extract_cpes(&remaining);
    Ok(info)
}

/// Position of the first `/` not preceded by a backslash.
fn find_delimiter(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '/' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}

/// Parse the CPE tokens trailing a version-info segment.
///
/// The span runs from the first `cpe:/` (or, failing that, the last
/// `cpe:2.3`) up to but excluding the final character of the text, which
/// is the database's own closing delimiter.
fn extract_cpes(text: &str) -> Vec<Cpe> {
    let start = match text.find(CPE22_MARKER).or_else(|| text.rfind(CPE23_MARKER)) {
        Some(start) => start,
        None => return Vec::new(),
    };
    let end = text
        .char_indices()
        .last()
        .map_or(text.len(), |(i, _)| i);
    if end <= start {
        return Vec::new();
    }

    text[start..end]
        .split(' ')
        .filter(|token| !token.is_empty())
        .filter_map(|token| match Cpe::parse(token) {
            Ok(cpe) => Some(cpe),
            Err(e) => {
                debug!("Skipping CPE token `{}`: {}", token, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::CpePart;

    #[test]
    fn test_extract_all_fields() {
        let info = extract_version_info(
            "p/OpenSSH/ v/$1/ i/protocol $2/ h/$3/ o/Linux/ d/router/ cpe:/a:openbsd:openssh:$1/",
        )
        .unwrap();

        assert_eq!(info.vendor_product_name.as_deref(), Some("OpenSSH"));
        assert_eq!(info.version.as_deref(), Some("$1"));
        assert_eq!(info.info.as_deref(), Some("protocol $2"));
        assert_eq!(info.hostname.as_deref(), Some("$3"));
        assert_eq!(info.operating_system.as_deref(), Some("Linux"));
        assert_eq!(info.device_type.as_deref(), Some("router"));
        assert_eq!(info.cpe.len(), 1);
        assert_eq!(info.cpe[0].product, "openssh");
        assert_eq!(info.cpe[0].version, "$1");
    }

    #[test]
    fn test_device_type_not_taken_from_info_value() {
        let info = extract_version_info(
            "p/Amanda backup system index server/ i/broken: $1 not found/ cpe:/a:amanda:amanda/",
        )
        .unwrap();

        assert_eq!(info.device_type, None);
        assert_eq!(info.info.as_deref(), Some("broken: $1 not found"));
        assert_eq!(info.cpe.len(), 1);
        assert_eq!(info.cpe[0].identifier(), "amanda:amanda");
    }

    #[test]
    fn test_out_of_order_fields() {
        let info = extract_version_info(
            "i/broken: $1 not found/ cpe:/a:amanda:amanda/ o/Windows/ p/Amanda backup system index server/",
        )
        .unwrap();

        assert_eq!(info.operating_system.as_deref(), Some("Windows"));
        assert_eq!(info.vendor_product_name.as_deref(), Some("Amanda backup system index server"));
        assert_eq!(info.cpe.len(), 1);
    }

    #[test]
    fn test_no_flags_yields_empty_info() {
        let info = extract_version_info("nothing to see here").unwrap();
        assert!(info.is_empty());

        let info = extract_version_info("").unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn test_unterminated_field_keeps_partial() {
        let err = extract_version_info("p/Apache httpd/ v/2.4").unwrap_err();
        assert!(matches!(err.error, ParseError::UnterminatedField { flag: "v/" }));
        assert_eq!(err.value.vendor_product_name.as_deref(), Some("Apache httpd"));
        assert_eq!(err.value.version, None);
    }

    #[test]
    fn test_identifier_ending_in_flag_tag() {
        // `squid/` reads as an opening `d/` with no closing delimiter
        let err = extract_version_info("p/Squid http proxy/ cpe:/a:squid-cache:squid/").unwrap_err();
        assert!(matches!(err.error, ParseError::UnterminatedField { flag: "d/" }));
        assert_eq!(err.value.vendor_product_name.as_deref(), Some("Squid http proxy"));
        assert_eq!(err.value.device_type, None);
        assert_eq!(err.value.cpe.len(), 1);
        assert_eq!(err.value.cpe[0].identifier(), "squid-cache:squid");
    }

    #[test]
    fn test_escaped_delimiter_in_value() {
        let info = extract_version_info(r"p/Foo\/Bar/ v/1.0/").unwrap();
        assert_eq!(info.vendor_product_name.as_deref(), Some(r"Foo\/Bar"));
        assert_eq!(info.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_multiple_cpes_from_whole_line() {
        let info = extract_version_info(
            "match activesync m|^.\\0\\x01\\0[^\\0]\\0.*\\0\\0\\0$|s p/Microsoft ActiveSync/ o/Windows/ cpe:/a:microsoft:activesync/ cpe:/o:microsoft:windows/a",
        )
        .unwrap();

        assert_eq!(info.vendor_product_name.as_deref(), Some("Microsoft ActiveSync"));
        assert_eq!(info.operating_system.as_deref(), Some("Windows"));
        assert_eq!(info.cpe.len(), 2);
        assert_eq!(info.cpe[0].part, CpePart::Application);
        assert_eq!(info.cpe[1].part, CpePart::OperatingSystem);
        assert_eq!(info.cpe[1].identifier(), "microsoft:windows");
    }

    #[test]
    fn test_cpe23_uses_last_occurrence() {
        let info = extract_version_info("p/Redis/ cpe:2.3:a:redislabs:redis:7.0.8:*:*:*:*:*:*:*/").unwrap();
        assert_eq!(info.cpe.len(), 1);
        assert_eq!(info.cpe[0].vendor, "redislabs");
        assert_eq!(info.cpe[0].version, "7.0.8");
    }

    #[test]
    fn test_bad_cpe_token_is_skipped() {
        let info = extract_version_info("p/Thing/ cpe:/q:nope:nope/ cpe:/a:acme:thing/").unwrap();
        assert_eq!(info.cpe.len(), 1);
        assert_eq!(info.cpe[0].vendor, "acme");
    }
}
