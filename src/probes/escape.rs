// Decoding of C-style escapes in probe strings into raw payload bytes
use crate::error::{ParseError, ParseResult};

/// Decode the escapes a probe string may carry.
///
/// `\\ \0 \a \b \f \n \r \t \v` and `\xHH` are recognized. Any other escaped
/// character stands for itself, so `\|` yields `|`.
/// ```
/// use probescope::probes::escape::unescape;
/// assert_eq!(unescape(r"a\x01b\xFF").unwrap(), vec![0x61, 0x01, 0x62, 0xFF]);
/// ```
pub fn unescape(source: &str) -> ParseResult<Vec<u8>> {
    let bytes = source.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            output.push(bytes[i]);
            i += 1;
            continue;
        }

        let escaped = *bytes
            .get(i + 1)
            .ok_or_else(|| ParseError::InvalidEscape(format!("trailing backslash in `{}`", source)))?;

        match escaped {
            b'0' => output.push(0x00),
            b'a' => output.push(0x07),
            b'b' => output.push(0x08),
            b'f' => output.push(0x0c),
            b'n' => output.push(b'\n'),
            b'r' => output.push(b'\r'),
            b't' => output.push(b'\t'),
            b'v' => output.push(0x0b),
            b'x' => {
                let digits = bytes
                    .get(i + 2..i + 4)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or_else(|| ParseError::InvalidEscape(format!("bad \\x escape in `{}`", source)))?;
                output.push(digits);
                i += 4;
                continue;
            }
            other => output.push(other),
        }
        i += 2;
    }

    Ok(output)
}
