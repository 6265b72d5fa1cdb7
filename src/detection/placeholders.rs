// Placeholder expansion for version-info templates
//
// Four forms are recognized, each by its own scan, in this order:
//   $<n>                     captured group n as text
//   $P(<n>)                  captured group n with unprintable characters removed
//   $SUBST(<n>,"<a>","<b>")  captured group n with every <a> replaced by <b>
//   $I(<n>,"<sign>")         captured group n unpacked as an unsigned integer
// Group 0 is the whole match, so placeholders index from 1. Anything that
// does not resolve is left in place.
use regex::{Captures, Regex};

lazy_static::lazy_static! {
    static ref GROUP: Regex = Regex::new(r"\$(\d+)").unwrap();
    static ref PRINTABLE: Regex = Regex::new(r"\$P\((\d+)\)").unwrap();
    static ref SUBST: Regex = Regex::new(r#"\$SUBST\((\d+),"([^"]*)","([^"]*)"\)"#).unwrap();
    static ref UNPACK: Regex = Regex::new(r#"\$I\((\d+),"([^"]*)"\)"#).unwrap();
    // Letters, marks, numbers, punctuation, symbols and spaces are graphic.
    // Control, format, private-use, unassigned and line or paragraph
    // separators are not.
    static ref NON_GRAPHIC: Regex = Regex::new(r"[\p{Cc}\p{Cf}\p{Co}\p{Cn}\p{Zl}\p{Zp}]").unwrap();
}

/// Expand every placeholder in `template` against `groups`.
pub fn expand<B: AsRef<[u8]>>(template: &str, groups: &[B]) -> String {
    if !template.contains('$') {
        return template.to_string();
    }

    let text = replace_each(&GROUP, template, |caps| {
        group_text(groups, &caps[1])
    });
    let text = replace_each(&PRINTABLE, &text, |caps| {
        group_text(groups, &caps[1]).map(|value| printable(&value))
    });
    let text = replace_each(&SUBST, &text, |caps| {
        group_text(groups, &caps[1]).map(|value| substitute(&value, &caps[2], &caps[3]))
    });
    replace_each(&UNPACK, &text, |caps| {
        let bytes = group_bytes(groups, &caps[1])?;
        Some(unpack_int(&caps[2], bytes).to_string())
    })
}

/// Run one scan; a `None` from `resolve` keeps the placeholder text.
fn replace_each<F>(pattern: &Regex, text: &str, mut resolve: F) -> String
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            resolve(caps).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn group_bytes<'a, B: AsRef<[u8]>>(groups: &'a [B], index: &str) -> Option<&'a [u8]> {
    let index: usize = index.parse().ok()?;
    groups.get(index).map(|group| group.as_ref())
}

fn group_text<B: AsRef<[u8]>>(groups: &[B], index: &str) -> Option<String> {
    group_bytes(groups, index).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// Drop every character that is not a displayable glyph.
///
/// Turns UTF-16LE looking text such as `W\0O\0R\0K\0` into `WORK`.
pub fn printable(input: &str) -> String {
    NON_GRAPHIC.replace_all(input, "").into_owned()
}

/// Replace every occurrence of `from` with `to`.
pub fn substitute(input: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return input.to_string();
    }
    input.replace(from, to)
}

/// Unpack `bytes` as an unsigned 32-bit integer.
///
/// `>` reads big-endian, `<` little-endian; any other sign yields zero.
/// Byte `i` lands in slot `8 * position`; a byte whose slot is 32 bits or
/// more contributes nothing.
pub fn unpack_int(sign: &str, bytes: &[u8]) -> u32 {
    let last = bytes.len().saturating_sub(1);
    let position = |i: usize| -> Option<usize> {
        match sign {
            ">" => Some(last - i),
            "<" => Some(i),
            _ => None,
        }
    };

    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        match position(i) {
            Some(pos) => {
                let shift = u32::try_from(pos.saturating_mul(8)).unwrap_or(u32::MAX);
                value |= u32::from(*byte).checked_shl(shift).unwrap_or(0);
            }
            None => return 0,
        }
    }
    value
}
