//! CPE (Common Platform Enumeration) identifiers found in version info.
//!
//! Accepts both the URI binding used by probe databases
//! (`cpe:/a:vendor:product:version`) and the 2.3 formatted string
//! (`cpe:2.3:a:vendor:product:version:...`). Components that are absent stay
//! empty; no wildcard normalization happens here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CpeError;

const CPE22_PREFIX: &str = "cpe:/";
const CPE23_PREFIX: &str = "cpe:2.3:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpePart {
    #[serde(rename = "a")]
    Application,
    #[serde(rename = "o")]
    OperatingSystem,
    #[serde(rename = "h")]
    Hardware,
}

impl fmt::Display for CpePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpePart::Application => write!(f, "a"),
            CpePart::OperatingSystem => write!(f, "o"),
            CpePart::Hardware => write!(f, "h"),
        }
    }
}

impl FromStr for CpePart {
    type Err = CpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(CpePart::Application),
            "o" => Ok(CpePart::OperatingSystem),
            "h" => Ok(CpePart::Hardware),
            _ => Err(CpeError::InvalidPart(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpe {
    pub part: CpePart,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub update: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edition: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sw_edition: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_sw: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_hw: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub other: String,
}

impl Cpe {
    /// Parse one identifier token as it appears after a version-info field.
    ///
    /// The URI form may carry the database's closing `/` (and the trailing
    /// `a` auto-marker), both of which are dropped.
    pub fn parse(token: &str) -> Result<Self, CpeError> {
        let token = token.trim();

        let body = if let Some(rest) = token.strip_prefix(CPE23_PREFIX) {
            rest
        } else if let Some(rest) = token.strip_prefix(CPE22_PREFIX) {
            let rest = rest.strip_suffix("/a").unwrap_or(rest);
            rest.strip_suffix('/').unwrap_or(rest)
        } else {
            return Err(CpeError::InvalidPrefix(token.to_string()));
        };

        let fields = split_components(body);
        let part = match fields.first() {
            Some(part) if !part.is_empty() => part.parse()?,
            _ => return Err(CpeError::TooFewComponents(token.to_string())),
        };

        let field = |i: usize| fields.get(i).cloned().unwrap_or_default();

        Ok(Self {
            part,
            vendor: field(1),
            product: field(2),
            version: field(3),
            update: field(4),
            edition: field(5),
            language: field(6),
            sw_edition: field(7),
            target_sw: field(8),
            target_hw: field(9),
            other: field(10),
        })
    }

    /// Vendor and product as `vendor:product`.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.vendor, self.product)
    }

    pub(crate) fn map_components<F>(&self, mut f: F) -> Cpe
    where
        F: FnMut(&str) -> String,
    {
        Cpe {
            part: self.part,
            vendor: f(&self.vendor),
            product: f(&self.product),
            version: f(&self.version),
            update: f(&self.update),
            edition: f(&self.edition),
            language: f(&self.language),
            sw_edition: f(&self.sw_edition),
            target_sw: f(&self.target_sw),
            target_hw: f(&self.target_hw),
            other: f(&self.other),
        }
    }

    fn components(&self) -> [&str; 10] {
        [
            self.vendor.as_str(),
            self.product.as_str(),
            self.version.as_str(),
            self.update.as_str(),
            self.edition.as_str(),
            self.language.as_str(),
            self.sw_edition.as_str(),
            self.target_sw.as_str(),
            self.target_hw.as_str(),
            self.other.as_str(),
        ]
    }
}

/// Split on `:` while honouring `\:` escapes.
fn split_components(body: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

impl fmt::Display for Cpe {
    /// URI binding, trailing empty components trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components = self.components();
        let used = components
            .iter()
            .rposition(|c| !c.is_empty())
            .map_or(0, |i| i + 1);

        write!(f, "{}{}", CPE22_PREFIX, self.part)?;
        for component in &components[..used] {
            write!(f, ":{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Cpe {
    type Err = CpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cpe::parse(s)
    }
}
