use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::*;
use serde::Serialize;

use probescope::{Probe, ServiceIdentity, VersionInfo};

use crate::cli::OutputFormat;

pub struct OutputWriter {
    format: OutputFormat,
    file: Option<PathBuf>,
}

#[derive(Serialize)]
struct MatchReport<'a> {
    response: &'a Path,
    identity: Option<&'a ServiceIdentity>,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, file: Option<PathBuf>) -> Result<Self> {
        Ok(Self { format, file })
    }

    pub fn write_probes(&self, probes: &[Probe]) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => format_probes_human(probes),
            OutputFormat::Json => serde_json::to_string_pretty(probes)? + "\n",
        };
        self.emit(&output)
    }

    pub fn write_identity(&self, response: &Path, identity: Option<&ServiceIdentity>) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => format_identity_human(response, identity),
            OutputFormat::Json => serde_json::to_string_pretty(&MatchReport { response, identity })? + "\n",
        };
        self.emit(&output)
    }

    fn emit(&self, output: &str) -> Result<()> {
        match &self.file {
            Some(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                writer.write_all(output.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", output);
                io::stdout().flush()?;
            }
        }
        Ok(())
    }
}

fn format_probes_human(probes: &[Probe]) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{}\n\n", "PROBE DATABASE".truecolor(0, 255, 65).bold()));

    let mut total_rules = 0;
    let mut soft_rules = 0;

    for probe in probes {
        let rules = probe.matches.len();
        let soft = probe.matches.iter().filter(|m| m.is_soft()).count();
        total_rules += rules;
        soft_rules += soft;

        output.push_str(&format!(
            "{} {} {} {} {}\n",
            "▶".truecolor(0, 255, 65).bold(),
            probe.protocol.to_string().truecolor(255, 140, 0).bold(),
            probe.name.truecolor(255, 255, 255).bold(),
            "•".truecolor(64, 64, 64),
            format!("{} rules", rules).truecolor(0, 212, 255).bold(),
        ));

        let mut details = Vec::new();
        if let Some(rarity) = &probe.rarity {
            details.push(format!("rarity {}", rarity));
        }
        if !probe.ports.is_empty() {
            details.push(format!("ports {}", probe.ports.join(",")));
        }
        if !probe.ssl_ports.is_empty() {
            details.push(format!("sslports {}", probe.ssl_ports.join(",")));
        }
        if let Some(wait) = &probe.total_wait_ms {
            details.push(format!("wait {}ms", wait));
        }
        if let Some(fallback) = &probe.fallback {
            details.push(format!("fallback {}", fallback));
        }
        if !details.is_empty() {
            output.push_str(&format!("  {}\n", details.join(" • ").truecolor(128, 128, 128)));
        }

        for rule in &probe.matches {
            let marker = if rule.is_soft() {
                "○".truecolor(255, 140, 0)
            } else {
                "●".truecolor(0, 255, 65)
            };
            let summary = summarize(&rule.version_info);
            output.push_str(&format!(
                "  {} {} {}\n",
                marker,
                rule.name.truecolor(255, 255, 255).bold(),
                summary.truecolor(128, 128, 128)
            ));
        }
        output.push('\n');
    }

    if probes.is_empty() {
        output.push_str(&format!(
            "{} {}\n",
            "⚠".truecolor(255, 140, 0).bold(),
            "No probes found".truecolor(128, 128, 128)
        ));
    } else {
        output.push_str(&format!(
            "{} {} {} {} {}\n",
            "⚡".truecolor(0, 255, 65).bold(),
            format!("{} probes", probes.len()).truecolor(255, 255, 255).bold(),
            "•".truecolor(64, 64, 64),
            format!("{} rules", total_rules).truecolor(255, 255, 255).bold(),
            format!("({} soft)", soft_rules).truecolor(128, 128, 128),
        ));
    }

    output
}

fn format_identity_human(response: &Path, identity: Option<&ServiceIdentity>) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} {}\n\n",
        "RESPONSE".truecolor(0, 255, 65).bold(),
        response.display().to_string().truecolor(255, 255, 255)
    ));

    let identity = match identity {
        Some(identity) => identity,
        None => {
            output.push_str(&format!(
                "{} {}\n",
                "⚠".truecolor(255, 140, 0).bold(),
                "No probe matched this response".truecolor(128, 128, 128)
            ));
            return output;
        }
    };

    output.push_str(&format!(
        "{} {} {} {} {}\n",
        "▶".truecolor(0, 255, 65).bold(),
        identity.service.truecolor(255, 255, 255).bold(),
        "•".truecolor(64, 64, 64),
        identity.kind.to_string().truecolor(0, 212, 255),
        format!("via {}", identity.probe).truecolor(128, 128, 128),
    ));

    let info = &identity.version_info;
    let fields = [
        ("product", &info.vendor_product_name),
        ("version", &info.version),
        ("info", &info.info),
        ("hostname", &info.hostname),
        ("os", &info.operating_system),
        ("device", &info.device_type),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            output.push_str(&format!(
                "  {:<9} {}\n",
                label.truecolor(128, 128, 128),
                value.truecolor(255, 255, 255)
            ));
        }
    }
    for cpe in &info.cpe {
        output.push_str(&format!(
            "  {:<9} {}\n",
            "cpe".truecolor(128, 128, 128),
            cpe.to_string().truecolor(191, 64, 191)
        ));
    }

    output
}

fn summarize(info: &VersionInfo) -> String {
    let mut parts = Vec::new();
    if let Some(product) = &info.vendor_product_name {
        parts.push(product.clone());
    }
    if let Some(version) = &info.version {
        parts.push(version.clone());
    }
    if let Some(os) = &info.operating_system {
        parts.push(format!("[{}]", os));
    }
    parts.join(" ")
}
