use crate::config;
use crate::error::EngineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use tracing::debug;

/// Oldest engine version we know how to drive (Ubuntu 20.04 ships it).
pub const MINIMUM_VERSION: EngineVersion = EngineVersion::new(4, 1, 1);

/// `-c thresholding_method=N` appeared in the 5.0 line.
pub const THRESHOLDING_SINCE: EngineVersion = EngineVersion::new(5, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Pull a dotted version out of a `tesseract --version` banner.
    ///
    /// Accepts `tesseract 5.3.0`, `tesseract v4.1.1`, `4.0.0-beta.1`; any
    /// suffix after the numeric triple is ignored.
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let re = Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("static regex");
        let first_line = text.lines().next().unwrap_or("");
        let caps = re
            .captures(first_line)
            .ok_or_else(|| EngineError::VersionUnparseable {
                output: first_line.to_string(),
            })?;
        let num = |i: usize| {
            caps.get(i)
                .map(|m| m.as_str().parse::<u32>().unwrap_or(0))
                .unwrap_or(0)
        };
        Ok(Self::new(num(1), num(2), num(3)))
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// One-time description of the installed engine, shared read-only by every
/// invocation in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub version: EngineVersion,
    pub banner: String,
    pub has_thresholding: bool,
}

/// Locate the configured binary and interrogate its version.
///
/// Idempotent; callers run it once per job and hand the report around.
pub fn probe(engine: &config::Engine) -> Result<CapabilityReport, EngineError> {
    let output = Command::new(&engine.binary)
        .arg("--version")
        .output()
        .map_err(|source| EngineError::Unavailable {
            program: engine.binary.clone(),
            source,
        })?;

    // Tesseract historically printed the banner on stderr.
    let banner = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };

    let version = EngineVersion::parse(&banner)?;
    if version < MINIMUM_VERSION {
        return Err(EngineError::VersionTooOld {
            found: version,
            need: MINIMUM_VERSION,
        });
    }

    let report = CapabilityReport {
        version,
        banner: banner.lines().next().unwrap_or("").to_string(),
        has_thresholding: version >= THRESHOLDING_SINCE,
    };
    debug!(
        "probed {} -> {} (thresholding: {})",
        engine.binary, report.version, report.has_thresholding
    );
    Ok(report)
}
