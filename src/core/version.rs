use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::io;

/// How the manifest version changes during a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    #[default]
    Patch,
    Minor,
    Major,
    /// Release the version already in the manifest.
    None,
}

impl BumpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::Patch => "patch",
            BumpKind::Minor => "minor",
            BumpKind::Major => "major",
            BumpKind::None => "none",
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(BumpKind::Patch),
            "minor" => Ok(BumpKind::Minor),
            "major" => Ok(BumpKind::Major),
            "none" => Ok(BumpKind::None),
            other => Err(Error::validation_invalid_argument(
                "bump",
                format!("Unknown bump type '{}'", other),
                None,
                Some(vec![
                    "patch".to_string(),
                    "minor".to_string(),
                    "major".to_string(),
                    "none".to_string(),
                ]),
            )),
        }
    }
}

/// Compute the next version.
///
/// Follows npm's rules for prerelease versions: bumping `1.3.0-beta.1` by
/// `minor` releases `1.3.0` rather than skipping to `1.4.0`.
pub fn increment_version(version: &str, bump: BumpKind) -> Result<String> {
    let mut v = semver::Version::parse(version.trim()).map_err(|e| {
        Error::validation_invalid_argument(
            "version",
            format!("Invalid version format '{}': {}", version, e),
            None,
            None,
        )
    })?;

    let prerelease = !v.pre.is_empty();
    match bump {
        BumpKind::None => return Ok(v.to_string()),
        BumpKind::Patch => {
            if !prerelease {
                v.patch += 1;
            }
        }
        BumpKind::Minor => {
            if !(prerelease && v.patch == 0) {
                v.minor += 1;
            }
            v.patch = 0;
        }
        BumpKind::Major => {
            if !(prerelease && v.minor == 0 && v.patch == 0) {
                v.major += 1;
            }
            v.minor = 0;
            v.patch = 0;
        }
    }
    v.pre = semver::Prerelease::EMPTY;
    v.build = semver::BuildMetadata::EMPTY;

    Ok(v.to_string())
}

fn version_field_pattern() -> Result<Regex> {
    Regex::new(r#""version"(\s*:\s*)"([^"]*)""#)
        .map_err(|e| Error::internal_unexpected(format!("version pattern: {}", e)))
}

/// Byte offsets of the strings that open at the top level of a JSON object,
/// i.e. the candidates for top-level keys.
fn top_level_string_starts(content: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in content.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                if depth == 1 {
                    starts.push(i);
                }
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    starts
}

/// Replace the top-level `"version"` value in JSON text, keeping the rest of
/// the file byte-for-byte. Nested `"version"` keys are left alone.
pub fn replace_version_in_json(content: &str, old: &str, new: &str) -> Result<String> {
    let pattern = version_field_pattern()?;
    let top_level = top_level_string_starts(content);
    let caps = pattern
        .captures_iter(content)
        .find(|caps| {
            caps.get(0)
                .is_some_and(|m| top_level.binary_search(&m.start()).is_ok())
        })
        .ok_or_else(|| Error::manifest_invalid("package.json", "missing \"version\" field"))?;

    let found = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    if found != old {
        return Err(Error::internal_unexpected(format!(
            "Version mismatch: found {}, expected {}",
            found, old
        )));
    }

    let whole = caps
        .get(0)
        .ok_or_else(|| Error::internal_unexpected("version match without span"))?;
    let separator = caps.get(1).map(|m| m.as_str()).unwrap_or(": ");

    let mut out = String::with_capacity(content.len() + new.len());
    out.push_str(&content[..whole.start()]);
    out.push_str(&format!("\"version\"{}\"{}\"", separator, new));
    out.push_str(&content[whole.end()..]);
    Ok(out)
}

/// Rewrite the version in a manifest file in place.
pub fn write_version(path: &Path, old: &str, new: &str) -> Result<()> {
    let content = io::read_file(path, "read manifest")?;
    let updated = replace_version_in_json(&content, old, new)
        .map_err(|e| e.with_detail("path", path.display().to_string()))?;
    io::write_file_atomic(path, &updated, "write manifest")
}
