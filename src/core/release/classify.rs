//! Classification of git failures for allow-listed release steps.
//!
//! Only failures matching a known pattern are tolerated or retried. Anything
//! else is `Other` and stays fatal, so a tolerant step that fails for an
//! unrelated reason (auth, network, hooks) still aborts the release.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// A tag (or ref) with that name already exists, locally or remotely.
    AlreadyExists,
    /// Nothing to pull from: no upstream, missing remote ref, no remote.
    NoUpstream,
    /// Push rejected because the local branch is behind the remote.
    Rejected,
    Other,
}

impl FailureClass {
    pub fn describe(&self) -> &'static str {
        match self {
            FailureClass::AlreadyExists => "already exists",
            FailureClass::NoUpstream => "no remote changes to pull",
            FailureClass::Rejected => "rejected, branch is behind remote",
            FailureClass::Other => "unrecognized failure",
        }
    }
}

// Checked in order; a tag push rejected as "(already exists)" also contains
// "[rejected]" and must classify as AlreadyExists.
const PATTERNS: &[(FailureClass, &[&str])] = &[
    (FailureClass::AlreadyExists, &["already exists"]),
    (
        FailureClass::Rejected,
        &[
            "[rejected]",
            "non-fast-forward",
            "fetch first",
            "updates were rejected",
            "is behind its remote",
        ],
    ),
    (
        FailureClass::NoUpstream,
        &[
            "no tracking information",
            "couldn't find remote ref",
            "does not appear to be a git repository",
            "no such remote",
            "no remote repository specified",
        ],
    ),
];

fn match_patterns(text: &str) -> FailureClass {
    let lower = text.to_lowercase();
    PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(class, _)| *class)
        .unwrap_or(FailureClass::Other)
}

/// Per-ref status lines `git push` prints for refs it could not update,
/// e.g. ` ! [rejected]  v1.2.3 -> v1.2.3 (already exists)`.
fn rejected_ref_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("! "))
        .collect()
}

fn classify_ref_line(line: &str) -> FailureClass {
    // Hooks and server-side policy reject with "[remote rejected]".
    if line.contains("[remote rejected]") {
        return FailureClass::Other;
    }
    match_patterns(line)
}

/// Classify a failed command from its combined output.
///
/// When a push reports per-ref rejections, every rejected ref must fall in
/// the same known class; one unrecognized or differently classified ref
/// makes the whole failure `Other`.
pub fn classify(output: &str) -> FailureClass {
    let refs = rejected_ref_lines(output);
    if refs.is_empty() {
        return match_patterns(output);
    }

    let first = classify_ref_line(refs[0]);
    if refs[1..].iter().all(|line| classify_ref_line(line) == first) {
        first
    } else {
        FailureClass::Other
    }
}
