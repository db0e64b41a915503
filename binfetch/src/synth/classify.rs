//! Turning one release asset URL into a classified, templated download.

use binfetch_schema::System;

use super::vocab::{self, SystemSub, FORBIDDEN_ARCH, FORBIDDEN_OS};

/// Archive suffixes we recognize, first match wins. Compound extensions
/// sit before the bare compression suffixes they end with, so
/// `foo.tar.gz` never classifies as `.gz`.
pub(crate) const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.br", ".tbr", ".tar.bz2", ".tbz2", ".tar.gz", ".tgz", ".tar.lz4", ".tlz4", ".tar.sz",
    ".tsz", ".tar.xz", ".txz", ".tar.zst", ".tzst", ".rar", ".zip", ".br", ".gz", ".bz2", ".lz4",
    ".sz", ".xz", ".zst",
];

/// One release asset that classified: where it came from, the templated
/// form of its URL, and what the tokens in it meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DlFile {
    /// The URL exactly as the release page listed it
    pub orig_url: String,
    /// The URL with os/arch/suffix/version holes cut into it
    pub url: String,
    /// The matched OS token
    pub os_sub: SystemSub,
    /// The matched arch token
    pub arch_sub: SystemSub,
    /// `.tar.gz` and friends, or `.exe`, or empty
    pub suffix: String,
    /// Whether `suffix` is one of the known archive suffixes
    pub is_archive: bool,
    /// `os_sub.priority + arch_sub.priority`; 0 is best
    pub priority: i32,
    /// Hex digest of the download, filled in by the checksum pass
    pub checksum: Option<String>,
}

impl DlFile {
    /// The system this asset serves
    pub fn system(&self) -> System {
        System::new(
            self.os_sub.normalized.clone(),
            self.arch_sub.normalized.clone(),
        )
    }
}

fn splice(tmpl: &str, idx: usize, len: usize, hole: &str) -> String {
    format!("{}{}{}", &tmpl[..idx], hole, &tmpl[idx + len..])
}

/// Classify one asset URL, or reject it.
///
/// Rejection is silent by design: release pages are full of checksum
/// files, signatures and source tarballs that should simply be skipped.
///
/// The version hole is cut with a plain (unanchored) string replace; a
/// version that happens to be a substring of another token will overreach.
pub(crate) fn parse_download(dl_url: &str, version: &str, allowed: &[System]) -> Option<DlFile> {
    let mut tmpl = dl_url.to_owned();

    let os_sub = vocab::match_os(dl_url, allowed)?;
    if let Some(idx) = os_sub.index {
        tmpl = splice(&tmpl, idx, os_sub.surface.len(), "{{.os}}");
    }

    // Match the arch on the already-templated string, so tokens inside
    // the OS surface (a `64` in `win64`, say) can't confound it.
    let arch_sub = vocab::match_arch(&tmpl, allowed);
    if let Some(idx) = arch_sub.index {
        tmpl = splice(&tmpl, idx, arch_sub.surface.len(), "{{.arch}}");
    }

    if FORBIDDEN_OS.contains(&os_sub.normalized.as_str())
        || FORBIDDEN_ARCH.contains(&arch_sub.normalized.as_str())
    {
        return None;
    }
    if !allowed
        .iter()
        .any(|s| s.os == os_sub.normalized && s.arch == arch_sub.normalized)
    {
        return None;
    }

    let mut suffix = String::new();
    let mut is_archive = false;
    for s in ARCHIVE_SUFFIXES {
        if dl_url.ends_with(s) {
            suffix = (*s).to_owned();
            is_archive = true;
            break;
        }
    }
    if !is_archive && dl_url.ends_with(".exe") {
        suffix = ".exe".to_owned();
    }
    tmpl.truncate(tmpl.len() - suffix.len());
    tmpl.push_str("{{.urlSuffix}}");

    if !version.is_empty() {
        tmpl = tmpl.replace(version, "{{.version}}");
    }

    let priority = os_sub.priority + arch_sub.priority;
    Some(DlFile {
        orig_url: dl_url.to_owned(),
        url: tmpl,
        os_sub,
        arch_sub,
        suffix,
        is_archive,
        priority,
        checksum: None,
    })
}
