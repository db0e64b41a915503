//! Vocabulary tables mapping the os/arch tokens that show up in release
//! asset filenames to their normalized forms.

use binfetch_schema::System;

/// OSes we refuse to emit, no matter what the release page offers
pub(crate) const FORBIDDEN_OS: &[&str] = &["js"];

/// Arches we refuse to emit, no matter what the release page offers
pub(crate) const FORBIDDEN_ARCH: &[&str] = &["arm", "wasm"];

/// Surface forms of operating systems as they appear in asset names.
///
/// Order matters for equal-length surfaces: the earlier entry wins the
/// tie after the length sort. Priorities are ≤ 0; a lower priority marks
/// a workable-but-less-preferred flavor (mingw over msvc, glibc over
/// musl).
const OS_SURFACES: &[(&str, &str, i32)] = &[
    ("apple-darwin", "darwin", 0),
    ("unknown-linux-gnu", "linux", -1),
    ("unknown-linux-musl", "linux", 0),
    ("pc-windows-msvc", "windows", 0),
    ("pc-windows-gnu", "windows", -1),
    ("apple", "darwin", 0),
    ("osx", "darwin", 0),
    ("macos", "darwin", 0),
    ("mac", "darwin", 0),
    ("windows", "windows", 0),
    ("darwin", "darwin", 0),
    ("win64", "windows", 0),
    ("win", "windows", 0),
];

/// Surface forms of architectures as they appear in asset names
const ARCH_SURFACES: &[(&str, &str, i32)] = &[
    ("amd64", "amd64", 0),
    ("arm64", "arm64", 0),
    ("x86_64", "amd64", 0),
    ("x86_32", "386", 0),
    ("x86", "386", 0),
    ("x64", "amd64", 0),
    ("64bit", "amd64", 0),
    ("64-bit", "amd64", 0),
    ("aarch64", "arm64", 0),
    ("aarch_64", "arm64", 0),
    ("ppcle_64", "ppc64le", 0),
    ("s390x_64", "s390x", 0),
    ("i386", "386", 0),
];

/// Every system a tool can conceivably be built for. Used as the
/// allow-list when the project config doesn't declare its own systems.
const KNOWN_SYSTEMS: &[(&str, &str)] = &[
    ("aix", "ppc64"),
    ("android", "386"),
    ("android", "amd64"),
    ("android", "arm"),
    ("android", "arm64"),
    ("darwin", "amd64"),
    ("darwin", "arm64"),
    ("dragonfly", "amd64"),
    ("freebsd", "386"),
    ("freebsd", "amd64"),
    ("freebsd", "arm"),
    ("freebsd", "arm64"),
    ("freebsd", "riscv64"),
    ("illumos", "amd64"),
    ("ios", "amd64"),
    ("ios", "arm64"),
    ("js", "wasm"),
    ("linux", "386"),
    ("linux", "amd64"),
    ("linux", "arm"),
    ("linux", "arm64"),
    ("linux", "loong64"),
    ("linux", "mips"),
    ("linux", "mips64"),
    ("linux", "mips64le"),
    ("linux", "mipsle"),
    ("linux", "ppc64"),
    ("linux", "ppc64le"),
    ("linux", "riscv64"),
    ("linux", "s390x"),
    ("netbsd", "386"),
    ("netbsd", "amd64"),
    ("netbsd", "arm"),
    ("netbsd", "arm64"),
    ("openbsd", "386"),
    ("openbsd", "amd64"),
    ("openbsd", "arm"),
    ("openbsd", "arm64"),
    ("plan9", "386"),
    ("plan9", "amd64"),
    ("plan9", "arm"),
    ("solaris", "amd64"),
    ("wasip1", "wasm"),
    ("windows", "386"),
    ("windows", "amd64"),
    ("windows", "arm"),
    ("windows", "arm64"),
];

/// The default allow-list of build targets
pub fn default_systems() -> Vec<System> {
    KNOWN_SYSTEMS
        .iter()
        .map(|(os, arch)| System::new(*os, *arch))
        .collect()
}

/// One matched token: the surface form as it appeared in the filename
/// (original case), its normalized value, and where it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SystemSub {
    /// The token as it appeared, original case. Empty when inferred.
    pub surface: String,
    /// The normalized os or arch value
    pub normalized: String,
    /// ≤ 0; 0 is best
    pub priority: i32,
    /// Byte offset of the match, `None` when inferred rather than matched
    pub index: Option<usize>,
}

/// An entry in a vocabulary table, pre-lowercased for matching
#[derive(Debug, Clone)]
struct SubPattern {
    surface: String,
    normalized: String,
    priority: i32,
}

fn patterns(fixed: &[(&str, &str, i32)], extra: impl Iterator<Item = String>) -> Vec<SubPattern> {
    let mut out: Vec<SubPattern> = fixed
        .iter()
        .map(|(surface, normalized, priority)| SubPattern {
            surface: surface.to_ascii_lowercase(),
            normalized: (*normalized).to_owned(),
            priority: *priority,
        })
        .collect();
    for value in extra {
        let value = value.to_ascii_lowercase();
        if !out.iter().any(|p| p.surface == value) {
            out.push(SubPattern {
                surface: value.clone(),
                normalized: value,
                priority: 0,
            });
        }
    }
    // Stable: longer surfaces shadow the shorter tokens embedded in them,
    // table order breaks length ties.
    out.sort_by_key(|p| std::cmp::Reverse(p.surface.len()));
    out
}

fn os_patterns(allowed: &[System]) -> Vec<SubPattern> {
    patterns(OS_SURFACES, allowed.iter().map(|s| s.os.clone()))
}

fn arch_patterns(allowed: &[System]) -> Vec<SubPattern> {
    patterns(ARCH_SURFACES, allowed.iter().map(|s| s.arch.clone()))
}

/// Find the first table entry with a substring hit in `filename`,
/// preserving the original case and byte offset of what matched.
fn match_sub(filename: &str, patterns: &[SubPattern]) -> Option<SystemSub> {
    let downcased = filename.to_ascii_lowercase();
    for pattern in patterns {
        let Some(idx) = downcased.find(&pattern.surface) else {
            continue;
        };
        return Some(SystemSub {
            surface: filename[idx..idx + pattern.surface.len()].to_owned(),
            normalized: pattern.normalized.clone(),
            priority: pattern.priority,
            index: Some(idx),
        });
    }
    None
}

/// Match an OS token. Falls back to `windows` for bare `.exe` downloads.
pub(crate) fn match_os(filename: &str, allowed: &[System]) -> Option<SystemSub> {
    if let Some(sub) = match_sub(filename, &os_patterns(allowed)) {
        return Some(sub);
    }
    if filename.to_ascii_lowercase().ends_with(".exe") {
        return Some(SystemSub {
            surface: String::new(),
            normalized: "windows".to_owned(),
            priority: 0,
            index: None,
        });
    }
    None
}

/// Match an arch token. Assets that name no arch almost always mean
/// amd64, so the fallback infers it at a slight priority cost.
pub(crate) fn match_arch(filename: &str, allowed: &[System]) -> SystemSub {
    match_sub(filename, &arch_patterns(allowed)).unwrap_or(SystemSub {
        surface: String::new(),
        normalized: "amd64".to_owned(),
        priority: -1,
        index: None,
    })
}
