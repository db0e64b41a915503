//! Listing the files inside downloaded archives and choosing which one
//! is the tool.
//!
//! The synthesizer never walks archives itself; it asks a
//! [`CandidateSource`][] for the plausible entries and, when there are
//! several, a [`SelectCandidate`][] to pick one. The default picker
//! takes the first; interactive runs prompt instead.

use std::fs::File;
use std::io::Read;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{BinfetchError, BinfetchResult};
use crate::net;

/// One file inside an archive that could be the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFileCandidate {
    /// Path of the entry inside the archive
    pub path: String,
    /// Unix mode bits of the entry
    pub mode: u32,
}

/// Produces the candidate entries for one downloaded asset
#[async_trait]
pub trait CandidateSource {
    /// The plausible binary entries inside the asset at `url`
    async fn candidates(&self, url: &str) -> BinfetchResult<Vec<ArchiveFileCandidate>>;
}

/// Picks one candidate when an archive offers several
pub trait SelectCandidate {
    /// Choose from a non-empty candidate list
    fn select(&self, candidates: &[ArchiveFileCandidate]) -> BinfetchResult<ArchiveFileCandidate>;
}

/// The non-interactive picker: first candidate wins
pub struct FirstCandidate;

impl SelectCandidate for FirstCandidate {
    fn select(&self, candidates: &[ArchiveFileCandidate]) -> BinfetchResult<ArchiveFileCandidate> {
        candidates
            .first()
            .cloned()
            .ok_or(BinfetchError::EmptySelection)
    }
}

fn theme() -> dialoguer::theme::ColorfulTheme {
    dialoguer::theme::ColorfulTheme {
        active_item_prefix: console::style("> ".to_string()).for_stderr().green(),
        ..dialoguer::theme::ColorfulTheme::default()
    }
}

/// The interactive picker
pub struct PromptCandidate;

impl SelectCandidate for PromptCandidate {
    fn select(&self, candidates: &[ArchiveFileCandidate]) -> BinfetchResult<ArchiveFileCandidate> {
        if candidates.is_empty() {
            return Err(BinfetchError::EmptySelection);
        }
        let items: Vec<&str> = candidates.iter().map(|c| c.path.as_str()).collect();
        let picked = dialoguer::Select::with_theme(&theme())
            .with_prompt("which entry is the tool?")
            .items(&items)
            .default(0)
            .interact()?;
        Ok(candidates[picked].clone())
    }
}

/// Downloads each asset into a scratch dir and lists its entries
pub struct HttpCandidateSource {
    client: reqwest::Client,
    tool: String,
    scratch: tempfile::TempDir,
}

impl HttpCandidateSource {
    /// A source that hunts for `tool` inside whatever it downloads
    pub fn new(client: reqwest::Client, tool: impl Into<String>) -> BinfetchResult<Self> {
        Ok(HttpCandidateSource {
            client,
            tool: tool.into(),
            scratch: tempfile::tempdir()?,
        })
    }
}

#[async_trait]
impl CandidateSource for HttpCandidateSource {
    async fn candidates(&self, url: &str) -> BinfetchResult<Vec<ArchiveFileCandidate>> {
        let filename = url.rsplit('/').next().unwrap_or(url);
        let stem = hex::encode(Sha256::digest(url.as_bytes()));
        let dest = Utf8PathBuf::from_path_buf(self.scratch.path().to_path_buf())
            .expect("scratch dir isn't utf8!?")
            .join(format!("{}-{}", &stem[..12], filename));
        debug!("fetching {url} to list its entries");
        net::download_to(&self.client, url, &dest).await?;
        let entries = list_entries(&dest, url)?;
        Ok(filter_candidates(entries, &self.tool))
    }
}

fn tar_entries<R: Read>(reader: R) -> BinfetchResult<Vec<ArchiveFileCandidate>> {
    let mut archive = tar::Archive::new(reader);
    let mut out = vec![];
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let mode = entry.header().mode().unwrap_or(0o644);
        out.push(ArchiveFileCandidate { path, mode });
    }
    Ok(out)
}

fn zip_entries(path: &Utf8Path) -> BinfetchResult<Vec<ArchiveFileCandidate>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut out = vec![];
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        out.push(ArchiveFileCandidate {
            path: entry.name().to_owned(),
            mode: entry.unix_mode().unwrap_or(0o644),
        });
    }
    Ok(out)
}

/// Bare compression suffixes: the "archive" is a single compressed file
const SINGLE_FILE_SUFFIXES: &[&str] = &[".br", ".gz", ".bz2", ".lz4", ".sz", ".xz", ".zst"];

/// List the regular files inside the archive at `path`.
///
/// The format is judged by the URL's suffix, the same way the
/// classifier judged it.
pub(crate) fn list_entries(
    path: &Utf8Path,
    url: &str,
) -> BinfetchResult<Vec<ArchiveFileCandidate>> {
    if url.ends_with(".zip") {
        return zip_entries(path);
    }
    if url.ends_with(".tar.gz") || url.ends_with(".tgz") {
        return tar_entries(flate2::read::GzDecoder::new(File::open(path)?));
    }
    if url.ends_with(".tar.xz") || url.ends_with(".txz") {
        return tar_entries(xz2::read::XzDecoder::new(File::open(path)?));
    }
    if url.ends_with(".tar.zst") || url.ends_with(".tzst") {
        return tar_entries(zstd::stream::read::Decoder::new(File::open(path)?)?);
    }
    if url.ends_with(".tar.bz2") || url.ends_with(".tbz2") {
        return tar_entries(bzip2::read::BzDecoder::new(File::open(path)?));
    }
    // A bare compressed file holds exactly one entry: itself, minus the
    // compression suffix.
    let filename = url.rsplit('/').next().unwrap_or(url);
    for suffix in SINGLE_FILE_SUFFIXES {
        if let Some(stripped) = filename.strip_suffix(suffix) {
            return Ok(vec![ArchiveFileCandidate {
                path: stripped.to_owned(),
                mode: 0o755,
            }]);
        }
    }
    Err(BinfetchError::UnsupportedArchive {
        url: url.to_owned(),
    })
}

/// Entries named after the tool beat everything; failing that, anything
/// executable is offered.
pub(crate) fn filter_candidates(
    entries: Vec<ArchiveFileCandidate>,
    tool: &str,
) -> Vec<ArchiveFileCandidate> {
    let exe_name = format!("{tool}.exe");
    let named: Vec<ArchiveFileCandidate> = entries
        .iter()
        .filter(|e| {
            let base = e.path.rsplit('/').next().unwrap_or(&e.path);
            base == tool || base == exe_name
        })
        .cloned()
        .collect();
    if !named.is_empty() {
        return named;
    }
    entries
        .into_iter()
        .filter(|e| e.mode & 0o111 != 0)
        .collect()
}
