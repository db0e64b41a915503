//! Reducing the classified assets to exactly one download per system.

use binfetch_schema::{SortedMap, System};
use tracing::debug;

use super::classify::{parse_download, DlFile};

/// Classify every URL, bucket by system, and reduce each bucket to one
/// asset with the tie-break cascade:
///
/// 1. keep only the highest priority,
/// 2. keep only the URL templates used most often across the corpus,
/// 3. prefer archives over bare binaries,
/// 4. take the first remaining URL alphabetically.
///
/// Afterwards, if the allow-list wants `darwin/arm64` and no asset
/// serves it but one serves `darwin/amd64`, that asset is cloned over:
/// a lone Intel mac binary is nearly always run under Rosetta on arm.
pub(crate) fn choose_per_system(
    urls: &[String],
    version: &str,
    allowed: &[System],
) -> SortedMap<System, DlFile> {
    let mut buckets: SortedMap<System, Vec<DlFile>> = SortedMap::new();
    for url in urls {
        let Some(file) = parse_download(url, version, allowed) else {
            debug!("skipping unclassifiable asset: {url}");
            continue;
        };
        buckets.entry(file.system()).or_default().push(file);
    }

    for files in buckets.values_mut() {
        if files.len() < 2 {
            continue;
        }
        let best = files
            .iter()
            .map(|f| f.priority)
            .max()
            .expect("bucket is non-empty");
        files.retain(|f| f.priority == best);
    }

    let mut url_frequency: SortedMap<&str, usize> = SortedMap::new();
    for files in buckets.values() {
        for f in files {
            *url_frequency.entry(f.url.as_str()).or_default() += 1;
        }
    }
    let url_frequency: SortedMap<String, usize> = url_frequency
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

    for files in buckets.values_mut() {
        if files.len() < 2 {
            continue;
        }
        let best = files
            .iter()
            .map(|f| url_frequency[&f.url])
            .max()
            .expect("bucket is non-empty");
        files.retain(|f| url_frequency[&f.url] == best);
        if files.len() == 1 {
            continue;
        }
        if files.iter().any(|f| f.is_archive) {
            files.retain(|f| f.is_archive);
        }
        if files.len() == 1 {
            continue;
        }
        let first = files
            .iter()
            .map(|f| f.orig_url.clone())
            .min()
            .expect("bucket is non-empty");
        files.retain(|f| f.orig_url == first);
        files.truncate(1);
    }

    let darwin_amd64 = System::new("darwin", "amd64");
    let darwin_arm64 = System::new("darwin", "arm64");
    if buckets.contains_key(&darwin_amd64)
        && !buckets.contains_key(&darwin_arm64)
        && allowed.contains(&darwin_arm64)
    {
        let mut clone = buckets[&darwin_amd64][0].clone();
        clone.arch_sub.normalized = "arm64".to_owned();
        clone.priority -= 2;
        buckets.insert(darwin_arm64, vec![clone]);
    }

    buckets
        .into_iter()
        .map(|(system, mut files)| (system, files.swap_remove(0)))
        .collect()
}
