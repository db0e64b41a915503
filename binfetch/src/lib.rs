//! # binfetch
//!
//! Manage per-project, per-platform downloadable binary tools. The
//! interesting half of this crate is the dependency synthesizer in
//! [`synth`][]: point it at a release page's asset URLs and it infers a
//! minimal template-driven config entry covering every allowed system,
//! with per-system overrides only where the assets actually diverge.

#![allow(clippy::single_match)]

use binfetch_schema::{Config, SortedMap};
use tracing::info;

use crate::archive::{CandidateSource, SelectCandidate};
use crate::checksum::UrlHasher;
use crate::errors::{BinfetchError, BinfetchResult};

pub mod archive;
pub mod checksum;
pub mod config;
pub mod errors;
pub mod net;
pub mod release;
pub mod synth;

pub use binfetch_schema as schema;

/// Synthesize a dependency from `urls` and add it to `cfg`.
///
/// The allow-list is `cfg.systems` when set, the built-in target list
/// otherwise. `cfg` is only touched once the synthesized config has
/// checksums for every reachable URL and passes validation; any failure
/// leaves it exactly as it was.
#[allow(clippy::too_many_arguments)]
pub async fn add_dependency(
    cfg: &mut Config,
    name: &str,
    version: &str,
    homepage: Option<&str>,
    description: Option<&str>,
    urls: &[String],
    source: &dyn CandidateSource,
    selector: &dyn SelectCandidate,
    hasher: &dyn UrlHasher,
) -> BinfetchResult<()> {
    let allowed = if cfg.systems.is_empty() {
        synth::default_systems()
    } else {
        cfg.systems.clone()
    };

    let mut groups = synth::synthesize(urls, version, &allowed, source, selector).await?;
    if groups.is_empty() {
        return Err(BinfetchError::NoUsableDownloads {
            name: name.to_owned(),
        });
    }
    info!(
        "{} of {} assets classified into {} group(s)",
        groups.iter().map(|g| g.files.len()).sum::<usize>(),
        urls.len(),
        groups.len()
    );

    let mut digests: SortedMap<String, String> = SortedMap::new();
    for group in &mut groups {
        for file in &mut group.files {
            let digest = match digests.get(&file.orig_url) {
                Some(digest) => digest.clone(),
                None => {
                    let digest = hasher.url_checksum(&file.orig_url).await?;
                    digests.insert(file.orig_url.clone(), digest.clone());
                    digest
                }
            };
            file.checksum = Some(digest);
        }
    }

    let built = synth::build_config(name, version, &groups);
    for dep_name in built.dependencies.keys() {
        if let Err(cause) = config::validate_dependency(&built, dep_name) {
            let config_yaml = serde_yml::to_string(&built)
                .unwrap_or_else(|e| format!("could not render the invalid config: {e}"));
            return Err(BinfetchError::GeneratedConfigInvalid {
                cause: cause.to_string(),
                config_yaml,
            });
        }
    }

    for (key, mut template) in built.templates {
        if let Some(homepage) = homepage {
            if !homepage.is_empty() {
                template.homepage = Some(homepage.to_owned());
            }
        }
        if let Some(description) = description {
            if !description.is_empty() {
                template.description = Some(description.to_owned());
            }
        }
        cfg.templates.insert(key, template);
    }
    cfg.dependencies.extend(built.dependencies);
    cfg.url_checksums.extend(built.url_checksums);
    Ok(())
}
