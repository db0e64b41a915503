//! The dependency synthesizer: given the flat list of asset URLs on a
//! release page, infer a minimal template-driven config that covers
//! every allowed system.
//!
//! The pipeline runs classify → pick one per system → resolve archive
//! paths → group → assemble, with all ordering deterministic so the
//! same release page always yields the same config.

mod assemble;
mod classify;
mod group;
mod select;
pub(crate) mod vocab;

pub use vocab::default_systems;

pub(crate) use assemble::build_config;
pub(crate) use group::DepGroup;

use binfetch_schema::System;

use crate::archive::{CandidateSource, SelectCandidate};
use crate::errors::BinfetchResult;

/// Run the synchronous half of the pipeline plus archive-path
/// resolution, yielding the dependency groups the assembler consumes.
pub(crate) async fn synthesize(
    urls: &[String],
    version: &str,
    allowed: &[System],
    source: &dyn CandidateSource,
    selector: &dyn SelectCandidate,
) -> BinfetchResult<Vec<DepGroup>> {
    let chosen = select::choose_per_system(urls, version, allowed);
    let groups = group::build_groups(chosen);
    group::regroup_by_archive_path(groups, version, source, selector).await
}
