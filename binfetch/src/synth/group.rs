//! Partitioning the chosen downloads into groups that can share one URL
//! template, and deriving the matchers that tell the groups apart.

use std::cmp::Reverse;

use binfetch_schema::{
    Dependency, DependencyOverride, OverrideMatcher, SortedMap, Substitutions, System,
};
use itertools::Itertools;

use crate::archive::{CandidateSource, SelectCandidate};
use crate::errors::{BinfetchError, BinfetchResult};

use super::classify::DlFile;

/// A carve-out inside a group: systems matched by `dimension`/`values`
/// want different surface forms than the rest of the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MatcherCarveOut {
    /// The dimension the matcher keys on (`os` or `arch`)
    pub dimension: String,
    /// Matched normalized values, in the order they were encountered
    pub values: Vec<String>,
    /// The surface forms these systems use instead
    pub substitutions: Substitutions,
}

/// Systems that share one URL template, one archive path, and
/// compatible substitutions.
#[derive(Debug, Clone, Default)]
pub(crate) struct DepGroup {
    /// The shared URL template
    pub url: String,
    /// The shared `urlSuffix` value (`.tar.gz`, `.exe`, or empty)
    pub suffix: String,
    /// One chosen download per system, parallel to `systems`
    pub files: Vec<DlFile>,
    /// The systems this group covers, parallel to `files`
    pub systems: Vec<System>,
    /// dimension → normalized → surface, accumulated from the files
    pub substitutions: Substitutions,
    /// Divergent substitutions within the group, keyed by matcher
    pub override_matcher: Vec<MatcherCarveOut>,
    /// The shared archive-path template, filled by the regroup pass
    pub archive_path: String,
    /// The shared `archivePathSuffix` value (`.exe` or empty)
    pub archive_path_suffix: String,
}

fn dimension_value<'s>(system: &'s System, dimension: &str) -> &'s str {
    match dimension {
        "os" => &system.os,
        "arch" => &system.arch,
        other => panic!("unknown matcher dimension {other:?}"),
    }
}

impl DepGroup {
    fn new() -> Self {
        let mut substitutions = Substitutions::new();
        substitutions.insert("os".to_owned(), SortedMap::new());
        substitutions.insert("arch".to_owned(), SortedMap::new());
        DepGroup {
            substitutions,
            ..DepGroup::default()
        }
    }

    /// The surface this group would render for `normalized` on `system`:
    /// a matching carve-out wins over the base table.
    fn expected_surface(&self, system: &System, dimension: &str, normalized: &str) -> Option<&str> {
        for carve in &self.override_matcher {
            if !carve
                .values
                .contains(&dimension_value(system, &carve.dimension).to_owned())
            {
                continue;
            }
            if let Some(surface) = carve
                .substitutions
                .get(dimension)
                .and_then(|subs| subs.get(normalized))
            {
                return Some(surface.as_str());
            }
        }
        self.substitutions
            .get(dimension)
            .and_then(|subs| subs.get(normalized))
            .map(String::as_str)
    }

    fn conflicts(&self, file: &DlFile) -> Vec<&'static str> {
        let system = file.system();
        let mut out = vec![];
        for (dimension, sub) in [("os", &file.os_sub), ("arch", &file.arch_sub)] {
            match self.expected_surface(&system, dimension, &sub.normalized) {
                Some(surface) if surface != sub.surface => out.push(dimension),
                _ => {}
            }
        }
        out
    }

    /// The dimension a carve-out for `file`'s conflicts could key on: it
    /// must not itself be conflicted, and `file`'s value on it must be
    /// new to the group so the matcher targets nothing else.
    fn carve_dimension(&self, file: &DlFile, conflicts: &[&str]) -> Option<&'static str> {
        let system = file.system();
        for dimension in ["os", "arch"] {
            if conflicts.contains(&dimension) {
                continue;
            }
            let value = dimension_value(&system, dimension);
            if !self
                .systems
                .iter()
                .any(|s| dimension_value(s, dimension) == value)
            {
                return Some(dimension);
            }
        }
        None
    }

    /// Can `file` join this group?
    pub fn file_allowed(&self, file: &DlFile) -> bool {
        if self.files.is_empty() {
            return true;
        }
        if file.url != self.url || file.suffix != self.suffix {
            return false;
        }
        let conflicts = self.conflicts(file);
        if conflicts.is_empty() {
            return true;
        }
        self.carve_dimension(file, &conflicts).is_some()
    }

    /// Add `file`, merging its surface forms into the group tables.
    /// Callers check [`DepGroup::file_allowed`][] first.
    pub fn add_file(&mut self, file: DlFile) {
        let system = file.system();
        if self.files.is_empty() {
            self.url = file.url.clone();
            self.suffix = file.suffix.clone();
        }

        let conflicts = self.conflicts(&file);
        if !conflicts.is_empty() {
            let dimension = self
                .carve_dimension(&file, &conflicts)
                .expect("file added to a group that does not allow it");
            let value = dimension_value(&system, dimension).to_owned();
            let mut overlay = Substitutions::new();
            for conflicted in &conflicts {
                let sub = match *conflicted {
                    "os" => &file.os_sub,
                    _ => &file.arch_sub,
                };
                overlay
                    .entry((*conflicted).to_owned())
                    .or_default()
                    .insert(sub.normalized.clone(), sub.surface.clone());
            }
            match self
                .override_matcher
                .iter_mut()
                .find(|c| c.dimension == dimension && c.substitutions == overlay)
            {
                Some(carve) => {
                    if !carve.values.contains(&value) {
                        carve.values.push(value);
                    }
                }
                None => self.override_matcher.push(MatcherCarveOut {
                    dimension: dimension.to_owned(),
                    values: vec![value],
                    substitutions: overlay,
                }),
            }
        }

        for (dimension, sub) in [("os", &file.os_sub), ("arch", &file.arch_sub)] {
            if conflicts.contains(&dimension) {
                continue;
            }
            self.substitutions
                .entry(dimension.to_owned())
                .or_default()
                .entry(sub.normalized.clone())
                .or_insert_with(|| sub.surface.clone());
        }

        self.systems.push(system);
        self.files.push(file);
    }

    /// This group rendered as a dependency, template holes and all.
    /// The primary group's rendition becomes the emitted template.
    pub fn dependency(&self, name: &str) -> Dependency {
        let mut vars = SortedMap::new();
        vars.insert(
            "archivePathSuffix".to_owned(),
            self.archive_path_suffix.clone(),
        );
        vars.insert("urlSuffix".to_owned(), self.suffix.clone());
        Dependency {
            url: Some(self.url.clone()),
            archive_path: Some(self.archive_path.clone()),
            bin: Some(name.to_owned()),
            vars,
            required_vars: vec!["version".to_owned()],
            overrides: self.carve_overrides(None),
            substitutions: self.substitutions.clone(),
            systems: self.systems.clone(),
            ..Dependency::default()
        }
    }

    fn carve_overrides(&self, base_matcher: Option<&OverrideMatcher>) -> Vec<DependencyOverride> {
        self.override_matcher
            .iter()
            .map(|carve| {
                let mut matcher = base_matcher.cloned().unwrap_or_default();
                matcher.insert(carve.dimension.clone(), carve.values.clone());
                DependencyOverride {
                    matcher,
                    dependency: Dependency {
                        substitutions: carve.substitutions.clone(),
                        ..Dependency::default()
                    },
                }
            })
            .collect()
    }

    /// The overrides a non-primary group contributes: one per matcher
    /// derivation step, each carrying this group's vars and
    /// substitutions (trimmed against the primary later).
    pub fn overrides(&self, other_groups: &[&DepGroup]) -> Vec<DependencyOverride> {
        let other_systems: Vec<System> = other_groups
            .iter()
            .flat_map(|g| g.systems.iter().cloned())
            .collect();
        let mut out = vec![];
        let mut remaining = self.systems.clone();
        while !remaining.is_empty() {
            let (matcher, _, rest) = systems_matcher(&remaining, &other_systems);
            let Some(matcher) = matcher else {
                break;
            };
            let mut vars = SortedMap::new();
            vars.insert(
                "archivePathSuffix".to_owned(),
                self.archive_path_suffix.clone(),
            );
            vars.insert("urlSuffix".to_owned(), self.suffix.clone());
            out.push(DependencyOverride {
                matcher: matcher.clone(),
                dependency: Dependency {
                    url: Some(self.url.clone()),
                    archive_path: Some(self.archive_path.clone()),
                    vars,
                    substitutions: self.substitutions.clone(),
                    ..Dependency::default()
                },
            });
            out.extend(self.carve_overrides(Some(&matcher)));
            remaining = rest;
        }
        out
    }
}

/// Derive a matcher selecting `systems` but none of `other_systems`.
///
/// Returns the matcher, the systems it selects, and the systems it had
/// to leave for another round. Dimension value lists preserve
/// first-encounter order.
pub(crate) fn systems_matcher(
    systems: &[System],
    other_systems: &[System],
) -> (Option<OverrideMatcher>, Vec<System>, Vec<System>) {
    fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
        values.unique().collect()
    }
    let oses = distinct(systems.iter().map(|s| s.os.clone()));
    let arches = distinct(systems.iter().map(|s| s.arch.clone()));
    let other_oses = distinct(other_systems.iter().map(|s| s.os.clone()));
    let other_arches = distinct(other_systems.iter().map(|s| s.arch.clone()));

    let exclusive_oses: Vec<String> = oses
        .iter()
        .filter(|o| !other_oses.contains(o))
        .cloned()
        .collect();
    if !exclusive_oses.is_empty() {
        let (matched, rest): (Vec<System>, Vec<System>) = systems
            .iter()
            .cloned()
            .partition(|s| exclusive_oses.contains(&s.os));
        let matcher = OverrideMatcher::from([("os".to_owned(), exclusive_oses)]);
        return (Some(matcher), matched, rest);
    }

    let exclusive_arches: Vec<String> = arches
        .iter()
        .filter(|a| !other_arches.contains(a))
        .cloned()
        .collect();
    if !exclusive_arches.is_empty() {
        let (matched, rest): (Vec<System>, Vec<System>) = systems
            .iter()
            .cloned()
            .partition(|s| exclusive_arches.contains(&s.arch));
        let matcher = OverrideMatcher::from([("arch".to_owned(), exclusive_arches)]);
        return (Some(matcher), matched, rest);
    }

    if oses.is_empty() != arches.is_empty() {
        panic!("inconsistent systems: one dimension empty but not the other");
    }
    if oses.is_empty() {
        return (None, vec![], systems.to_vec());
    }

    // Nothing exclusive: fix one value on the smaller dimension and list
    // what pairs with it, leaving the rest for the next round.
    if arches.len() < oses.len() {
        let arch = arches[0].clone();
        let (matched, rest): (Vec<System>, Vec<System>) =
            systems.iter().cloned().partition(|s| s.arch == arch);
        let arch_oses = distinct(matched.iter().map(|s| s.os.clone()));
        let matcher = OverrideMatcher::from([
            ("arch".to_owned(), vec![arch]),
            ("os".to_owned(), arch_oses),
        ]);
        (Some(matcher), matched, rest)
    } else {
        let os = oses[0].clone();
        let (matched, rest): (Vec<System>, Vec<System>) =
            systems.iter().cloned().partition(|s| s.os == os);
        let os_arches = distinct(matched.iter().map(|s| s.arch.clone()));
        let matcher = OverrideMatcher::from([
            ("os".to_owned(), vec![os]),
            ("arch".to_owned(), os_arches),
        ]);
        (Some(matcher), matched, rest)
    }
}

/// Place every chosen file into the first group that allows it, visiting
/// systems best-priority first so the strongest assets seed the groups.
pub(crate) fn build_groups(chosen: SortedMap<System, DlFile>) -> Vec<DepGroup> {
    let mut order: Vec<(System, DlFile)> = chosen.into_iter().collect();
    order.sort_by(|(sa, fa), (sb, fb)| fb.priority.cmp(&fa.priority).then_with(|| sa.cmp(sb)));

    let mut groups: Vec<DepGroup> = vec![];
    for (_, file) in order {
        match groups.iter_mut().find(|g| g.file_allowed(&file)) {
            Some(group) => group.add_file(file),
            None => {
                let mut group = DepGroup::new();
                group.add_file(file);
                groups.push(group);
            }
        }
    }
    groups.sort_by_key(|g| Reverse(g.files.len()));
    groups
}

fn last_url_segment(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_owned()
}

/// Resolve each archive's internal path and split groups whose files
/// disagree on it. Non-archive downloads keep their own filename as the
/// path. The selector only runs when an archive offers several
/// plausible entries.
pub(crate) async fn regroup_by_archive_path(
    groups: Vec<DepGroup>,
    version: &str,
    source: &dyn CandidateSource,
    select: &dyn SelectCandidate,
) -> BinfetchResult<Vec<DepGroup>> {
    let mut out = vec![];
    for group in groups {
        out.extend(regroup_one(group, version, source, select).await?);
    }
    out.sort_by_key(|g| Reverse(g.files.len()));
    Ok(out)
}

async fn regroup_one(
    mut group: DepGroup,
    version: &str,
    source: &dyn CandidateSource,
    select: &dyn SelectCandidate,
) -> BinfetchResult<Vec<DepGroup>> {
    let is_archive = group.files.first().map(|f| f.is_archive).unwrap_or(false);
    if !is_archive {
        group.archive_path = last_url_segment(&group.url);
        group.archive_path_suffix = String::new();
        return Ok(vec![group]);
    }

    // (archive-path template, archivePathSuffix) → member indexes,
    // in first-encounter order
    let mut partitions: Vec<((String, String), Vec<usize>)> = vec![];
    for (i, file) in group.files.iter().enumerate() {
        let mut candidates = source.candidates(&file.orig_url).await?;
        let chosen = match candidates.len() {
            0 => {
                return Err(BinfetchError::NoArchiveCandidates {
                    url: file.orig_url.clone(),
                })
            }
            1 => candidates.swap_remove(0),
            _ => select.select(&candidates)?,
        };
        let mut path = chosen.path;
        if !version.is_empty() {
            path = path.replace(version, "{{.version}}");
        }
        let suffix = if path.to_ascii_lowercase().ends_with(".exe") {
            path.truncate(path.len() - ".exe".len());
            ".exe"
        } else {
            ""
        };
        path.push_str("{{.archivePathSuffix}}");

        let key = (path, suffix.to_owned());
        match partitions.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(i),
            None => partitions.push((key, vec![i])),
        }
    }

    if partitions.len() == 1 {
        let ((path, suffix), _) = partitions.swap_remove(0);
        group.archive_path = path;
        group.archive_path_suffix = suffix;
        return Ok(vec![group]);
    }

    let files = std::mem::take(&mut group.files);
    let mut out = vec![];
    for ((path, suffix), members) in partitions {
        let mut split = DepGroup::new();
        for i in members {
            split.add_file(files[i].clone());
        }
        split.archive_path = path;
        split.archive_path_suffix = suffix;
        out.push(split);
    }
    Ok(out)
}
