//! Assembling the final config from the dependency groups.

use binfetch_schema::{Config, Dependency, SortedMap};

use super::group::DepGroup;

/// Build the config fragment for one synthesized tool: a template from
/// the primary group, overrides for every other group, a dependency
/// entry pinning the version, and the checksum table.
///
/// Output ordering is canonical: systems sort by `(os, arch)`, maps are
/// sorted, and overrides keep group order, so identical inputs yield
/// byte-identical YAML.
pub(crate) fn build_config(name: &str, version: &str, groups: &[DepGroup]) -> Config {
    let mut dep = groups[0].dependency(name);
    let mut checksums = SortedMap::new();
    for (i, group) in groups.iter().enumerate() {
        for file in &group.files {
            checksums.insert(
                file.orig_url.clone(),
                file.checksum.clone().unwrap_or_default(),
            );
        }
        if i == 0 {
            continue;
        }
        let others: Vec<&DepGroup> = groups
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, g)| g)
            .collect();
        dep.systems.extend(group.systems.iter().cloned());
        dep.overrides.extend(group.overrides(&others));
    }
    dep.systems.sort();

    minimize_substitutions(&mut dep);
    minimize_overrides(&mut dep);

    let pinned = Dependency {
        template: Some(name.to_owned()),
        vars: SortedMap::from([("version".to_owned(), version.to_owned())]),
        ..Dependency::default()
    };
    Config {
        systems: dep.systems.clone(),
        dependencies: SortedMap::from([(name.to_owned(), pinned)]),
        templates: SortedMap::from([(name.to_owned(), dep)]),
        url_checksums: checksums,
    }
}

/// Identity entries render the same whether present or not; drop them.
fn minimize_substitutions(dep: &mut Dependency) {
    for subs in dep.substitutions.values_mut() {
        subs.retain(|k, v| k != v);
    }
    dep.substitutions.retain(|_, subs| !subs.is_empty());
}

/// Trim each override down to what actually differs from the template.
///
/// An identity entry is kept when the template binds the same key to a
/// different surface: dropping it would silently inherit the wrong one.
fn minimize_overrides(dep: &mut Dependency) {
    let template_vars = dep.vars.clone();
    let template_subs = dep.substitutions.clone();
    for ovr in &mut dep.overrides {
        if ovr.dependency.url == dep.url {
            ovr.dependency.url = None;
        }
        if ovr.dependency.archive_path == dep.archive_path {
            ovr.dependency.archive_path = None;
        }
        ovr.dependency
            .vars
            .retain(|k, v| template_vars.get(k) != Some(v));
        for (dim, subs) in ovr.dependency.substitutions.iter_mut() {
            let template_dim = template_subs.get(dim);
            subs.retain(|k, v| match template_dim.and_then(|m| m.get(k)) {
                None => k != v,
                Some(template_value) => template_value != v,
            });
        }
        ovr.dependency.substitutions.retain(|_, subs| !subs.is_empty());
    }
    dep.overrides.retain(|o| o.dependency != Dependency::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::group::build_groups;
    use crate::synth::select::choose_per_system;
    use binfetch_schema::System;

    fn sys(s: &str) -> System {
        s.parse().unwrap()
    }

    fn assembled(urls: &[&str], version: &str, allowed: &[&str]) -> Config {
        let urls: Vec<String> = urls.iter().map(|u| (*u).to_owned()).collect();
        let allowed: Vec<System> = allowed.iter().map(|s| sys(s)).collect();
        let mut groups = build_groups(choose_per_system(&urls, version, &allowed));
        for group in &mut groups {
            group.archive_path = "tool{{.archivePathSuffix}}".to_owned();
        }
        build_config("tool", version, &groups)
    }

    #[test]
    fn single_group_emits_one_clean_template() {
        let cfg = assembled(
            &[
                "https://dl.example/tool_1.0.0_linux_amd64.tar.gz",
                "https://dl.example/tool_1.0.0_linux_386.tar.gz",
            ],
            "1.0.0",
            &["linux/amd64", "linux/386"],
        );
        let template = &cfg.templates["tool"];
        assert_eq!(
            template.url.as_deref(),
            Some("https://dl.example/tool_{{.version}}_{{.os}}_{{.arch}}{{.urlSuffix}}")
        );
        assert_eq!(template.vars["urlSuffix"], ".tar.gz");
        assert_eq!(template.vars["archivePathSuffix"], "");
        assert_eq!(template.required_vars, vec!["version"]);
        assert!(template.overrides.is_empty());
        assert!(template.substitutions.is_empty());
        assert_eq!(
            template.systems,
            vec![sys("linux/386"), sys("linux/amd64")]
        );

        let pinned = &cfg.dependencies["tool"];
        assert_eq!(pinned.template.as_deref(), Some("tool"));
        assert_eq!(pinned.vars["version"], "1.0.0");

        assert_eq!(cfg.url_checksums.len(), 2);
    }

    #[test]
    fn identity_substitutions_are_dropped() {
        let cfg = assembled(
            &["https://dl.example/tool-1.0.0-x86_64-apple-darwin.tar.gz"],
            "1.0.0",
            &["darwin/amd64"],
        );
        let template = &cfg.templates["tool"];
        assert_eq!(template.substitutions["os"]["darwin"], "apple-darwin");
        assert_eq!(template.substitutions["arch"]["amd64"], "x86_64");
        // nothing identity-shaped survives
        for subs in template.substitutions.values() {
            for (k, v) in subs {
                assert_ne!(k, v);
            }
        }
    }

    #[test]
    fn override_entries_matching_the_template_are_dropped() {
        // linux tarball, windows zip: two groups, the windows override
        // should only carry the vars that differ.
        let cfg = assembled(
            &[
                "https://dl.example/tool_1.0.0_linux_amd64.tar.gz",
                "https://dl.example/tool_1.0.0_darwin_amd64.tar.gz",
                "https://dl.example/tool_1.0.0_windows_amd64.zip",
            ],
            "1.0.0",
            &["linux/amd64", "darwin/amd64", "windows/amd64"],
        );
        let template = &cfg.templates["tool"];
        assert_eq!(template.vars["urlSuffix"], ".tar.gz");
        assert_eq!(template.overrides.len(), 1);
        let ovr = &template.overrides[0];
        assert_eq!(ovr.matcher["os"], vec!["windows"]);
        assert_eq!(
            ovr.dependency.vars,
            SortedMap::from([("urlSuffix".to_owned(), ".zip".to_owned())])
        );
        assert!(ovr.dependency.substitutions.is_empty());
    }

    #[test]
    fn systems_are_sorted_and_complete() {
        let cfg = assembled(
            &[
                "https://dl.example/tool_1.0.0_windows_amd64.tar.gz",
                "https://dl.example/tool_1.0.0_linux_amd64.tar.gz",
                "https://dl.example/tool_1.0.0_darwin_amd64.tar.gz",
            ],
            "1.0.0",
            &["windows/amd64", "linux/amd64", "darwin/amd64"],
        );
        assert_eq!(
            cfg.systems,
            vec![sys("darwin/amd64"), sys("linux/amd64"), sys("windows/amd64")]
        );
        assert_eq!(cfg.templates["tool"].systems, cfg.systems);
    }

    #[test]
    fn identity_override_entries_survive_when_the_template_disagrees() {
        // darwin spells amd64 as amd64 but the (larger) linux-spelled
        // group binds amd64 → x86_64 in the template, so darwin's
        // identity entry must stay or it would inherit x86_64.
        let cfg = assembled(
            &[
                "https://dl.example/tool-linux-x86_64.tar.gz",
                "https://dl.example/tool-freebsd-x86_64.tar.gz",
                "https://dl.example/pkg-darwin-amd64.tar.gz",
            ],
            "",
            &["linux/amd64", "freebsd/amd64", "darwin/amd64"],
        );
        let template = &cfg.templates["tool"];
        assert_eq!(template.substitutions["arch"]["amd64"], "x86_64");
        assert_eq!(template.overrides.len(), 1);
        let ovr = &template.overrides[0];
        assert_eq!(ovr.matcher["os"], vec!["darwin"]);
        assert_eq!(ovr.dependency.substitutions["arch"]["amd64"], "amd64");
    }
}
