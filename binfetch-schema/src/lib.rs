#![deny(missing_docs)]

//! # binfetch-schema
//!
//! This crate exists to serialize and deserialize the binfetch config
//! file (`binfetch.yml`). Ideally it should be reasonably forward and
//! backward compatible with different versions of the format.
//!
//! The root type of the schema is [`Config`][].
//!
//! URL and path fields in the config are *templates*: they may contain
//! `{{.os}}`, `{{.arch}}`, `{{.version}}`, `{{.urlSuffix}}` and
//! `{{.archivePathSuffix}}` holes which are filled in per system when a
//! dependency is resolved (see [`Config::resolved_dependency`][]).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::{gen::SchemaGenerator, schema::Schema, JsonSchema};
use serde::{Deserialize, Serialize};

/// A map with a reproducible iteration order
pub type SortedMap<K, V> = BTreeMap<K, V>;

/// Substitution tables: dimension (`os`/`arch`) → normalized value → the
/// surface form to splice into a template for that value.
pub type Substitutions = SortedMap<String, SortedMap<String, String>>;

/// An override matcher: dimension (`os`/`arch`) → the normalized values
/// the override applies to.
pub type OverrideMatcher = SortedMap<String, Vec<String>>;

/// Errors this crate can produce while resolving a config
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A system string wasn't `os/arch`
    #[error("invalid system {input:?}, expected the form os/arch")]
    InvalidSystem {
        /// what we were asked to parse
        input: String,
    },

    /// A dependency referenced a name that isn't in `dependencies`
    #[error("config has no dependency named {name:?}")]
    UnknownDependency {
        /// the missing name
        name: String,
    },

    /// A dependency referenced a template that isn't in `templates`
    #[error("dependency {dependency:?} references unknown template {template:?}")]
    UnknownTemplate {
        /// the dependency doing the referencing
        dependency: String,
        /// the missing template name
        template: String,
    },

    /// A dependency has no url to download from
    #[error("dependency {dependency:?} has no url")]
    MissingUrl {
        /// the dependency missing its url
        dependency: String,
    },

    /// A var listed in `required_vars` was never bound
    #[error("dependency {dependency:?} requires var {var:?} but it is not set")]
    MissingVar {
        /// the dependency missing the var
        dependency: String,
        /// the unbound var
        var: String,
    },

    /// A template hole survived interpolation
    #[error("template {template:?} still contains {placeholder:?} after interpolation")]
    UnresolvedTemplate {
        /// the string being interpolated
        template: String,
        /// the hole that had no binding
        placeholder: String,
    },
}

/// A target system: a normalized `(os, arch)` pair.
///
/// Serialized as the single string `os/arch`, which is also the form the
/// config file uses in `systems` lists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct System {
    /// Normalized operating system (e.g. `linux`, `darwin`, `windows`)
    pub os: String,
    /// Normalized architecture (e.g. `amd64`, `arm64`, `386`)
    pub arch: String,
}

impl System {
    /// Make a system from its two halves
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        System {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for System {
    type Err = SchemaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() && !arch.contains('/') => {
                Ok(System::new(os, arch))
            }
            _ => Err(SchemaError::InvalidSystem {
                input: s.to_owned(),
            }),
        }
    }
}

impl Serialize for System {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for System {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e| D::Error::custom(format!("{e}")))
    }
}

impl JsonSchema for System {
    fn schema_name() -> String {
        "System".to_owned()
    }
    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// A dependency or a template: the two share a shape, a template is just
/// a dependency other dependencies can start from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Dependency {
    /// The project's homepage (templates only)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// A one-line description of the tool (templates only)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Name of the template this dependency starts from
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// The download URL template
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Path of the tool inside the downloaded archive. For non-archive
    /// downloads this is the downloaded file itself.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,

    /// The name the extracted binary should get
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,

    /// Values for template holes (`version`, `urlSuffix`, ...)
    #[serde(default)]
    #[serde(skip_serializing_if = "SortedMap::is_empty")]
    pub vars: SortedMap<String, String>,

    /// Vars that must be bound before this dependency can resolve
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_vars: Vec<String>,

    /// Per-system refinements, applied in order when their matcher hits
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<DependencyOverride>,

    /// Surface forms to splice into templates per normalized os/arch
    #[serde(default)]
    #[serde(skip_serializing_if = "SortedMap::is_empty")]
    pub substitutions: Substitutions,

    /// The systems this dependency supports
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub systems: Vec<System>,
}

/// A matcher plus the partial dependency to merge in where it applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyOverride {
    /// Which systems this override applies to
    #[serde(default)]
    #[serde(skip_serializing_if = "SortedMap::is_empty")]
    pub matcher: OverrideMatcher,

    /// The fields to merge over the base dependency
    pub dependency: Dependency,
}

impl DependencyOverride {
    /// Does this override apply to `system`?
    ///
    /// Every matcher dimension must hit; an unknown dimension never hits.
    pub fn matches(&self, system: &System) -> bool {
        self.matcher.iter().all(|(dim, values)| match dim.as_str() {
            "os" => values.contains(&system.os),
            "arch" => values.contains(&system.arch),
            _ => false,
        })
    }
}

/// The root of a binfetch config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// The systems this project wants tools for
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub systems: Vec<System>,

    /// Tools this project depends on
    #[serde(default)]
    #[serde(skip_serializing_if = "SortedMap::is_empty")]
    pub dependencies: SortedMap<String, Dependency>,

    /// Reusable dependency templates
    #[serde(default)]
    #[serde(skip_serializing_if = "SortedMap::is_empty")]
    pub templates: SortedMap<String, Dependency>,

    /// Known checksum for every downloadable URL
    #[serde(default)]
    #[serde(skip_serializing_if = "SortedMap::is_empty")]
    pub url_checksums: SortedMap<String, String>,
}

/// A dependency fully resolved for one system: every template hole
/// filled, every override applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// The concrete download URL
    pub url: String,
    /// The concrete path inside the archive (empty for none)
    pub archive_path: String,
    /// The binary name
    pub bin: String,
    /// The full var table used for interpolation
    pub vars: SortedMap<String, String>,
}

impl Dependency {
    /// Overlay `self` on top of `base` (the template it references).
    ///
    /// Scalar fields win when set, vars and substitutions merge with
    /// `self` winning per key, overrides concatenate.
    fn over(&self, base: &Dependency) -> Dependency {
        let mut merged = base.clone();
        merged.template = self.template.clone();
        if self.homepage.is_some() {
            merged.homepage = self.homepage.clone();
        }
        if self.description.is_some() {
            merged.description = self.description.clone();
        }
        if self.url.is_some() {
            merged.url = self.url.clone();
        }
        if self.archive_path.is_some() {
            merged.archive_path = self.archive_path.clone();
        }
        if self.bin.is_some() {
            merged.bin = self.bin.clone();
        }
        merged.vars.extend(self.vars.clone());
        for (dim, subs) in &self.substitutions {
            merged
                .substitutions
                .entry(dim.clone())
                .or_default()
                .extend(subs.clone());
        }
        merged.overrides.extend(self.overrides.iter().cloned());
        for var in &self.required_vars {
            if !merged.required_vars.contains(var) {
                merged.required_vars.push(var.clone());
            }
        }
        if !self.systems.is_empty() {
            merged.systems = self.systems.clone();
        }
        merged
    }
}

impl Config {
    /// The systems a named dependency declares support for
    pub fn systems_for(&self, name: &str) -> Result<Vec<System>, SchemaError> {
        Ok(self.merged_dependency(name)?.systems)
    }

    /// The named dependency with its template dereferenced, before any
    /// per-system work.
    fn merged_dependency(&self, name: &str) -> Result<Dependency, SchemaError> {
        let dep = self
            .dependencies
            .get(name)
            .ok_or_else(|| SchemaError::UnknownDependency {
                name: name.to_owned(),
            })?;
        match &dep.template {
            None => Ok(dep.clone()),
            Some(tmpl) => {
                let base = self
                    .templates
                    .get(tmpl)
                    .ok_or_else(|| SchemaError::UnknownTemplate {
                        dependency: name.to_owned(),
                        template: tmpl.clone(),
                    })?;
                Ok(dep.over(base))
            }
        }
    }

    /// Resolve the named dependency for one system: dereference its
    /// template, apply every matching override in order, splice the
    /// os/arch surface forms into the var table, and fill every hole.
    pub fn resolved_dependency(
        &self,
        name: &str,
        system: &System,
    ) -> Result<ResolvedDependency, SchemaError> {
        let mut dep = self.merged_dependency(name)?;

        for ovr in std::mem::take(&mut dep.overrides) {
            if !ovr.matches(system) {
                continue;
            }
            let refined = ovr.dependency;
            if refined.url.is_some() {
                dep.url = refined.url;
            }
            if refined.archive_path.is_some() {
                dep.archive_path = refined.archive_path;
            }
            if refined.bin.is_some() {
                dep.bin = refined.bin;
            }
            dep.vars.extend(refined.vars);
            for (dim, subs) in refined.substitutions {
                dep.substitutions.entry(dim).or_default().extend(subs);
            }
        }

        for var in &dep.required_vars {
            if !dep.vars.contains_key(var) {
                return Err(SchemaError::MissingVar {
                    dependency: name.to_owned(),
                    var: var.clone(),
                });
            }
        }

        let mut vars = dep.vars.clone();
        let os_surface = dep
            .substitutions
            .get("os")
            .and_then(|subs| subs.get(&system.os))
            .cloned()
            .unwrap_or_else(|| system.os.clone());
        let arch_surface = dep
            .substitutions
            .get("arch")
            .and_then(|subs| subs.get(&system.arch))
            .cloned()
            .unwrap_or_else(|| system.arch.clone());
        vars.insert("os".to_owned(), os_surface);
        vars.insert("arch".to_owned(), arch_surface);

        let url_tmpl = dep.url.as_deref().ok_or_else(|| SchemaError::MissingUrl {
            dependency: name.to_owned(),
        })?;
        let url = interpolate(url_tmpl, &vars)?;
        let archive_path = interpolate(dep.archive_path.as_deref().unwrap_or_default(), &vars)?;
        let bin = interpolate(dep.bin.as_deref().unwrap_or(name), &vars)?;

        Ok(ResolvedDependency {
            url,
            archive_path,
            bin,
            vars,
        })
    }
}

/// Fill every `{{.var}}` hole in `template` from `vars`.
///
/// Errors if any hole survives, naming the first unbound one.
pub fn interpolate(
    template: &str,
    vars: &SortedMap<String, String>,
) -> Result<String, SchemaError> {
    let mut out = template.to_owned();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{.{key}}}}}"), value);
    }
    if let Some(start) = out.find("{{.") {
        let end = out[start..].find("}}").map(|i| start + i + 2);
        let placeholder = match end {
            Some(end) => out[start..end].to_owned(),
            None => out[start..].to_owned(),
        };
        return Err(SchemaError::UnresolvedTemplate {
            template: template.to_owned(),
            placeholder,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sys(s: &str) -> System {
        s.parse().unwrap()
    }

    #[test]
    fn system_string_form_round_trips() {
        let system = sys("linux/amd64");
        assert_eq!(system.os, "linux");
        assert_eq!(system.arch, "amd64");
        assert_eq!(system.to_string(), "linux/amd64");

        let yaml = serde_yml::to_string(&vec![sys("darwin/arm64"), sys("linux/386")]).unwrap();
        let back: Vec<System> = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back, vec![sys("darwin/arm64"), sys("linux/386")]);

        assert!("linux".parse::<System>().is_err());
        assert!("linux/".parse::<System>().is_err());
        assert!("a/b/c".parse::<System>().is_err());
    }

    #[test]
    fn systems_order_by_os_then_arch() {
        let mut systems = vec![sys("linux/386"), sys("darwin/arm64"), sys("darwin/amd64")];
        systems.sort();
        assert_eq!(
            systems,
            vec![sys("darwin/amd64"), sys("darwin/arm64"), sys("linux/386")]
        );
    }

    #[test]
    fn interpolate_fills_every_hole() {
        let mut vars = SortedMap::new();
        vars.insert("os".to_owned(), "linux".to_owned());
        vars.insert("arch".to_owned(), "x86_64".to_owned());
        vars.insert("version".to_owned(), "1.2.3".to_owned());
        vars.insert("urlSuffix".to_owned(), ".tar.gz".to_owned());
        let got = interpolate(
            "https://example.com/v{{.version}}/tool_{{.os}}_{{.arch}}{{.urlSuffix}}",
            &vars,
        )
        .unwrap();
        assert_eq!(got, "https://example.com/v1.2.3/tool_linux_x86_64.tar.gz");
    }

    #[test]
    fn interpolate_reports_unbound_holes() {
        let vars = SortedMap::new();
        let err = interpolate("tool{{.archivePathSuffix}}", &vars).unwrap_err();
        match err {
            SchemaError::UnresolvedTemplate { placeholder, .. } => {
                assert_eq!(placeholder, "{{.archivePathSuffix}}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn fixture() -> Config {
        let mut template = Dependency {
            url: Some("https://dl.example/v{{.version}}/tool_{{.os}}_{{.arch}}{{.urlSuffix}}".to_owned()),
            archive_path: Some("tool{{.archivePathSuffix}}".to_owned()),
            bin: Some("tool".to_owned()),
            required_vars: vec!["version".to_owned()],
            systems: vec![sys("darwin/amd64"), sys("linux/amd64"), sys("windows/amd64")],
            ..Dependency::default()
        };
        template
            .vars
            .insert("archivePathSuffix".to_owned(), String::new());
        template
            .vars
            .insert("urlSuffix".to_owned(), ".tar.gz".to_owned());
        template.overrides.push(DependencyOverride {
            matcher: OverrideMatcher::from([("os".to_owned(), vec!["windows".to_owned()])]),
            dependency: Dependency {
                vars: SortedMap::from([("archivePathSuffix".to_owned(), ".exe".to_owned())]),
                ..Dependency::default()
            },
        });
        let mut substitutions = Substitutions::new();
        substitutions.insert(
            "arch".to_owned(),
            SortedMap::from([("amd64".to_owned(), "x86_64".to_owned())]),
        );
        template.substitutions = substitutions;

        let dependency = Dependency {
            template: Some("tool".to_owned()),
            vars: SortedMap::from([("version".to_owned(), "1.2.3".to_owned())]),
            ..Dependency::default()
        };

        Config {
            systems: vec![],
            dependencies: SortedMap::from([("tool".to_owned(), dependency)]),
            templates: SortedMap::from([("tool".to_owned(), template)]),
            url_checksums: SortedMap::new(),
        }
    }

    #[test]
    fn resolution_applies_substitutions() {
        let cfg = fixture();
        let resolved = cfg
            .resolved_dependency("tool", &sys("linux/amd64"))
            .unwrap();
        assert_eq!(
            resolved.url,
            "https://dl.example/v1.2.3/tool_linux_x86_64.tar.gz"
        );
        assert_eq!(resolved.archive_path, "tool");
        assert_eq!(resolved.bin, "tool");
    }

    #[test]
    fn resolution_applies_matching_overrides() {
        let cfg = fixture();
        let resolved = cfg
            .resolved_dependency("tool", &sys("windows/amd64"))
            .unwrap();
        assert_eq!(resolved.archive_path, "tool.exe");
        assert_eq!(
            resolved.url,
            "https://dl.example/v1.2.3/tool_windows_x86_64.tar.gz"
        );
    }

    #[test]
    fn resolution_requires_required_vars() {
        let mut cfg = fixture();
        cfg.dependencies.get_mut("tool").unwrap().vars.clear();
        let err = cfg
            .resolved_dependency("tool", &sys("linux/amd64"))
            .unwrap_err();
        match err {
            SchemaError::MissingVar { var, .. } => assert_eq!(var, "version"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_yaml_round_trips() {
        let cfg = fixture();
        let yaml = serde_yml::to_string(&cfg).unwrap();
        let back: Config = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(cfg, back);
    }
}
