//! Errors!

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// An alias for the common Result type of this crate
pub type BinfetchResult<T> = std::result::Result<T, BinfetchError>;

/// Errors binfetch can have
#[derive(Debug, Error, Diagnostic)]
pub enum BinfetchError {
    /// random i/o error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// http error
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// yaml parse/print error
    #[error(transparent)]
    Yaml(#[from] serde_yml::Error),

    /// json print error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// a url that wouldn't parse
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// error from the config format layer
    #[error(transparent)]
    Schema(#[from] binfetch_schema::SchemaError),

    /// zip file couldn't be read
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    /// the interactive prompt failed
    #[error(transparent)]
    Prompt(#[from] dialoguer::Error),

    /// A repo that wasn't org/name
    #[error("repository {repo:?} is not of the form org/name")]
    #[diagnostic(help("pass the repository the way the forge spells it, e.g. cli/cli"))]
    MalformedRepo {
        /// what we got instead
        repo: String,
    },

    /// A release with nothing attached to it
    #[error("release {tag:?} of {repo} has no assets")]
    ReleaseHasNoAssets {
        /// the org/name repo
        repo: String,
        /// the tag we asked about ("latest" when unset)
        tag: String,
    },

    /// None of the release assets classified for any allowed system
    #[error("no asset of {name} matched any allowed system")]
    #[diagnostic(help(
        "asset names need a recognizable os token; pass --tag if the latest release is unusual"
    ))]
    NoUsableDownloads {
        /// the tool being added
        name: String,
    },

    /// An archive with no entry that could be the tool
    #[error("no entry in {url} looks like the binary")]
    #[diagnostic(help("the archive has no file named like the tool and no executable entries"))]
    NoArchiveCandidates {
        /// the archive we searched
        url: String,
    },

    /// A selector invoked on nothing
    #[error("asked to select from an empty candidate list")]
    EmptySelection,

    /// An archive format we can't list
    #[error("cannot list entries of {url}: unsupported archive format")]
    UnsupportedArchive {
        /// the archive we couldn't open
        url: String,
    },

    /// The config file isn't where we looked
    #[error("config {path} does not exist")]
    #[diagnostic(help("run from the project root, or pass --config"))]
    MissingConfig {
        /// where we looked
        path: Utf8PathBuf,
    },

    /// A rendered URL that has no recorded checksum
    #[error("expanded url {url} has no checksum recorded")]
    MissingChecksum {
        /// the uncovered URL
        url: String,
    },

    /// The synthesizer produced something the validator rejects
    #[error("generated config is invalid: {cause}\n\n{config_yaml}")]
    GeneratedConfigInvalid {
        /// what the validator said
        cause: String,
        /// the rejected config, rendered for diagnosis
        config_yaml: String,
    },
}
