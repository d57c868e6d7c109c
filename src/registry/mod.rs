//! Component registry
//!
//! Static catalog of the components `toolconf` manages. The built-in
//! catalog is embedded at compile time; an alternate catalog file can
//! replace it for packaging or testing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ToolconfError};
use crate::schema::OptionSpec;
use crate::settings::Settings;

/// Built-in component catalog.
pub const BUILTIN_CATALOG: &str = include_str!("../../catalog/components.yaml");

// ============================================================================
// Types
// ============================================================================

/// How a running instance is asked to reload its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReloadSpec {
    /// Send a line command over the component's control socket.
    Socket {
        /// Socket path, relative to the configuration root.
        socket: PathBuf,
        /// Command line to send, e.g. `RELOADAGENT`.
        command: String,
    },
    /// Signal the process recorded in a pid file.
    Signal {
        /// Pid file path, relative to the configuration root.
        pidfile: PathBuf,
        /// Signal name, `SIGHUP` when omitted.
        #[serde(default)]
        signal: Option<String>,
    },
}

/// One catalog entry as written in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntry {
    name: String,
    description: String,
    program: PathBuf,
    config_file: PathBuf,
    #[serde(default = "default_probe")]
    probe: bool,
    #[serde(default = "default_delimiter")]
    list_delimiter: char,
    #[serde(default)]
    reload: Option<ReloadSpec>,
    #[serde(default)]
    options: Vec<OptionSpec>,
}

const fn default_probe() -> bool {
    true
}

const fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Catalog {
    components: Vec<CatalogEntry>,
}

/// A registered component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Position in the registry, stable for the lifetime of the process.
    pub index: usize,
    /// Unique component name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Resolved executable path.
    pub executable: PathBuf,
    /// Resolved configuration file path.
    pub config_file: PathBuf,
    /// Executable exists and is runnable.
    pub installed: bool,
    /// Executable can be queried for its option capabilities.
    pub probe: bool,
    /// Separator for list values in change requests.
    pub list_delimiter: char,
    /// Reload mechanism, if the component supports one.
    pub reload: Option<ReloadSpec>,
    /// Static option table in declaration order.
    pub schema: Vec<OptionSpec>,
}

impl Component {
    /// Looks up a static option spec by name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.schema.iter().find(|o| o.name == name)
    }

    /// File name used in diagnostics, e.g. `gpg.conf`.
    #[must_use]
    pub fn config_label(&self) -> String {
        self.config_file.file_name().map_or_else(
            || self.config_file.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered, immutable set of components.
#[derive(Debug, Clone)]
pub struct Registry {
    components: Vec<Component>,
}

impl Registry {
    /// Loads the catalog selected by `settings` and probes executables.
    ///
    /// # Errors
    ///
    /// Returns an error if the alternate catalog cannot be read or the
    /// catalog is malformed.
    pub fn load(settings: &Settings) -> Result<Self> {
        match &settings.catalog {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|source| {
                    crate::error::ConfigError::Read {
                        path: path.clone(),
                        source,
                    }
                })?;
                Self::from_yaml(&yaml, settings)
            }
            None => Self::from_yaml(BUILTIN_CATALOG, settings),
        }
    }

    /// Builds a registry from catalog YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ToolconfError::Catalog`] on malformed YAML or duplicate
    /// component or option names.
    pub fn from_yaml(yaml: &str, settings: &Settings) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        let mut names = HashSet::new();
        let mut components = Vec::with_capacity(catalog.components.len());

        for (index, entry) in catalog.components.into_iter().enumerate() {
            if !names.insert(entry.name.clone()) {
                return Err(catalog_error(format!(
                    "duplicate component name '{}'",
                    entry.name
                )));
            }
            let mut option_names = HashSet::new();
            for option in &entry.options {
                if !option_names.insert(option.name.as_str()) {
                    return Err(catalog_error(format!(
                        "duplicate option '{}' in component '{}'",
                        option.name, entry.name
                    )));
                }
            }

            let executable = resolve(&settings.bin_dir, &entry.program);
            let installed = is_executable(&executable);
            debug!(
                component = %entry.name,
                executable = %executable.display(),
                installed,
                "registered component"
            );

            components.push(Component {
                index,
                name: entry.name,
                description: entry.description,
                executable,
                config_file: resolve(&settings.config_root, &entry.config_file),
                installed,
                probe: entry.probe,
                list_delimiter: entry.list_delimiter,
                reload: entry.reload,
                schema: entry.options,
            });
        }

        Ok(Self { components })
    }

    /// All components in registry order.
    #[must_use]
    pub fn list(&self) -> &[Component] {
        &self.components
    }

    /// Component at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Resolves a component name to its index.
    ///
    /// # Errors
    ///
    /// Returns [`ToolconfError::NotFound`] with a spelling suggestion when
    /// no component has that name.
    pub fn find(&self, name: &str) -> Result<usize> {
        self.components
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ToolconfError::NotFound {
                name: name.to_string(),
                suggestion: suggest(name, self.components.iter().map(|c| c.name.as_str())),
            })
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the registry holds no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Suggests the closest candidate for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
pub(crate) fn suggest<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|name| (name, strsim::damerau_levenshtein(input, name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

fn catalog_error(message: String) -> ToolconfError {
    ToolconfError::Catalog(<serde_yaml::Error as serde::de::Error>::custom(message))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Returns `true` if `path` is a regular file with an execute bit set.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
