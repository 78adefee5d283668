// src/config/profiles.rs
// Profile store: maps a symbolic name to provider, model, temperature, and
// ordered hook lists
//
// Profiles come from a TOML file. Resolution is strict: a missing profile,
// missing provider/model, unknown provider, or unregistered hook name is
// fatal to the request. There is deliberately no fallback profile: silently
// substituting a provider could send content to an unintended destination.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::hooks::{Hook, HookRegistry};
use crate::llm::Provider;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("profile '{profile}' is incomplete: missing {field}")]
    Incomplete { profile: String, field: &'static str },

    #[error("profile '{profile}' names unknown provider '{provider}'")]
    UnknownProvider { profile: String, provider: String },

    #[error("hookset not found: {0}")]
    HooksetNotFound(String),

    #[error("hookset '{hookset}' names unregistered hook '{hook}'")]
    UnknownHook { hookset: String, hook: String },

    #[error("profile '{profile}' temperature {value} outside [0,1]")]
    InvalidTemperature { profile: String, value: f32 },

    #[error("cannot read profile file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse profile file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct ProfilesFile {
    #[serde(default)]
    profiles: HashMap<String, ProfileEntry>,
    #[serde(default)]
    hooksets: HashMap<String, HooksetEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    provider: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    hookset: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct HooksetEntry {
    #[serde(default)]
    before: Vec<String>,
    #[serde(default)]
    after: Vec<String>,
}

/// A profile after resolution: concrete provider/model and hook handles.
/// Immutable for the rest of the request.
pub struct ResolvedProfile {
    pub name: String,
    pub provider: Provider,
    pub model: String,
    pub temperature: Option<f32>,
    pub before_hooks: Vec<Arc<dyn Hook>>,
    pub after_hooks: Vec<Arc<dyn Hook>>,
}

impl std::fmt::Debug for ResolvedProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProfile")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field(
                "before_hooks",
                &self.before_hooks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field(
                "after_hooks",
                &self.after_hooks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Loads the profile file once and resolves profiles by symbolic name.
#[derive(Debug)]
pub struct ProfileStore {
    cfg: ProfilesFile,
}

impl ProfileStore {
    /// Load profiles from a TOML file
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Parse profiles from TOML text
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ProfileError> {
        let cfg: ProfilesFile = toml::from_str(text).map_err(|source| ProfileError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Ok(Self { cfg })
    }

    /// Resolve a profile by name, materializing its hook lists through the
    /// registry. Fails rather than substituting defaults.
    pub fn resolve(
        &self,
        name: &str,
        registry: &HookRegistry,
    ) -> Result<ResolvedProfile, ProfileError> {
        let entry = self
            .cfg
            .profiles
            .get(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        let provider_name =
            entry
                .provider
                .as_deref()
                .ok_or_else(|| ProfileError::Incomplete {
                    profile: name.to_string(),
                    field: "provider",
                })?;
        let provider =
            Provider::parse(provider_name).ok_or_else(|| ProfileError::UnknownProvider {
                profile: name.to_string(),
                provider: provider_name.to_string(),
            })?;

        let model = entry
            .model
            .clone()
            .ok_or_else(|| ProfileError::Incomplete {
                profile: name.to_string(),
                field: "model",
            })?;

        if let Some(t) = entry.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(ProfileError::InvalidTemperature {
                    profile: name.to_string(),
                    value: t,
                });
            }
        }

        let (before_hooks, after_hooks) = match entry.hookset.as_deref() {
            Some(hookset_name) => {
                let hookset = self
                    .cfg
                    .hooksets
                    .get(hookset_name)
                    .ok_or_else(|| ProfileError::HooksetNotFound(hookset_name.to_string()))?;
                (
                    Self::materialize(hookset_name, &hookset.before, registry)?,
                    Self::materialize(hookset_name, &hookset.after, registry)?,
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(ResolvedProfile {
            name: name.to_string(),
            provider,
            model,
            temperature: entry.temperature,
            before_hooks,
            after_hooks,
        })
    }

    fn materialize(
        hookset: &str,
        names: &[String],
        registry: &HookRegistry,
    ) -> Result<Vec<Arc<dyn Hook>>, ProfileError> {
        names
            .iter()
            .map(|hook| {
                registry.get(hook).ok_or_else(|| ProfileError::UnknownHook {
                    hookset: hookset.to_string(),
                    hook: hook.clone(),
                })
            })
            .collect()
    }
}
