//! Persistent agent configuration: identity plus the policies to run.

use lookout_core::{generate_uid, LookoutError, Policy, Result};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::info;

const CONFIG_FILE_NAME: &str = ".lookoutd.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub uid: String,
    /// Insertion order is preserved across save and load.
    #[serde(default, alias = "policyConfig")]
    pub policies: Vec<Policy>,
}

impl AgentConfig {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            policies: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append `policy`. The list is untouched when the name is taken.
    pub fn add_policy(&mut self, policy: Policy) -> Result<()> {
        if self.contains(&policy.name) {
            return Err(LookoutError::DuplicateName { name: policy.name });
        }
        self.policies.push(policy);
        Ok(())
    }

    pub fn remove_policy(&mut self, name: &str) -> Result<Policy> {
        let index = self
            .policies
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| LookoutError::PolicyNotFound {
                name: name.to_string(),
            })?;
        Ok(self.policies.remove(index))
    }
}

/// File-backed [`AgentConfig`] guarded by a single lock.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<AgentConfig>,
}

impl ConfigStore {
    /// Load the config at `path`, creating it with a fresh UID if absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| LookoutError::Config {
                reason: format!("{}: {e}", path.display()),
            })?
        } else {
            let config = AgentConfig::new(generate_uid());
            write_atomic(&path, &config)?;
            info!(path = %path.display(), uid = %config.uid, "Created agent config");
            config
        };

        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    /// `$HOME/.lookoutd.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var_os("HOME").ok_or_else(|| LookoutError::Config {
            reason: "HOME is not set".to_string(),
        })?;
        Ok(PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exclusive access to the config. Mutations made through the guard are
    /// persisted with [`ConfigGuard::save`] before the lock is released.
    pub fn lock(&self) -> ConfigGuard<'_> {
        ConfigGuard {
            path: &self.path,
            config: self.config.lock(),
        }
    }

    pub fn uid(&self) -> String {
        self.config.lock().uid.clone()
    }

    pub fn snapshot(&self) -> AgentConfig {
        self.config.lock().clone()
    }
}

pub struct ConfigGuard<'a> {
    path: &'a Path,
    config: MutexGuard<'a, AgentConfig>,
}

impl ConfigGuard<'_> {
    pub fn save(&self) -> Result<()> {
        write_atomic(self.path, &self.config)
    }
}

impl Deref for ConfigGuard<'_> {
    type Target = AgentConfig;

    fn deref(&self) -> &AgentConfig {
        &self.config
    }
}

impl DerefMut for ConfigGuard<'_> {
    fn deref_mut(&mut self) -> &mut AgentConfig {
        &mut self.config
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
fn write_atomic(path: &Path, config: &AgentConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(config)?;

    let tmp_path = path.with_extension("json.tmp");
    let mut file = File::create(&tmp_path)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
