/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ReloadctlConfig, Validate};

/// Environment variable naming a config file, checked after `--config`.
pub const CONFIG_ENV_VAR: &str = "RELOADCTL_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("./reloadctl.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("reloadctl").join("config.toml"));
        }
        search_paths.push(PathBuf::from("/etc/reloadctl/config.toml"));
        Self::with_search_paths(search_paths)
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Loads and validates the configuration from `config_file`, the file
    /// named by `RELOADCTL_CONFIG`, or the first search path that exists.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<ReloadctlConfig, ConfigError> {
        let config_path = if let Some(path) = config_file {
            path.to_path_buf()
        } else if let Ok(env_config) = env::var(CONFIG_ENV_VAR) {
            PathBuf::from(env_config)
        } else {
            self.find_config_file()
                .ok_or_else(|| ConfigError::ConfigNotFound {
                    searched: self.search_paths.clone(),
                })?
        };

        let config = self.load_config_from_file(&config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses one file, without validation.
    pub fn load_config_from_file(&self, path: &Path) -> Result<ReloadctlConfig, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            None | Some("toml") => {}
            Some(ext) => {
                return Err(ConfigError::UnsupportedFormat {
                    extension: ext.to_string(),
                })
            }
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let substituted = substitute_env_vars(&content)?;
        Ok(toml::from_str::<ReloadctlConfig>(&substituted)?)
    }

    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands `${VAR}`, `${VAR:-default}` and `${VAR:?message}`.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for cap in re.captures_iter(content) {
        let (Some(whole), Some(expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        result.push_str(&content[last..whole.start()]);
        result.push_str(&resolve_var(expr.as_str())?);
        last = whole.end();
    }
    result.push_str(&content[last..]);
    Ok(result)
}

fn resolve_var(expr: &str) -> Result<String, ConfigError> {
    if let Some((name, default)) = expr.split_once(":-") {
        return Ok(env::var(name).unwrap_or_else(|_| default.to_string()));
    }
    let (name, message) = match expr.split_once(":?") {
        Some((name, message)) => (name, Some(message)),
        None => (expr, None),
    };
    env::var(name).map_err(|_| {
        ConfigError::EnvSubstitutionError(match message {
            Some(message) => format!(
                "Required environment variable '{}' is not set: {}",
                name, message
            ),
            None => format!("Required environment variable '{}' is not set", name),
        })
    })
}
