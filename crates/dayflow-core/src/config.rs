//! TOML-based planner configuration.
//!
//! Stores the workspace identity and scheduling preferences:
//! - workspace id, display name, and the advisory core time window
//! - unplugged windows the scheduler routes around
//! - promotion monitor tick interval
//!
//! Configuration is stored at `~/.config/dayflow/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::store::data_dir;
use crate::timeutil::WallTime;
use crate::workspace::{CoreTime, UnpluggedWindow, Workspace};

/// Workspace identity and display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_id")]
    pub id: String,
    #[serde(default = "default_workspace_name")]
    pub name: String,
    /// Daily focus window; displayed, never enforced.
    #[serde(default)]
    pub core_time: Option<CoreTime>,
}

/// Promotion monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tick resolution in seconds. Coarser ticks only delay promotion
    /// visibility, never correctness.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dayflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Recurring exclusion windows, projected onto each day.
    #[serde(default)]
    pub unplugged: Vec<UnpluggedWindow>,
}

// Default functions
fn default_workspace_id() -> String {
    "default".into()
}
fn default_workspace_name() -> String {
    "My Day".into()
}
fn default_tick_seconds() -> u64 {
    1
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            id: default_workspace_id(),
            name: default_workspace_name(),
            core_time: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/dayflow"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing (and returning) the defaults when no
    /// config file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Reject windows that serde let through without going past
    /// [`UnpluggedWindow::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for window in &self.unplugged {
            if window.end <= window.start {
                return Err(ConfigError::InvalidValue {
                    key: "unplugged".to_string(),
                    message: format!(
                        "window '{}' must end after it starts ({} .. {})",
                        window.label, window.start, window.end
                    ),
                });
            }
        }
        if let Some(core) = &self.workspace.core_time {
            if core.end <= core.start {
                return Err(ConfigError::InvalidValue {
                    key: "workspace.core_time".to_string(),
                    message: format!("must end after it starts ({} .. {})", core.start, core.end),
                });
            }
        }
        if self.monitor.tick_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.tick_seconds".to_string(),
                message: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Set (or replace) the advisory core time window.
    pub fn set_core_time(&mut self, start: WallTime, end: WallTime) -> Result<(), ConfigError> {
        if end <= start {
            return Err(ConfigError::InvalidValue {
                key: "workspace.core_time".to_string(),
                message: format!("must end after it starts ({start} .. {end})"),
            });
        }
        self.workspace.core_time = Some(CoreTime { start, end });
        Ok(())
    }

    /// Add an unplugged window.
    pub fn add_unplugged(
        &mut self,
        label: impl Into<String>,
        start: WallTime,
        end: WallTime,
    ) -> Result<(), ConfigError> {
        let window = UnpluggedWindow::new(label, start, end)?;
        self.unplugged.push(window);
        Ok(())
    }

    /// Remove unplugged windows by label. Returns how many were dropped.
    pub fn remove_unplugged(&mut self, label: &str) -> usize {
        let before = self.unplugged.len();
        self.unplugged.retain(|w| w.label != label);
        before - self.unplugged.len()
    }

    /// Materialize the configured workspace.
    pub fn to_workspace(&self) -> Workspace {
        Workspace {
            id: self.workspace.id.clone(),
            name: self.workspace.name.clone(),
            core_time: self.workspace.core_time,
            unplugged_windows: self.unplugged.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(s: &str) -> WallTime {
        WallTime::parse(s).unwrap()
    }

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.workspace.id, "default");
        assert_eq!(parsed.workspace.name, "My Day");
        assert_eq!(parsed.monitor.tick_seconds, 1);
        assert!(parsed.unplugged.is_empty());
        parsed.validate().unwrap();
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.workspace.id, "default");
        assert_eq!(parsed.monitor.tick_seconds, 1);
    }

    #[test]
    fn validate_rejects_inverted_window() {
        // Serde bypasses the UnpluggedWindow constructor, so validation
        // has to catch hand-edited files.
        let raw = r#"
            [[unplugged]]
            label = "Lunch"
            start = "13:00"
            end = "12:00"
        "#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert!(matches!(
            parsed.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_tick() {
        let raw = "[monitor]\ntick_seconds = 0\n";
        let parsed: Config = toml::from_str(raw).unwrap();
        assert!(matches!(
            parsed.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn set_core_time_rejects_inverted_range() {
        let mut cfg = Config::default();
        assert!(cfg.set_core_time(wall("14:00"), wall("09:00")).is_err());
        cfg.set_core_time(wall("09:00"), wall("14:00")).unwrap();
        assert_eq!(cfg.workspace.core_time.unwrap().start, wall("09:00"));
    }

    #[test]
    fn unplugged_windows_add_and_remove() {
        let mut cfg = Config::default();
        cfg.add_unplugged("Lunch", wall("12:00"), wall("13:00"))
            .unwrap();
        cfg.add_unplugged("Gym", wall("18:00"), wall("19:00"))
            .unwrap();
        assert_eq!(cfg.unplugged.len(), 2);

        assert_eq!(cfg.remove_unplugged("Lunch"), 1);
        assert_eq!(cfg.remove_unplugged("Lunch"), 0);
        assert_eq!(cfg.unplugged.len(), 1);
        assert_eq!(cfg.unplugged[0].label, "Gym");
    }

    #[test]
    fn to_workspace_collects_the_configured_windows() {
        let mut cfg = Config::default();
        cfg.add_unplugged("Lunch", wall("12:00"), wall("13:00"))
            .unwrap();

        let ws = cfg.to_workspace();
        assert_eq!(ws.id, "default");
        assert_eq!(ws.name, "My Day");
        assert_eq!(ws.unplugged_windows.len(), 1);
    }

    #[test]
    fn windows_survive_toml_round_trip() {
        let mut cfg = Config::default();
        cfg.add_unplugged("Lunch", wall("12:00"), wall("13:00"))
            .unwrap();
        cfg.set_core_time(wall("09:00"), wall("12:00")).unwrap();

        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.unplugged[0].label, "Lunch");
        assert_eq!(parsed.unplugged[0].start, wall("12:00"));
        assert_eq!(parsed.workspace.core_time.unwrap().end, wall("12:00"));
    }
}
