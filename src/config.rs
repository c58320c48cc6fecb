//! Effect configuration file handling and live reload.

use crate::effect::EffectDescriptor;
use anyhow::{anyhow, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use tracing::{error, info};

/// Which effect family to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Invert,
    Overlay,
    Cube,
    Fragment,
}

/// Effect settings, loadable from YAML and adjustable while running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_effect")]
    pub effect: EffectKind,
    /// Overlay blend color as `[r, g, b, a]` in 0..=1; the alpha is the blend
    /// weight.
    #[serde(default)]
    pub overlay: [f32; 4],
    /// Path to a GLSL fragment shader, required for the fragment effect.
    #[serde(default)]
    pub shader: Option<PathBuf>,
}

fn default_effect() -> EffectKind {
    EffectKind::Invert
}

impl Default for Config {
    fn default() -> Self {
        Self {
            effect: default_effect(),
            overlay: [0.0; 4],
            shader: None,
        }
    }
}

impl Config {
    /// Resolves the config into an effect descriptor.
    pub fn descriptor(&self) -> Result<EffectDescriptor> {
        match self.effect {
            EffectKind::Invert => Ok(EffectDescriptor::Invert),
            EffectKind::Overlay => Ok(EffectDescriptor::Overlay {
                color: self.overlay,
            }),
            EffectKind::Cube => Ok(EffectDescriptor::Cube),
            EffectKind::Fragment => self
                .shader
                .clone()
                .map(|path| EffectDescriptor::Fragment { path })
                .ok_or_else(|| anyhow!("The fragment effect requires a shader path")),
        }
    }
}

/// Manages configuration file watching and reloading.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    rx: Receiver<std::result::Result<Event, notify::Error>>,
    current_config: Option<Config>,
}

impl ConfigWatcher {
    /// Create a new config watcher if a path is provided.
    pub fn new(path: Option<PathBuf>) -> Option<Self> {
        let path = path?;
        let (tx, rx) = channel();

        match RecommendedWatcher::new(tx, notify::Config::default()) {
            Ok(mut watcher) => {
                if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                    tracing::warn!("Failed to watch config file {:?}: {}", path, e);
                    return None;
                }
                info!("Watching config file {:?} for changes", path);

                let current_config = match fs::read_to_string(&path) {
                    Ok(content) => serde_yaml::from_str::<Config>(&content).ok(),
                    Err(_) => None,
                };

                Some(Self {
                    path,
                    _watcher: watcher,
                    rx,
                    current_config,
                })
            }
            Err(e) => {
                tracing::warn!("Failed to create config watcher: {}", e);
                None
            }
        }
    }

    /// The config loaded when the watcher was created, if it parsed.
    pub fn current(&self) -> Option<&Config> {
        self.current_config.as_ref()
    }

    /// Check for changes and return (old_config, new_config) if changed.
    pub fn check_for_changes(&mut self) -> Option<(Option<Config>, Config)> {
        let mut needs_reload = false;
        while let Ok(res) = self.rx.try_recv() {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    needs_reload = true;
                }
            }
        }

        if needs_reload {
            info!("Config file changed, checking for updates...");
            match fs::read_to_string(&self.path) {
                Ok(content) => match serde_yaml::from_str::<Config>(&content) {
                    Ok(new_config) => {
                        let old = self.current_config.clone();
                        self.current_config = Some(new_config.clone());
                        return Some((old, new_config));
                    }
                    Err(e) => error!("Failed to parse new config: {}", e),
                },
                Err(e) => error!("Failed to read config file: {}", e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overlay_config() {
        let yaml = r#"
effect: overlay
overlay: [1.0, 0.0, 0.0, 0.5]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.effect, EffectKind::Overlay);
        assert_eq!(
            config.descriptor().unwrap(),
            EffectDescriptor::Overlay {
                color: [1.0, 0.0, 0.0, 0.5]
            }
        );
    }

    #[test]
    fn test_defaults_to_invert() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.effect, EffectKind::Invert);
        assert_eq!(config.descriptor().unwrap(), EffectDescriptor::Invert);
    }

    #[test]
    fn test_fragment_requires_shader_path() {
        let config: Config = serde_yaml::from_str("effect: fragment").unwrap();
        assert!(config.descriptor().is_err());

        let config: Config =
            serde_yaml::from_str("effect: fragment\nshader: effects/warp.frag").unwrap();
        assert_eq!(
            config.descriptor().unwrap(),
            EffectDescriptor::Fragment {
                path: PathBuf::from("effects/warp.frag")
            }
        );
    }
}
