use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// System set for config loading (other plugins can run after this)
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigLoaded;

/// Application configuration persisted to disk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfigData {
    /// Document to open on startup: a filesystem path or an http(s) URL
    #[serde(default)]
    pub document_locator: Option<String>,

    /// When true, editing controls are suppressed; navigation and export
    /// remain available
    #[serde(default)]
    pub read_only: bool,

    /// Directory scanned for `page-<n>.png` files to pre-populate the
    /// snapshot store
    #[serde(default)]
    pub snapshot_seed_dir: Option<PathBuf>,

    /// Last directory snapshots were exported to (remembered for quick access)
    #[serde(default)]
    pub last_export_dir: Option<PathBuf>,
}

/// Runtime configuration resource
#[derive(Resource)]
pub struct AppConfig {
    /// The persisted configuration data
    pub data: AppConfigData,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Whether config needs to be saved (dirty flag)
    pub dirty: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: AppConfigData::default(),
            config_path: get_config_path(),
            dirty: false,
        }
    }
}

/// Resource to notify user when config was reset to defaults
#[derive(Resource, Default)]
pub struct ConfigResetNotification {
    /// Whether to show the notification dialog
    pub show: bool,
    /// The reason for the reset (parse error, read error, etc.)
    pub reason: Option<String>,
}

/// Message to trigger config save
#[derive(Message)]
pub struct SaveConfigRequest;

/// Message to update the document locator in config
#[derive(Message)]
pub struct SetDocumentLocatorRequest {
    pub locator: String,
}

/// Message to remember the last export directory
#[derive(Message)]
pub struct SetLastExportDirRequest {
    pub path: PathBuf,
}

/// Get the path to the config file (platform-appropriate location)
fn get_config_path() -> PathBuf {
    crate::paths::config_file()
}

/// Result of loading config from disk
struct LoadConfigResult {
    config: AppConfig,
    /// Error message if config was reset to defaults due to an error
    reset_reason: Option<String>,
}

/// Load configuration from disk
fn load_config() -> LoadConfigResult {
    let config_path = get_config_path();

    let (data, reset_reason) = if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(data) => {
                    info!("Loaded config from {:?}", config_path);
                    (data, None)
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}", e);
                    (
                        AppConfigData::default(),
                        Some(format!("Configuration file was corrupted: {}", e)),
                    )
                }
            },
            Err(e) => {
                warn!("Failed to read config file: {}", e);
                (
                    AppConfigData::default(),
                    Some(format!("Could not read configuration file: {}", e)),
                )
            }
        }
    } else {
        info!("No config file found, using defaults");
        (AppConfigData::default(), None)
    };

    LoadConfigResult {
        config: AppConfig {
            data,
            config_path,
            dirty: false,
        },
        reset_reason,
    }
}

/// Save configuration to disk
fn save_config(config: &AppConfig) {
    match serde_json::to_string_pretty(&config.data) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&config.config_path, json) {
                error!("Failed to save config: {}", e);
            } else {
                info!("Config saved to {:?}", config.config_path);
            }
        }
        Err(e) => {
            error!("Failed to serialize config: {}", e);
        }
    }
}

/// Startup system to load config from disk into the existing resource
fn load_config_system(
    mut config: ResMut<AppConfig>,
    mut reset_notification: ResMut<ConfigResetNotification>,
) {
    let result = load_config();
    config.data = result.config.data;
    config.config_path = result.config.config_path;
    config.dirty = result.config.dirty;

    // Set notification if config was reset due to an error
    if let Some(reason) = result.reset_reason {
        reset_notification.show = true;
        reset_notification.reason = Some(reason);
    }
}

/// System to save config when requested
fn save_config_system(
    mut events: MessageReader<SaveConfigRequest>,
    mut config: ResMut<AppConfig>,
) {
    for _ in events.read() {
        if config.dirty {
            save_config(&config);
            config.dirty = false;
        }
    }
}

/// System to update the document locator
fn set_document_locator_system(
    mut events: MessageReader<SetDocumentLocatorRequest>,
    mut config: ResMut<AppConfig>,
    mut save_events: MessageWriter<SaveConfigRequest>,
) {
    for event in events.read() {
        config.data.document_locator = Some(event.locator.clone());
        config.dirty = true;
        save_events.write(SaveConfigRequest);
        info!("Set document locator to {:?}", event.locator);
    }
}

/// System to remember the last export directory
fn set_last_export_dir_system(
    mut events: MessageReader<SetLastExportDirRequest>,
    mut config: ResMut<AppConfig>,
    mut save_events: MessageWriter<SaveConfigRequest>,
) {
    for event in events.read() {
        config.data.last_export_dir = Some(event.path.clone());
        config.dirty = true;
        save_events.write(SaveConfigRequest);
    }
}

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AppConfig>()
            .init_resource::<ConfigResetNotification>()
            .add_message::<SaveConfigRequest>()
            .add_message::<SetDocumentLocatorRequest>()
            .add_message::<SetLastExportDirRequest>()
            .add_systems(Startup, load_config_system.in_set(ConfigLoaded))
            .add_systems(
                Update,
                (
                    save_config_system.run_if(on_message::<SaveConfigRequest>),
                    set_document_locator_system
                        .run_if(on_message::<SetDocumentLocatorRequest>),
                    set_last_export_dir_system.run_if(on_message::<SetLastExportDirRequest>),
                ),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_data_default() {
        let data = AppConfigData::default();
        assert!(data.document_locator.is_none());
        assert!(!data.read_only);
        assert!(data.snapshot_seed_dir.is_none());
        assert!(data.last_export_dir.is_none());
    }

    #[test]
    fn test_app_config_data_serialization() {
        let data = AppConfigData {
            document_locator: Some("https://example.com/manual.pdf".into()),
            read_only: true,
            snapshot_seed_dir: Some(PathBuf::from("/path/to/seeds")),
            last_export_dir: Some(PathBuf::from("/path/to/exports")),
        };

        let json = serde_json::to_string(&data).unwrap();
        let parsed: AppConfigData = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.document_locator, data.document_locator);
        assert_eq!(parsed.read_only, data.read_only);
        assert_eq!(parsed.snapshot_seed_dir, data.snapshot_seed_dir);
        assert_eq!(parsed.last_export_dir, data.last_export_dir);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfigData =
            serde_json::from_str(r#"{"document_locator": "notes.pdf"}"#).unwrap();
        assert_eq!(parsed.document_locator.as_deref(), Some("notes.pdf"));
        assert!(!parsed.read_only);
        assert!(parsed.snapshot_seed_dir.is_none());
    }
}
