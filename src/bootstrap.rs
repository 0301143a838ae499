use std::{fs, path::Path};

use crate::{
    paths::{app_data_dir, CONFIG_FILE_NAME},
    info, warn,
};

pub const DEFAULT_CONFIG_YAML: &str = r#"settings:
  playback:
    loop_hint: true
    repeat_count: 65535
    engine_args: []
  library:
    video_extensions: ["mp4", "webm", "mkv", "avi", "mov", "m4v", "wmv"]
  thumbnails:
    width: 250
    height: 120
  runtime:
    tick_sleep_ms: 16
    monitor_check_interval_ms: 2000
    spawn_timeout_ms: 1000
  watcher:
    enabled: true
    interval_ms: 600
  development:
    debug: false
    log_level: warn
"#;

/// Creates `~/.planetboy_wallpaper/` and a default `config.yaml` if missing.
pub fn bootstrap() {
    scaffold(&app_data_dir());
}

pub fn scaffold(data_dir: &Path) {
    if let Err(e) = fs::create_dir_all(data_dir) {
        warn!("[WALLPAPER][BOOTSTRAP] Cannot create {}: {e}", data_dir.display());
        return;
    }

    let config = data_dir.join(CONFIG_FILE_NAME);
    if config.exists() {
        return;
    }
    match fs::write(&config, DEFAULT_CONFIG_YAML) {
        Ok(_) => info!("[WALLPAPER][BOOTSTRAP] Created {}", config.display()),
        Err(e) => warn!("[WALLPAPER][BOOTSTRAP] Failed to create {}: {e}", config.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loaders::config::AppConfig;

    #[test]
    fn scaffolded_config_matches_defaults() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        scaffold(&dir);

        let written = fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        let parsed = AppConfig::from_yaml(&serde_yaml::from_str(&written).unwrap()).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn existing_config_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config, "debug: true\n").unwrap();

        scaffold(dir.path());
        assert_eq!(fs::read_to_string(&config).unwrap(), "debug: true\n");
    }
}
