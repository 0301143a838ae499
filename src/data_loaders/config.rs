use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::yaml::load_yaml;
use crate::library::DEFAULT_VIDEO_EXTENSIONS;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub debug: bool,
    pub log_level: String,
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSettings {
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub thumbnails: ThumbnailSettings,
    pub runtime: RuntimeSettings,
    pub watcher: WatcherSettings,
    pub development: DevelopmentSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub loop_hint: bool,
    pub repeat_count: u32,
    pub engine_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibrarySettings {
    pub video_extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSettings {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub tick_sleep_ms: u64,
    pub monitor_check_interval_ms: u64,
    pub spawn_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatcherSettings {
    pub enabled: bool,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DevelopmentSettings {
    pub debug: bool,
    pub log_level: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            loop_hint: true,
            repeat_count: 65535,
            engine_args: Vec::new(),
        }
    }
}

impl PlaybackSettings {
    /// Options attached to every opened media. `engine_args` are accepted in
    /// command-line form (`--foo`) and rewritten as media options (`:foo`).
    pub fn media_options(&self, loop_hint: bool) -> Vec<String> {
        let mut options = Vec::new();
        if loop_hint {
            options.push(format!(":input-repeat={}", self.repeat_count));
        }
        options.extend(
            self.engine_args
                .iter()
                .map(|arg| arg.trim().trim_start_matches('-').trim_start_matches(':'))
                .filter(|arg| !arg.is_empty())
                .map(|arg| format!(":{arg}")),
        );
        options
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            width: 250,
            height: 120,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_sleep_ms: 16,
            monitor_check_interval_ms: 2000,
            spawn_timeout_ms: 1000,
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 600,
        }
    }
}

impl Default for DevelopmentSettings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = AppSettings::default();
        Self {
            debug: settings.development.debug,
            log_level: settings.development.log_level.clone(),
            settings,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Option<Self> {
        let value = load_yaml(path)?;
        Self::from_yaml(&value)
    }

    pub fn from_yaml(root: &Value) -> Option<Self> {
        let map = root.as_mapping()?;

        let settings = parse_settings(map);
        let debug = settings.development.debug;
        let log_level = settings.development.log_level.clone();

        Some(Self {
            debug,
            log_level,
            settings,
        })
    }
}

fn parse_settings(root: &Mapping) -> AppSettings {
    let mut settings = AppSettings::default();

    settings.development.debug = bool_at(root, "debug").unwrap_or(settings.development.debug);
    settings.development.log_level = str_at(root, "log_level")
        .unwrap_or(&settings.development.log_level)
        .to_lowercase();

    let settings_map = mapping_at(root, "settings");
    let playback_map = settings_map.and_then(|v| mapping_at(v, "playback"));
    let library_map = settings_map.and_then(|v| mapping_at(v, "library"));
    let thumbnails_map = settings_map.and_then(|v| mapping_at(v, "thumbnails"));
    let runtime_map = settings_map.and_then(|v| mapping_at(v, "runtime"));
    let watcher_map = settings_map.and_then(|v| mapping_at(v, "watcher"));
    let development_map = settings_map.and_then(|v| mapping_at(v, "development"));

    if let Some(playback) = playback_map {
        settings.playback.loop_hint = bool_any(playback, &["loop_hint", "native_loop", "input_repeat"])
            .unwrap_or(settings.playback.loop_hint);
        settings.playback.repeat_count = u64_any(playback, &["repeat_count", "input_repeat_count"])
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(settings.playback.repeat_count)
            .max(1);
        settings.playback.engine_args = string_list_at(playback, "engine_args")
            .unwrap_or(settings.playback.engine_args);
    }

    if let Some(library) = library_map {
        if let Some(exts) = string_list_at(library, "video_extensions") {
            let normalized: Vec<String> = exts
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if !normalized.is_empty() {
                settings.library.video_extensions = normalized;
            }
        }
    }

    if let Some(thumbnails) = thumbnails_map {
        settings.thumbnails.width = u64_at(thumbnails, "width")
            .map(|v| v.clamp(16, 4096) as u32)
            .unwrap_or(settings.thumbnails.width);
        settings.thumbnails.height = u64_at(thumbnails, "height")
            .map(|v| v.clamp(16, 4096) as u32)
            .unwrap_or(settings.thumbnails.height);
    }

    if let Some(runtime) = runtime_map {
        settings.runtime.tick_sleep_ms = u64_at(runtime, "tick_sleep_ms")
            .unwrap_or(settings.runtime.tick_sleep_ms)
            .max(1);
        settings.runtime.monitor_check_interval_ms =
            u64_any(runtime, &["monitor_check_interval_ms", "display_check_interval_ms"])
                .unwrap_or(settings.runtime.monitor_check_interval_ms)
                .max(250);
        settings.runtime.spawn_timeout_ms = u64_any(runtime, &["spawn_timeout_ms", "shell_timeout_ms"])
            .unwrap_or(settings.runtime.spawn_timeout_ms)
            .clamp(50, 10_000);
    }

    if let Some(watcher) = watcher_map {
        settings.watcher.enabled = bool_any(watcher, &["enabled", "auto_reload", "live_reload"])
            .unwrap_or(settings.watcher.enabled);
        settings.watcher.interval_ms = u64_any(watcher, &["interval_ms", "check_interval_ms"])
            .unwrap_or(settings.watcher.interval_ms)
            .max(100);
    }

    if let Some(dev) = development_map {
        settings.development.debug =
            bool_any(dev, &["debug", "debug_mode"]).unwrap_or(settings.development.debug);
        settings.development.log_level = str_any(dev, &["log_level", "logging"])
            .unwrap_or(&settings.development.log_level)
            .to_lowercase();
    }

    settings
}

fn bool_at(map: &Mapping, key: &str) -> Option<bool> {
    map.get(Value::String(key.to_string()))?.as_bool()
}

fn bool_any(map: &Mapping, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| bool_at(map, k))
}

fn str_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(Value::String(key.to_string()))?.as_str()
}

fn str_any<'a>(map: &'a Mapping, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| str_at(map, k))
}

fn mapping_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(Value::String(key.to_string()))?.as_mapping()
}

fn u64_at(map: &Mapping, key: &str) -> Option<u64> {
    map.get(Value::String(key.to_string()))?
        .as_i64()
        .and_then(|v| if v >= 0 { Some(v as u64) } else { None })
}

fn u64_any(map: &Mapping, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| u64_at(map, k))
}

fn string_list_at(map: &Mapping, key: &str) -> Option<Vec<String>> {
    let list = map.get(Value::String(key.to_string()))?.as_sequence()?;
    let parsed: Vec<String> = list
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();

    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> AppConfig {
        AppConfig::from_yaml(&serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn empty_mapping_yields_defaults() {
        assert_eq!(parse("{}"), AppConfig::default());
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        assert!(AppConfig::from_yaml(&Value::String("nope".into())).is_none());
    }

    #[test]
    fn reads_nested_sections_and_aliases() {
        let config = parse(
            r#"
settings:
  playback:
    native_loop: false
    repeat_count: 10
    engine_args: ["--no-osd"]
  library:
    video_extensions: [".MP4", "webm", ""]
  thumbnails:
    width: 320
  runtime:
    display_check_interval_ms: 5000
  watcher:
    live_reload: false
  development:
    debug_mode: true
    logging: INFO
"#,
        );

        let s = &config.settings;
        assert!(!s.playback.loop_hint);
        assert_eq!(s.playback.repeat_count, 10);
        assert_eq!(s.playback.engine_args, vec!["--no-osd".to_string()]);
        assert_eq!(s.library.video_extensions, vec!["mp4".to_string(), "webm".to_string()]);
        assert_eq!((s.thumbnails.width, s.thumbnails.height), (320, 120));
        assert_eq!(s.runtime.monitor_check_interval_ms, 5000);
        assert!(!s.watcher.enabled);
        assert!(config.debug);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = parse(
            r#"
settings:
  runtime:
    tick_sleep_ms: 0
    monitor_check_interval_ms: 1
    spawn_timeout_ms: 999999
  watcher:
    interval_ms: 3
  thumbnails:
    height: 1
"#,
        );

        let s = &config.settings;
        assert_eq!(s.runtime.tick_sleep_ms, 1);
        assert_eq!(s.runtime.monitor_check_interval_ms, 250);
        assert_eq!(s.runtime.spawn_timeout_ms, 10_000);
        assert_eq!(s.watcher.interval_ms, 100);
        assert_eq!(s.thumbnails.height, 16);
    }

    #[test]
    fn top_level_debug_flags_are_honoured() {
        let config = parse("debug: true\nlog_level: Error\n");
        assert!(config.debug);
        assert_eq!(config.log_level, "error");
    }

    #[test]
    fn media_options_carry_repeat_hint_and_engine_args() {
        let defaults = PlaybackSettings::default();
        assert_eq!(defaults.media_options(true), vec![":input-repeat=65535".to_string()]);
        assert!(defaults.media_options(false).is_empty());

        let config = parse(
            r#"
settings:
  playback:
    repeat_count: 3
    engine_args: ["--no-osd", ":avcodec-hw=none", "  "]
"#,
        );
        assert_eq!(
            config.settings.playback.media_options(true),
            vec![
                ":input-repeat=3".to_string(),
                ":no-osd".to_string(),
                ":avcodec-hw=none".to_string(),
            ]
        );
    }
}
