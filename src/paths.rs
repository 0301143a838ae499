use std::path::PathBuf;

pub const DATA_DIR_NAME: &str = ".planetboy_wallpaper";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const LOG_FILE_NAME: &str = "planetboy.wallpaper.log";

pub fn user_home_dir() -> Option<PathBuf> {
    // Primary (most reliable on Windows)
    if let Ok(profile) = std::env::var("USERPROFILE") {
        return Some(PathBuf::from(profile));
    }

    let drive = std::env::var("HOMEDRIVE").ok();
    let path = std::env::var("HOMEPATH").ok();
    if let (Some(d), Some(p)) = (drive, path) {
        return Some(PathBuf::from(format!("{}{}", d, p)));
    }

    std::env::var("HOME").ok().map(PathBuf::from)
}

/// `~/.planetboy_wallpaper/`: library, config and log all live here.
pub fn app_data_dir() -> PathBuf {
    if let Some(home) = user_home_dir() {
        return home.join(DATA_DIR_NAME);
    }

    match std::env::current_exe() {
        Ok(path) => path
            .parent()
            .map(|p| p.join(DATA_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME)),
        Err(_) => std::env::current_dir()
            .map(|p| p.join(DATA_DIR_NAME))
            .unwrap_or_else(|_| PathBuf::from(DATA_DIR_NAME)),
    }
}

pub fn config_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn log_path() -> PathBuf {
    app_data_dir().join(LOG_FILE_NAME)
}
