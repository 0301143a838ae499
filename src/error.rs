use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WallpaperError {
    #[error("wallpaper file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("desktop window '{0}' not found")]
    DesktopNotFound(&'static str),
    #[error("failed to create wallpaper surface: {0}")]
    SurfaceCreation(String),
    #[error("failed to reparent wallpaper surface: {0}")]
    Reparent(String),
    #[error("failed to create media player: {0}")]
    PlayerCreation(String),
    #[error("playback error: {0}")]
    Playback(String),
    #[error("failed to set static wallpaper: {0}")]
    StaticWallpaper(String),
    #[error("failed to decode '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("display enumeration failed: {0}")]
    DisplayEnumeration(String),
    #[error("wallpaper library I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wallpaper library JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("control channel: {0}")]
    Control(String),
    #[error("desktop wallpaper is not supported on this platform")]
    UnsupportedPlatform,
}

pub type WallpaperResult<T> = std::result::Result<T, WallpaperError>;
