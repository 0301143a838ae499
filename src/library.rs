//! JSON catalog of the wallpapers the user has imported.
//!
//! Imported files are copied into the data directory; the catalog remembers
//! them together with the wallpaper that is currently applied.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{WallpaperError, WallpaperResult},
    info, warn,
};

pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov", "m4v", "wmv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperKind {
    Image,
    Gif,
    Video,
}

impl WallpaperKind {
    pub fn classify(path: &Path, video_extensions: &[String]) -> Self {
        if is_video_file(path, video_extensions) {
            WallpaperKind::Video
        } else if extension_of(path).as_deref() == Some("gif") {
            WallpaperKind::Gif
        } else {
            WallpaperKind::Image
        }
    }
}

/// Extension-based classification; `video_extensions` are lowercase, no dot.
pub fn is_video_file(path: &Path, video_extensions: &[String]) -> bool {
    extension_of(path).is_some_and(|ext| video_extensions.iter().any(|v| *v == ext))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WallpaperKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub auto_change: bool,
    /// Seconds.
    pub change_interval: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            auto_change: false,
            change_interval: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub wallpapers: Vec<CatalogEntry>,
    pub current_wallpaper: Option<PathBuf>,
    pub settings: CatalogSettings,
}

pub struct Library {
    dir: PathBuf,
    file: PathBuf,
    catalog: Catalog,
    video_extensions: Vec<String>,
}

impl Library {
    pub const FILE_NAME: &'static str = "library.json";

    pub fn open(dir: &Path, video_extensions: Vec<String>) -> WallpaperResult<Self> {
        fs::create_dir_all(dir)?;
        let file = dir.join(Self::FILE_NAME);
        let catalog = load_catalog(&file);
        Ok(Self {
            dir: dir.to_path_buf(),
            file,
            catalog,
            video_extensions,
        })
    }

    /// Copies `source` into the library directory and records it. Name
    /// collisions get a ` (n)` suffix. Returns the stored path.
    pub fn add(&mut self, source: &Path) -> WallpaperResult<PathBuf> {
        if !source.is_file() {
            return Err(WallpaperError::MissingFile(source.to_path_buf()));
        }

        let target = self.free_target(source);
        fs::copy(source, &target)?;
        info!("[WALLPAPER][LIBRARY] imported {} -> {}", source.display(), target.display());

        if !self.catalog.wallpapers.iter().any(|w| w.path == target) {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.catalog.wallpapers.push(CatalogEntry {
                kind: WallpaperKind::classify(&target, &self.video_extensions),
                path: target.clone(),
                name,
            });
            self.save()?;
        }
        Ok(target)
    }

    /// Forgets `path` and deletes the stored file. Returns false when the
    /// catalog does not know it.
    pub fn remove(&mut self, path: &Path) -> WallpaperResult<bool> {
        let Some(index) = self.catalog.wallpapers.iter().position(|w| w.path == path) else {
            return Ok(false);
        };
        self.catalog.wallpapers.remove(index);
        if self.catalog.current_wallpaper.as_deref() == Some(path) {
            self.catalog.current_wallpaper = None;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }
        self.save()?;
        Ok(true)
    }

    /// Known wallpapers, dropping entries whose files have disappeared.
    pub fn list(&mut self) -> WallpaperResult<&[CatalogEntry]> {
        let before = self.catalog.wallpapers.len();
        self.catalog.wallpapers.retain(|w| w.path.exists());
        if self.catalog.wallpapers.len() != before {
            warn!(
                "[WALLPAPER][LIBRARY] pruned {} missing wallpaper(s)",
                before - self.catalog.wallpapers.len()
            );
        }
        self.save()?;
        Ok(&self.catalog.wallpapers)
    }

    pub fn current(&self) -> Option<&CatalogEntry> {
        let current = self.catalog.current_wallpaper.as_deref()?;
        self.catalog.wallpapers.iter().find(|w| w.path == current)
    }

    pub fn set_current(&mut self, path: &Path) -> WallpaperResult<()> {
        self.catalog.current_wallpaper = Some(path.to_path_buf());
        self.save()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn free_target(&self, source: &Path) -> PathBuf {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wallpaper".to_string());
        let mut target = self.dir.join(&file_name);

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1;
        while target.exists() {
            target = self.dir.join(format!("{stem} ({counter}){ext}"));
            counter += 1;
        }
        target
    }

    fn save(&self) -> WallpaperResult<()> {
        let raw = serde_json::to_string_pretty(&self.catalog)?;
        fs::write(&self.file, raw)?;
        Ok(())
    }
}

fn load_catalog(file: &Path) -> Catalog {
    let Ok(raw) = fs::read_to_string(file) else {
        return Catalog::default();
    };
    match serde_json::from_str::<Catalog>(&raw) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(
                "[WALLPAPER][LIBRARY] {} is unreadable ({}); starting with an empty catalog",
                file.display(),
                e
            );
            Catalog::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert!(is_video_file(Path::new("C:/clips/Intro.MP4"), &exts()));
        assert!(!is_video_file(Path::new("photo.jpg"), &exts()));
        assert!(!is_video_file(Path::new("noext"), &exts()));
        assert_eq!(WallpaperKind::classify(Path::new("a.GIF"), &exts()), WallpaperKind::Gif);
        assert_eq!(WallpaperKind::classify(Path::new("a.webm"), &exts()), WallpaperKind::Video);
        assert_eq!(WallpaperKind::classify(Path::new("a.png"), &exts()), WallpaperKind::Image);
    }

    #[test]
    fn add_copies_and_suffixes_duplicates() {
        let source_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("sea.mp4");
        fs::write(&source, b"not really a video").unwrap();

        let mut library = Library::open(data_dir.path(), exts()).unwrap();
        let first = library.add(&source).unwrap();
        let second = library.add(&source).unwrap();

        assert_eq!(first, data_dir.path().join("sea.mp4"));
        assert_eq!(second, data_dir.path().join("sea (1).mp4"));
        let entries = library.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "sea (1).mp4");
        assert_eq!(entries[0].kind, WallpaperKind::Video);
    }

    #[test]
    fn add_rejects_missing_source() {
        let data_dir = tempfile::tempdir().unwrap();
        let mut library = Library::open(data_dir.path(), exts()).unwrap();
        assert!(library.add(Path::new("does-not-exist.png")).is_err());
    }

    #[test]
    fn catalog_round_trips_through_disk() {
        let source_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("forest.png");
        fs::write(&source, b"png").unwrap();

        let stored = {
            let mut library = Library::open(data_dir.path(), exts()).unwrap();
            let stored = library.add(&source).unwrap();
            library.set_current(&stored).unwrap();
            stored
        };

        let library = Library::open(data_dir.path(), exts()).unwrap();
        assert_eq!(library.current().map(|e| e.path.clone()), Some(stored));
        assert_eq!(library.catalog().settings.change_interval, 3600);
    }

    #[test]
    fn remove_clears_current_and_deletes_file() {
        let source_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("night.jpg");
        fs::write(&source, b"jpg").unwrap();

        let mut library = Library::open(data_dir.path(), exts()).unwrap();
        let stored = library.add(&source).unwrap();
        library.set_current(&stored).unwrap();

        assert!(library.remove(&stored).unwrap());
        assert!(!stored.exists());
        assert!(library.current().is_none());
        assert!(!library.remove(&stored).unwrap());
    }

    #[test]
    fn list_prunes_vanished_files() {
        let source_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("dawn.png");
        fs::write(&source, b"png").unwrap();

        let mut library = Library::open(data_dir.path(), exts()).unwrap();
        let stored = library.add(&source).unwrap();
        fs::remove_file(&stored).unwrap();

        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_or_partial_catalog_loads_defaults() {
        let data_dir = tempfile::tempdir().unwrap();
        fs::write(data_dir.path().join(Library::FILE_NAME), "{ not json").unwrap();
        let library = Library::open(data_dir.path(), exts()).unwrap();
        assert_eq!(library.catalog(), &Catalog::default());

        fs::write(data_dir.path().join(Library::FILE_NAME), r#"{"wallpapers": []}"#).unwrap();
        let library = Library::open(data_dir.path(), exts()).unwrap();
        assert!(!library.catalog().settings.auto_change);
    }
}
