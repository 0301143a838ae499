use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{imageops::FilterType, DynamicImage, RgbaImage};

use crate::{
    error::{WallpaperError, WallpaperResult},
    library::is_video_file,
    warn,
};

pub trait FrameDecoder {
    fn first_frame(&self, path: &Path) -> WallpaperResult<DynamicImage>;
}

/// Decodes still images (and the first frame of a GIF) with the `image` crate.
pub struct StillImageDecoder;

impl FrameDecoder for StillImageDecoder {
    fn first_frame(&self, path: &Path) -> WallpaperResult<DynamicImage> {
        image::open(path).map_err(|e| WallpaperError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Video decoding needs libVLC, which is only wired up on Windows.
#[cfg(not(windows))]
pub struct NoVideoDecoder;

#[cfg(not(windows))]
impl FrameDecoder for NoVideoDecoder {
    fn first_frame(&self, _path: &Path) -> WallpaperResult<DynamicImage> {
        Err(WallpaperError::UnsupportedPlatform)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThumbnailKey {
    path: PathBuf,
    size: Option<(u32, u32)>,
}

/// Preview images memoized by (path, size). Only successful decodes are kept.
pub struct ThumbnailCache {
    video: Box<dyn FrameDecoder>,
    still: Box<dyn FrameDecoder>,
    video_extensions: Vec<String>,
    entries: HashMap<ThumbnailKey, Arc<RgbaImage>>,
}

impl ThumbnailCache {
    pub fn new(video: Box<dyn FrameDecoder>, video_extensions: Vec<String>) -> Self {
        Self {
            video,
            still: Box::new(StillImageDecoder),
            video_extensions,
            entries: HashMap::new(),
        }
    }

    /// First frame of `path`, scaled to fit within `size` with its aspect
    /// ratio kept. Decoded once per distinct (path, size).
    pub fn get_cached_thumbnail(
        &mut self,
        path: &Path,
        size: Option<(u32, u32)>,
    ) -> Option<Arc<RgbaImage>> {
        let key = ThumbnailKey {
            path: path.to_path_buf(),
            size,
        };
        if let Some(hit) = self.entries.get(&key) {
            return Some(Arc::clone(hit));
        }

        let decoder = if is_video_file(path, &self.video_extensions) {
            &self.video
        } else {
            &self.still
        };
        let frame = match decoder.first_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[WALLPAPER][THUMBNAIL] {}", e);
                return None;
            }
        };

        let thumbnail = Arc::new(scale_to_fit(frame, size));
        self.entries.insert(key, Arc::clone(&thumbnail));
        Some(thumbnail)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn scale_to_fit(frame: DynamicImage, size: Option<(u32, u32)>) -> RgbaImage {
    let Some((target_w, target_h)) = size else {
        return frame.to_rgba8();
    };
    let (w, h) = fit_within(frame.width(), frame.height(), target_w, target_h);
    frame.resize_exact(w, h, FilterType::Triangle).to_rgba8()
}

fn fit_within(width: u32, height: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (target_w.max(1), target_h.max(1));
    }
    let (w, h, tw, th) = (width as u64, height as u64, target_w as u64, target_h as u64);
    // scale = min(tw / w, th / h), kept in integers
    let (new_w, new_h) = if tw * h <= th * w {
        (tw, h * tw / w)
    } else {
        (w * th / h, th)
    };
    ((new_w as u32).max(1), (new_h as u32).max(1))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct CountingDecoder {
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl FrameDecoder for CountingDecoder {
        fn first_frame(&self, path: &Path) -> WallpaperResult<DynamicImage> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(WallpaperError::Decode {
                    path: path.to_path_buf(),
                    reason: "no video stream".into(),
                });
            }
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(1920, 1080)))
        }
    }

    fn cache(fail: bool) -> (ThumbnailCache, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let decoder = CountingDecoder {
            calls: Rc::clone(&calls),
            fail,
        };
        (ThumbnailCache::new(Box::new(decoder), vec!["mp4".into()]), calls)
    }

    #[test]
    fn identical_requests_share_one_decode() {
        let (mut cache, calls) = cache(false);
        let first = cache
            .get_cached_thumbnail(Path::new("clip.mp4"), Some((250, 120)))
            .unwrap();
        let second = cache
            .get_cached_thumbnail(Path::new("clip.mp4"), Some((250, 120)))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn sizes_are_cached_separately() {
        let (mut cache, calls) = cache(false);
        cache.get_cached_thumbnail(Path::new("clip.mp4"), Some((250, 120)));
        cache.get_cached_thumbnail(Path::new("clip.mp4"), Some((500, 240)));
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn thumbnail_keeps_aspect_ratio() {
        let (mut cache, _) = cache(false);
        let thumb = cache
            .get_cached_thumbnail(Path::new("clip.mp4"), Some((250, 120)))
            .unwrap();
        // 1920x1080 limited by height: 120 / 1080
        assert_eq!(thumb.dimensions(), (213, 120));
    }

    #[test]
    fn failed_decodes_are_not_cached() {
        let (mut cache, calls) = cache(true);
        assert!(cache.get_cached_thumbnail(Path::new("broken.mp4"), None).is_none());
        assert!(cache.get_cached_thumbnail(Path::new("broken.mp4"), None).is_none());
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn still_images_decode_without_the_video_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbaImage::new(40, 20).save(&path).unwrap();

        let (mut cache, calls) = cache(false);
        let thumb = cache.get_cached_thumbnail(&path, Some((10, 10))).unwrap();
        assert_eq!(thumb.dimensions(), (10, 5));
        assert_eq!(calls.get(), 0);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
