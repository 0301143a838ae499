//! Platform-neutral view of the Windows desktop.
//!
//! Everything that touches the shell window tree, the display configuration or
//! native surfaces goes through the traits below. The Win32 implementations live
//! in `crate::win32`; tests drive the same code with in-memory fakes.

pub mod monitor;
pub mod shell;
pub mod surface;

#[cfg(test)]
pub mod fake;

use std::{path::Path, time::Duration};

use crate::error::WallpaperResult;

/// Opaque native window handle (`HWND` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

/// Opaque display handle (`HMONITOR` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub isize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn contains(&self, point: (i32, i32)) -> bool {
        point.0 >= self.left && point.0 < self.right && point.1 >= self.top && point.1 < self.bottom
    }

    /// Re-expresses this rectangle relative to `origin`.
    pub fn relative_to(&self, origin: (i32, i32)) -> Rect {
        Rect {
            left: self.left - origin.0,
            top: self.top - origin.1,
            right: self.right - origin.0,
            bottom: self.bottom - origin.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub id: MonitorId,
    pub rect: Rect,
    pub work_area: Rect,
    pub primary: bool,
}

pub trait DisplaySource {
    fn monitors(&self) -> WallpaperResult<Vec<Monitor>>;

    /// Pixel size of the primary display as reported by the system metrics.
    fn primary_size(&self) -> (i32, i32);
}

/// Read-only queries against the shell's window tree, plus the one benign
/// message that makes the shell create its worker windows.
pub trait ShellProbe {
    fn find_top_level(&self, class: &str) -> Option<WindowId>;

    fn find_child(&self, parent: WindowId, class: &str) -> Option<WindowId>;

    /// Top-level windows in z-order, front to back.
    fn top_level_windows(&self) -> Vec<WindowId>;

    fn class_name(&self, window: WindowId) -> Option<String>;

    /// First top-level `WorkerW` that follows `host` in z-order.
    fn sibling_worker(&self, host: WindowId) -> Option<WindowId>;

    /// Screen rectangle of `window`.
    fn window_rect(&self, window: WindowId) -> Option<Rect>;

    fn is_window(&self, window: WindowId) -> bool;

    /// Sends the shell-internal 0x052C message to Progman. Returns false when
    /// the message timed out or failed.
    fn spawn_workers(&self, progman: WindowId, timeout: Duration) -> bool;
}

/// Native surface primitives. Ordering between these calls is decided by
/// `surface::SurfaceRegistry`, never by the implementation.
pub trait SurfaceHost {
    /// Creates a hidden, borderless, click-through, non-activating layered
    /// surface covering `rect` in screen coordinates.
    fn create(&mut self, rect: Rect) -> WallpaperResult<WindowId>;

    fn set_parent(&mut self, surface: WindowId, parent: WindowId) -> WallpaperResult<()>;

    /// Moves and sizes `surface` within its parent's client area and shows it.
    fn place(&mut self, surface: WindowId, rect: Rect) -> WallpaperResult<()>;

    fn send_to_bottom(&mut self, window: WindowId) -> WallpaperResult<()>;

    fn bring_to_top(&mut self, window: WindowId) -> WallpaperResult<()>;

    fn hide(&mut self, surface: WindowId);

    fn destroy(&mut self, surface: WindowId);
}

pub trait StaticWallpaperSetter {
    /// Applies `path` through the system wallpaper facility, persisting it and
    /// broadcasting the change.
    fn apply(&mut self, path: &Path) -> WallpaperResult<()>;
}
