//! Win32 and libVLC implementations of the desktop and playback traits.

pub mod display;
pub mod pipe;
pub mod shell;
pub mod surface;
pub mod vlc_engine;
pub mod wallpaper;

use std::{
    ffi::c_void,
    sync::atomic::{AtomicBool, Ordering},
};

use windows::{
    core::BOOL,
    Win32::{
        Foundation::{HWND, RECT},
        System::Console::SetConsoleCtrlHandler,
        UI::HiDpi::{SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2},
    },
};

use crate::{
    desktop::{Rect, WindowId},
    wallpaper_engine::Desktop,
    warn,
};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn native_desktop() -> Desktop {
    Desktop {
        displays: Box::new(display::Win32Displays),
        shell: Box::new(shell::Win32Shell),
        host: Box::new(surface::Win32SurfaceHost::default()),
        static_setter: Box::new(wallpaper::Win32StaticWallpaper),
    }
}

/// Monitor rectangles and window positions are only consistent with each
/// other in physical pixels.
pub fn enable_per_monitor_dpi_awareness() {
    unsafe {
        if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2).is_err() {
            warn!("[WALLPAPER] Failed to set process DPI awareness to PerMonitorV2; monitor sizes may be scaled");
        }
    }
}

unsafe extern "system" fn ctrl_handler(_ctrl_type: u32) -> BOOL {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
    BOOL(1)
}

pub fn install_ctrl_c_handler() {
    unsafe {
        if SetConsoleCtrlHandler(Some(ctrl_handler), true).is_err() {
            warn!("[WALLPAPER] Failed to install console control handler");
        }
    }
}

pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

pub(crate) fn hwnd(id: WindowId) -> HWND {
    HWND(id.0 as *mut c_void)
}

pub(crate) fn window_id(hwnd: HWND) -> WindowId {
    WindowId(hwnd.0 as isize)
}

pub(crate) fn rect_from(rect: RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right, rect.bottom)
}
