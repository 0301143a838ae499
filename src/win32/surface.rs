use std::{ptr, sync::OnceLock};

use windows::{
    core::{w, PCWSTR},
    Win32::{
        Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM},
        Graphics::Gdi::{GetStockObject, BLACK_BRUSH, HBRUSH},
        System::LibraryLoader::GetModuleHandleW,
        UI::WindowsAndMessaging::{
            CreateWindowExW, DefWindowProcW, DestroyWindow, GetWindowLongW, RegisterClassW,
            SetLayeredWindowAttributes, SetParent, SetWindowLongW, SetWindowPos, ShowWindow,
            GWL_STYLE, HWND_BOTTOM, HWND_TOP, LWA_ALPHA, SWP_FRAMECHANGED, SWP_NOACTIVATE,
            SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SWP_SHOWWINDOW, SW_HIDE, WINDOW_EX_STYLE,
            WINDOW_STYLE, WNDCLASSW, WS_CHILD, WS_CLIPCHILDREN, WS_CLIPSIBLINGS, WS_EX_LAYERED,
            WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TRANSPARENT, WS_POPUP,
        },
    },
};

use super::{hwnd, window_id};
use crate::{
    desktop::{Rect, SurfaceHost, WindowId},
    error::{WallpaperError, WallpaperResult},
    info,
};

const SURFACE_CLASS_NAME: PCWSTR = w!("PlanetboyWallpaperSurface");

#[derive(Default)]
pub struct Win32SurfaceHost;

impl SurfaceHost for Win32SurfaceHost {
    fn create(&mut self, rect: Rect) -> WallpaperResult<WindowId> {
        let hinstance = module_instance().map_err(WallpaperError::SurfaceCreation)?;
        ensure_surface_class(hinstance);

        let style = WINDOW_STYLE((WS_POPUP | WS_CLIPSIBLINGS | WS_CLIPCHILDREN).0);
        let ex_style = WINDOW_EX_STYLE(
            (WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW).0,
        );

        let surface = unsafe {
            CreateWindowExW(
                ex_style,
                SURFACE_CLASS_NAME,
                PCWSTR::null(),
                style,
                rect.left,
                rect.top,
                rect.width(),
                rect.height(),
                None,
                None,
                Some(hinstance),
                Some(ptr::null()),
            )
        }
        .map_err(|e| WallpaperError::SurfaceCreation(format!("CreateWindowExW failed: {e:?}")))?;

        // Layered but fully opaque.
        if let Err(e) = unsafe { SetLayeredWindowAttributes(surface, COLORREF(0), 255, LWA_ALPHA) } {
            unsafe {
                let _ = DestroyWindow(surface);
            }
            return Err(WallpaperError::SurfaceCreation(format!(
                "SetLayeredWindowAttributes failed: {e:?}"
            )));
        }

        info!(
            "[WALLPAPER][SURFACE] CreateWindowExW {:?} {}x{}",
            surface,
            rect.width(),
            rect.height()
        );
        Ok(window_id(surface))
    }

    fn set_parent(&mut self, surface: WindowId, parent: WindowId) -> WallpaperResult<()> {
        let surface = hwnd(surface);
        unsafe {
            let style = GetWindowLongW(surface, GWL_STYLE) as u32;
            let child_style = (style & !WS_POPUP.0) | WS_CHILD.0;
            let _ = SetWindowLongW(surface, GWL_STYLE, child_style as i32);

            SetParent(surface, Some(hwnd(parent)))
                .map(|_| ())
                .map_err(|e| WallpaperError::Reparent(format!("SetParent into {parent:?} failed: {e:?}")))
        }
    }

    fn place(&mut self, surface: WindowId, rect: Rect) -> WallpaperResult<()> {
        unsafe {
            SetWindowPos(
                hwnd(surface),
                None,
                rect.left,
                rect.top,
                rect.width(),
                rect.height(),
                SWP_NOACTIVATE | SWP_NOZORDER | SWP_SHOWWINDOW | SWP_FRAMECHANGED,
            )
        }
        .map_err(|e| WallpaperError::Reparent(format!("SetWindowPos(place) failed: {e:?}")))
    }

    fn send_to_bottom(&mut self, window: WindowId) -> WallpaperResult<()> {
        reorder(window, HWND_BOTTOM)
    }

    fn bring_to_top(&mut self, window: WindowId) -> WallpaperResult<()> {
        reorder(window, HWND_TOP)
    }

    fn hide(&mut self, surface: WindowId) {
        unsafe {
            let _ = ShowWindow(hwnd(surface), SW_HIDE);
        }
    }

    fn destroy(&mut self, surface: WindowId) {
        unsafe {
            let _ = DestroyWindow(hwnd(surface));
        }
    }
}

fn reorder(window: WindowId, insert_after: HWND) -> WallpaperResult<()> {
    unsafe {
        SetWindowPos(
            hwnd(window),
            Some(insert_after),
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        )
    }
    .map_err(|e| WallpaperError::Reparent(format!("SetWindowPos(z-order) on {window:?} failed: {e:?}")))
}

fn module_instance() -> Result<HINSTANCE, String> {
    unsafe {
        GetModuleHandleW(None)
            .map(|h| HINSTANCE(h.0))
            .map_err(|e| format!("GetModuleHandleW failed: {e:?}"))
    }
}

fn ensure_surface_class(hinstance: HINSTANCE) {
    static CLASS_ONCE: OnceLock<()> = OnceLock::new();
    CLASS_ONCE.get_or_init(|| {
        let wc = WNDCLASSW {
            lpfnWndProc: Some(surface_window_proc),
            hInstance: hinstance,
            lpszClassName: SURFACE_CLASS_NAME,
            hbrBackground: HBRUSH(unsafe { GetStockObject(BLACK_BRUSH) }.0),
            ..Default::default()
        };
        unsafe {
            let _ = RegisterClassW(&wc);
        }
    });
}

unsafe extern "system" fn surface_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, wparam, lparam)
}
