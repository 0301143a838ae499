use std::time::Duration;

use windows::{
    core::{BOOL, PCWSTR},
    Win32::{
        Foundation::{HWND, LPARAM, RECT, WPARAM},
        UI::WindowsAndMessaging::{
            EnumWindows, FindWindowExW, FindWindowW, GetClassNameW, GetWindowRect, IsWindow,
            SendMessageTimeoutW, SMTO_NORMAL,
        },
    },
};

use super::{hwnd, rect_from, window_id};
use crate::{
    desktop::{shell::WORKER_CLASS, Rect, ShellProbe, WindowId},
    utility::{from_wide, to_wstring},
};

/// Undocumented but stable: asks Progman to create the WorkerW windows.
const SPAWN_WORKER_MESSAGE: u32 = 0x052C;

pub struct Win32Shell;

impl ShellProbe for Win32Shell {
    fn find_top_level(&self, class: &str) -> Option<WindowId> {
        let class = to_wstring(class);
        unsafe { FindWindowW(PCWSTR(class.as_ptr()), PCWSTR::null()) }
            .ok()
            .map(window_id)
    }

    fn find_child(&self, parent: WindowId, class: &str) -> Option<WindowId> {
        let class = to_wstring(class);
        unsafe {
            FindWindowExW(
                Some(hwnd(parent)),
                None,
                PCWSTR(class.as_ptr()),
                PCWSTR::null(),
            )
        }
        .ok()
        .map(window_id)
    }

    fn top_level_windows(&self) -> Vec<WindowId> {
        unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
            let out = &mut *(lparam.0 as *mut Vec<WindowId>);
            out.push(window_id(hwnd));
            BOOL(1)
        }

        let mut windows = Vec::<WindowId>::new();
        unsafe {
            let _ = EnumWindows(
                Some(enum_proc),
                LPARAM((&mut windows as *mut Vec<WindowId>) as isize),
            );
        }
        windows
    }

    fn class_name(&self, window: WindowId) -> Option<String> {
        let mut buf = [0u16; 256];
        let len = unsafe { GetClassNameW(hwnd(window), &mut buf) };
        if len <= 0 {
            return None;
        }
        Some(from_wide(&buf[..len as usize]))
    }

    fn sibling_worker(&self, host: WindowId) -> Option<WindowId> {
        let class = to_wstring(WORKER_CLASS);
        unsafe {
            FindWindowExW(
                None,
                Some(hwnd(host)),
                PCWSTR(class.as_ptr()),
                PCWSTR::null(),
            )
        }
        .ok()
        .map(window_id)
    }

    fn window_rect(&self, window: WindowId) -> Option<Rect> {
        unsafe {
            let mut rect = RECT::default();
            if GetWindowRect(hwnd(window), &mut rect).is_ok() {
                Some(rect_from(rect))
            } else {
                None
            }
        }
    }

    fn is_window(&self, window: WindowId) -> bool {
        unsafe { IsWindow(Some(hwnd(window))).as_bool() }
    }

    fn spawn_workers(&self, progman: WindowId, timeout: Duration) -> bool {
        let mut spawn_result = 0usize;
        let sent = unsafe {
            SendMessageTimeoutW(
                hwnd(progman),
                SPAWN_WORKER_MESSAGE,
                WPARAM(0),
                LPARAM(0),
                SMTO_NORMAL,
                timeout.as_millis().min(u32::MAX as u128) as u32,
                Some(&mut spawn_result),
            )
        };
        sent.0 != 0
    }
}
