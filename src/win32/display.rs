use std::mem;

use windows::{
    core::BOOL,
    Win32::{
        Foundation::{LPARAM, RECT},
        Graphics::Gdi::{EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO},
        UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN},
    },
};

use super::rect_from;
use crate::{
    desktop::{DisplaySource, Monitor, MonitorId},
    error::{WallpaperError, WallpaperResult},
};

const MONITORINFOF_PRIMARY: u32 = 1;

pub struct Win32Displays;

impl DisplaySource for Win32Displays {
    fn monitors(&self) -> WallpaperResult<Vec<Monitor>> {
        unsafe extern "system" fn enum_monitor_proc(
            monitor: HMONITOR,
            _hdc: HDC,
            _rect: *mut RECT,
            lparam: LPARAM,
        ) -> BOOL {
            let vec = &mut *(lparam.0 as *mut Vec<Monitor>);

            let mut info: MONITORINFO = mem::zeroed();
            info.cbSize = mem::size_of::<MONITORINFO>() as u32;

            if GetMonitorInfoW(monitor, &mut info).as_bool() {
                vec.push(Monitor {
                    id: MonitorId(monitor.0 as isize),
                    rect: rect_from(info.rcMonitor),
                    work_area: rect_from(info.rcWork),
                    primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
                });
            }

            BOOL(1)
        }

        let mut monitors = Vec::<Monitor>::new();
        let ok = unsafe {
            EnumDisplayMonitors(
                None,
                None,
                Some(enum_monitor_proc),
                LPARAM((&mut monitors as *mut Vec<Monitor>) as isize),
            )
        };
        if !ok.as_bool() {
            return Err(WallpaperError::DisplayEnumeration(
                "EnumDisplayMonitors failed".to_string(),
            ));
        }
        Ok(monitors)
    }

    fn primary_size(&self) -> (i32, i32) {
        unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
    }
}
