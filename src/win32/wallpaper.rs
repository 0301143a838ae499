use std::{ffi::c_void, path::Path};

use windows::Win32::UI::WindowsAndMessaging::{
    SystemParametersInfoW, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER,
};

use crate::{
    desktop::StaticWallpaperSetter,
    error::{WallpaperError, WallpaperResult},
    utility::to_wstring,
};

/// Static images go through the system wallpaper setting.
pub struct Win32StaticWallpaper;

impl StaticWallpaperSetter for Win32StaticWallpaper {
    fn apply(&mut self, path: &Path) -> WallpaperResult<()> {
        let absolute = path.canonicalize()?;
        let absolute = absolute.to_string_lossy();
        // SystemParametersInfoW rejects verbatim paths.
        let plain = absolute.strip_prefix(r"\\?\").unwrap_or(&*absolute);
        let mut wide = to_wstring(plain);
        unsafe {
            SystemParametersInfoW(
                SPI_SETDESKWALLPAPER,
                0,
                Some(wide.as_mut_ptr() as *mut c_void),
                SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
            )
        }
        .map_err(|e| WallpaperError::StaticWallpaper(format!("SystemParametersInfoW failed: {e:?}")))
    }
}
