use super::{DisplaySource, Monitor, MonitorId, Rect};
use crate::warn;

/// Identity given to the stand-in monitor when the OS reports no displays.
pub const SYNTHETIC_MONITOR: MonitorId = MonitorId(0);

/// Fresh snapshot of the connected displays.
///
/// Never empty: if enumeration fails or reports nothing, a single primary
/// monitor covering the primary display's pixel size at (0, 0) is returned so
/// wallpaper setting keeps working on minimal or virtual displays.
pub fn list_monitors(source: &dyn DisplaySource) -> Vec<Monitor> {
    match source.monitors() {
        Ok(monitors) if !monitors.is_empty() => monitors,
        Ok(_) => {
            warn!("[WALLPAPER][MONITORS] Display enumeration returned no monitors; using primary fallback");
            vec![fallback_monitor(source)]
        }
        Err(e) => {
            warn!("[WALLPAPER][MONITORS] {}; using primary fallback", e);
            vec![fallback_monitor(source)]
        }
    }
}

fn fallback_monitor(source: &dyn DisplaySource) -> Monitor {
    let (width, height) = source.primary_size();
    let rect = Rect::new(0, 0, width, height);
    Monitor {
        id: SYNTHETIC_MONITOR,
        rect,
        work_area: rect,
        primary: true,
    }
}
