use std::collections::HashMap;

use super::{
    shell::AttachTarget, Monitor, MonitorId, Rect, ShellProbe, SurfaceHost, WindowId,
};
use crate::{error::WallpaperResult, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperSurface {
    pub handle: WindowId,
    pub parent: Option<WindowId>,
    /// Position within the parent's client area.
    pub geometry: Rect,
    pub visible: bool,
}

/// One borderless surface per monitor, keyed by monitor handle.
#[derive(Default)]
pub struct SurfaceRegistry {
    surfaces: HashMap<MonitorId, WallpaperSurface>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the surface for `monitor`, creating it on first use, and
    /// (re)attaches it behind the icon layer of `target`.
    ///
    /// Reparenting and z-ordering run on every call: the shell silently resets
    /// the order of its children whenever it recreates the icon windows.
    pub fn acquire(
        &mut self,
        host: &mut dyn SurfaceHost,
        probe: &dyn ShellProbe,
        monitor: &Monitor,
        target: &AttachTarget,
    ) -> WallpaperResult<WindowId> {
        let created = !self.surfaces.contains_key(&monitor.id);
        let handle = match self.surfaces.get(&monitor.id) {
            Some(surface) => surface.handle,
            None => {
                let handle = host.create(monitor.rect)?;
                info!(
                    "[WALLPAPER][SURFACE] created {:?} for monitor {:?}",
                    handle,
                    monitor.id
                );
                handle
            }
        };

        let geometry = match attach(host, probe, handle, monitor, target) {
            Ok(geometry) => geometry,
            Err(e) => {
                if created {
                    host.destroy(handle);
                }
                return Err(e);
            }
        };

        self.surfaces.insert(
            monitor.id,
            WallpaperSurface {
                handle,
                parent: Some(target.parent()),
                geometry,
                visible: true,
            },
        );
        Ok(handle)
    }

    pub fn release(&mut self, host: &mut dyn SurfaceHost, monitor: MonitorId) {
        if let Some(surface) = self.surfaces.remove(&monitor) {
            host.hide(surface.handle);
            host.destroy(surface.handle);
            info!(
                "[WALLPAPER][SURFACE] released {:?} for monitor {:?}",
                surface.handle,
                monitor
            );
        }
    }

    pub fn release_all(&mut self, host: &mut dyn SurfaceHost) {
        let monitors: Vec<MonitorId> = self.surfaces.keys().copied().collect();
        for monitor in monitors {
            self.release(host, monitor);
        }
    }

    pub fn get(&self, monitor: MonitorId) -> Option<&WallpaperSurface> {
        self.surfaces.get(&monitor)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn monitors(&self) -> impl Iterator<Item = MonitorId> + '_ {
        self.surfaces.keys().copied()
    }

    pub fn parents(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.surfaces.values().filter_map(|s| s.parent)
    }
}

/// Reparents `surface`, sizes it to the monitor in parent coordinates and
/// orders it behind the icons. Z-order must come strictly after reparenting.
fn attach(
    host: &mut dyn SurfaceHost,
    probe: &dyn ShellProbe,
    surface: WindowId,
    monitor: &Monitor,
    target: &AttachTarget,
) -> WallpaperResult<Rect> {
    let parent = target.parent();
    host.set_parent(surface, parent)?;

    let origin = probe
        .window_rect(parent)
        .map(|r| (r.left, r.top))
        .unwrap_or((0, 0));
    let geometry = monitor.rect.relative_to(origin);
    host.place(surface, geometry)?;

    match *target {
        AttachTarget::Legacy { icon_list, .. } => {
            host.send_to_bottom(surface)?;
            if let Some(icons) = icon_list {
                if let Err(e) = host.bring_to_top(icons) {
                    warn!("[WALLPAPER][SURFACE] could not raise icon list {:?}: {}", icons, e);
                }
            }
        }
        AttachTarget::Modern {
            icon_view, worker, ..
        } => {
            host.send_to_bottom(surface)?;
            if let Some(icons) = icon_view {
                if let Err(e) = host.bring_to_top(icons) {
                    warn!("[WALLPAPER][SURFACE] could not raise icon view {:?}: {}", icons, e);
                }
            }
            if let Some(worker) = worker {
                host.send_to_bottom(worker)?;
            }
        }
    }

    warn!(
        "[WALLPAPER][SURFACE] {:?} attached to {:?} at [l={},t={},r={},b={}]",
        surface,
        parent,
        geometry.left,
        geometry.top,
        geometry.right,
        geometry.bottom
    );
    Ok(geometry)
}
