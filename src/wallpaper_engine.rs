//! Entry point for changing the desktop wallpaper.
//!
//! A video wallpaper runs the whole locate, acquire and start sequence from
//! scratch on every call. Failures on one monitor are recorded in the returned
//! [`ApplyReport`] and never abort the others. Only a missing file is rejected
//! up front, before any shell or engine call.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    data_loaders::config::AppSettings,
    desktop::{
        monitor::list_monitors,
        shell::{locate, ShellTopology},
        surface::SurfaceRegistry,
        DisplaySource, Monitor, MonitorId, Rect, ShellProbe, StaticWallpaperSetter, SurfaceHost,
    },
    error::{WallpaperError, WallpaperResult},
    info,
    library::WallpaperKind,
    playback::{MediaEngine, PlaybackCoordinator},
    warn,
};

/// The OS-facing collaborators the service drives.
pub struct Desktop {
    pub displays: Box<dyn DisplaySource>,
    pub shell: Box<dyn ShellProbe>,
    pub host: Box<dyn SurfaceHost>,
    pub static_setter: Box<dyn StaticWallpaperSetter>,
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub video_extensions: Vec<String>,
    pub spawn_timeout: Duration,
    pub loop_hint: bool,
}

impl ServiceOptions {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            video_extensions: settings.library.video_extensions.clone(),
            spawn_timeout: Duration::from_millis(settings.runtime.spawn_timeout_ms),
            loop_hint: settings.playback.loop_hint,
        }
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStatus {
    Playing,
    /// The shell offered no container for this monitor.
    NoContainer,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub monitor: Monitor,
    pub status: MonitorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub kind: WallpaperKind,
    /// Detected shell layout; `None` for static wallpapers or when no
    /// desktop window could be found.
    pub topology: Option<&'static str>,
    pub monitors: Vec<MonitorOutcome>,
}

impl ApplyReport {
    pub fn playing(&self) -> usize {
        self.monitors
            .iter()
            .filter(|m| m.status == MonitorStatus::Playing)
            .count()
    }

    /// Static wallpapers succeed once applied; videos need at least one monitor.
    pub fn succeeded(&self) -> bool {
        self.kind != WallpaperKind::Video || self.playing() > 0
    }
}

pub struct WallpaperService {
    desktop: Desktop,
    surfaces: SurfaceRegistry,
    playback: PlaybackCoordinator,
    options: ServiceOptions,
    current_video: Option<PathBuf>,
    last_layout: Vec<(MonitorId, Rect)>,
}

impl WallpaperService {
    pub fn new(desktop: Desktop, engine: Box<dyn MediaEngine>, options: ServiceOptions) -> Self {
        let playback = PlaybackCoordinator::new(engine, options.loop_hint);
        Self {
            desktop,
            surfaces: SurfaceRegistry::new(),
            playback,
            options,
            current_video: None,
            last_layout: Vec::new(),
        }
    }

    pub fn set_wallpaper(&mut self, path: &Path) -> WallpaperResult<ApplyReport> {
        if !path.is_file() {
            warn!("[WALLPAPER][SERVICE] rejecting '{}': file not found", path.display());
            return Err(WallpaperError::MissingFile(path.to_path_buf()));
        }

        let kind = WallpaperKind::classify(path, &self.options.video_extensions);
        match kind {
            WallpaperKind::Video => Ok(self.apply_video(path)),
            WallpaperKind::Image | WallpaperKind::Gif => {
                self.stop_all();
                self.desktop.static_setter.apply(path)?;
                info!("[WALLPAPER][SERVICE] static wallpaper set to '{}'", path.display());
                Ok(ApplyReport {
                    kind,
                    topology: None,
                    monitors: Vec::new(),
                })
            }
        }
    }

    /// Stops every video session and releases every surface.
    pub fn stop(&mut self) {
        self.stop_all();
    }

    /// Restarts sessions whose end-of-stream fired. Call from the owning loop.
    pub fn pump(&mut self) -> usize {
        self.playback.pump()
    }

    /// True when a running video wallpaper no longer matches the desktop: the
    /// monitor layout changed or the shell destroyed a surface's container.
    pub fn needs_refresh(&self) -> bool {
        if self.current_video.is_none() {
            return false;
        }

        let layout = layout_fingerprint(&list_monitors(self.desktop.displays.as_ref()));
        if layout != self.last_layout {
            info!("[WALLPAPER][SERVICE] monitor layout changed");
            return true;
        }

        let shell = self.desktop.shell.as_ref();
        if let Some(parent) = self.surfaces.parents().find(|p| !shell.is_window(*p)) {
            info!("[WALLPAPER][SERVICE] container {:?} is gone", parent);
            return true;
        }
        false
    }

    /// Re-applies the current video wallpaper, if any.
    pub fn refresh(&mut self) -> WallpaperResult<Option<ApplyReport>> {
        match self.current_video.clone() {
            Some(path) => self.set_wallpaper(&path).map(Some),
            None => Ok(None),
        }
    }

    pub fn current_video(&self) -> Option<&Path> {
        self.current_video.as_deref()
    }

    pub fn is_any_playing(&self) -> bool {
        self.playback.is_any_playing()
    }

    pub fn monitors(&self) -> Vec<Monitor> {
        list_monitors(self.desktop.displays.as_ref())
    }

    pub fn detect_shell(&self) -> WallpaperResult<ShellTopology> {
        locate(self.desktop.shell.as_ref(), self.options.spawn_timeout)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn session_count(&self) -> usize {
        self.playback.session_count()
    }

    fn apply_video(&mut self, path: &Path) -> ApplyReport {
        // Sessions always go; surfaces survive for reuse unless stale.
        self.playback.stop_all();

        let monitors = list_monitors(self.desktop.displays.as_ref());
        self.release_stale_surfaces(&monitors);
        self.last_layout = layout_fingerprint(&monitors);
        self.current_video = Some(path.to_path_buf());

        let topology = match locate(self.desktop.shell.as_ref(), self.options.spawn_timeout) {
            Ok(topology) => topology,
            Err(e) => {
                warn!("[WALLPAPER][SERVICE] no desktop to attach to: {}", e);
                self.surfaces.release_all(self.desktop.host.as_mut());
                return ApplyReport {
                    kind: WallpaperKind::Video,
                    topology: None,
                    monitors: monitors
                        .into_iter()
                        .map(|monitor| MonitorOutcome {
                            monitor,
                            status: MonitorStatus::NoContainer,
                        })
                        .collect(),
                };
            }
        };
        info!(
            "[WALLPAPER][SERVICE] {} shell, {} monitor(s), playing '{}'",
            topology.name(),
            monitors.len(),
            path.display()
        );

        let outcomes = monitors
            .iter()
            .enumerate()
            .map(|(index, monitor)| MonitorOutcome {
                monitor: *monitor,
                status: self.start_on(&topology, monitor, index, path),
            })
            .collect();

        ApplyReport {
            kind: WallpaperKind::Video,
            topology: Some(topology.name()),
            monitors: outcomes,
        }
    }

    fn start_on(
        &mut self,
        topology: &ShellTopology,
        monitor: &Monitor,
        index: usize,
        path: &Path,
    ) -> MonitorStatus {
        let Some(target) = topology.target_for(monitor, index) else {
            warn!("[WALLPAPER][SERVICE] no container for monitor {:?}", monitor.id);
            self.surfaces.release(self.desktop.host.as_mut(), monitor.id);
            return MonitorStatus::NoContainer;
        };

        let surface = match self.surfaces.acquire(
            self.desktop.host.as_mut(),
            self.desktop.shell.as_ref(),
            monitor,
            &target,
        ) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("[WALLPAPER][SERVICE] monitor {:?}: {}", monitor.id, e);
                return MonitorStatus::Failed(e.to_string());
            }
        };

        match self.playback.start(monitor.id, surface, path) {
            Ok(()) => MonitorStatus::Playing,
            Err(e) => {
                warn!("[WALLPAPER][SERVICE] monitor {:?}: {}", monitor.id, e);
                self.surfaces.release(self.desktop.host.as_mut(), monitor.id);
                MonitorStatus::Failed(e.to_string())
            }
        }
    }

    /// Drops surfaces for monitors that disappeared or whose container the
    /// shell destroyed; a destroyed parent takes its children with it.
    fn release_stale_surfaces(&mut self, monitors: &[Monitor]) {
        let shell = self.desktop.shell.as_ref();
        let stale: Vec<MonitorId> = self
            .surfaces
            .monitors()
            .filter(|id| {
                let present = monitors.iter().any(|m| m.id == *id);
                let parent_alive = self
                    .surfaces
                    .get(*id)
                    .and_then(|s| s.parent)
                    .is_some_and(|p| shell.is_window(p));
                !present || !parent_alive
            })
            .collect();

        for monitor in stale {
            self.surfaces.release(self.desktop.host.as_mut(), monitor);
        }
    }

    fn stop_all(&mut self) {
        self.playback.stop_all();
        self.surfaces.release_all(self.desktop.host.as_mut());
        self.current_video = None;
        self.last_layout.clear();
    }
}

impl Drop for WallpaperService {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn layout_fingerprint(monitors: &[Monitor]) -> Vec<(MonitorId, Rect)> {
    let mut layout: Vec<(MonitorId, Rect)> = monitors.iter().map(|m| (m.id, m.rect)).collect();
    layout.sort_by_key(|(id, _)| *id);
    layout
}
