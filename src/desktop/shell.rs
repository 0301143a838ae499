//! Locates the shell windows that sit directly above the icon layer.
//!
//! Two layouts exist. Before Windows 11 24H2 the shell hosts the icon view
//! (`SHELLDLL_DefView`) in a top-level `WorkerW`, and the wallpaper belongs in
//! the *next* `WorkerW` in z-order. From 24H2 on the icon view is a direct child
//! of Progman, next to at most one generic `WorkerW`.

use std::time::Duration;

use super::{Monitor, Rect, ShellProbe, WindowId};
use crate::{error::{WallpaperError, WallpaperResult}, info, warn};

pub const PROGMAN_CLASS: &str = "Progman";
pub const WORKER_CLASS: &str = "WorkerW";
pub const ICON_VIEW_CLASS: &str = "SHELLDLL_DefView";
pub const ICON_LIST_CLASS: &str = "SysListView32";

/// An icon-hosting `WorkerW` of the legacy layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHost {
    pub host: WindowId,
    pub icon_view: WindowId,
    pub icon_list: Option<WindowId>,
    /// The `WorkerW` following `host` in z-order; this is where surfaces go.
    pub wallpaper_worker: Option<WindowId>,
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellTopology {
    Legacy {
        progman: WindowId,
        hosts: Vec<LegacyHost>,
    },
    Modern {
        progman: WindowId,
        icon_view: Option<WindowId>,
        worker: Option<WindowId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachTarget {
    Legacy {
        parent: WindowId,
        icon_list: Option<WindowId>,
    },
    Modern {
        progman: WindowId,
        parent: WindowId,
        icon_view: Option<WindowId>,
        worker: Option<WindowId>,
    },
}

impl AttachTarget {
    pub fn parent(&self) -> WindowId {
        match self {
            AttachTarget::Legacy { parent, .. } | AttachTarget::Modern { parent, .. } => *parent,
        }
    }
}

impl ShellTopology {
    pub fn name(&self) -> &'static str {
        match self {
            ShellTopology::Legacy { .. } => "legacy",
            ShellTopology::Modern { .. } => "modern",
        }
    }

    /// Container a surface for `monitor` must be reparented into, or `None`
    /// when the layout offers nothing usable for that monitor.
    pub fn target_for(&self, monitor: &Monitor, index: usize) -> Option<AttachTarget> {
        match self {
            ShellTopology::Legacy { hosts, .. } => {
                let center = monitor.rect.center();
                let host = hosts
                    .iter()
                    .find(|h| h.rect.is_some_and(|r| r.contains(center)))
                    .or_else(|| hosts.get(index))
                    .or_else(|| hosts.first())?;

                Some(AttachTarget::Legacy {
                    parent: host.wallpaper_worker?,
                    icon_list: host.icon_list,
                })
            }
            ShellTopology::Modern {
                progman,
                icon_view,
                worker,
            } => Some(AttachTarget::Modern {
                progman: *progman,
                parent: worker.unwrap_or(*progman),
                icon_view: *icon_view,
                worker: *worker,
            }),
        }
    }
}

/// Detects the current shell layout. A pure read of the window tree apart from
/// the idempotent worker-spawn message; nothing is cached between calls.
pub fn locate(probe: &dyn ShellProbe, spawn_timeout: Duration) -> WallpaperResult<ShellTopology> {
    let progman = probe
        .find_top_level(PROGMAN_CLASS)
        .ok_or(WallpaperError::DesktopNotFound(PROGMAN_CLASS))?;
    info!("[WALLPAPER][SHELL] Progman={:?}", progman);

    if !probe.spawn_workers(progman, spawn_timeout) {
        warn!("[WALLPAPER][SHELL] Progman did not answer the worker spawn message in {:?}", spawn_timeout);
    }

    let workers: Vec<WindowId> = probe
        .top_level_windows()
        .into_iter()
        .filter(|w| probe.class_name(*w).as_deref() == Some(WORKER_CLASS))
        .collect();

    let hosts: Vec<LegacyHost> = workers
        .iter()
        .filter_map(|&host| {
            let icon_view = probe.find_child(host, ICON_VIEW_CLASS)?;
            Some(LegacyHost {
                host,
                icon_view,
                icon_list: probe.find_child(icon_view, ICON_LIST_CLASS),
                wallpaper_worker: probe.sibling_worker(host),
                rect: probe.window_rect(host),
            })
        })
        .collect();

    if hosts.is_empty() {
        let icon_view = probe.find_child(progman, ICON_VIEW_CLASS);
        let worker = probe.find_child(progman, WORKER_CLASS);
        warn!(
            "[WALLPAPER][SHELL] modern layout: {} top-level worker(s), icon_view={:?} worker={:?}",
            workers.len(),
            icon_view,
            worker
        );
        return Ok(ShellTopology::Modern {
            progman,
            icon_view,
            worker,
        });
    }

    for host in &hosts {
        warn!(
            "[WALLPAPER][SHELL] legacy host={:?} icon_view={:?} wallpaper_worker={:?}",
            host.host,
            host.icon_view,
            host.wallpaper_worker
        );
    }

    Ok(ShellTopology::Legacy { progman, hosts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::fake::{dual_monitors, FakeShell, PROGMAN};

    const TIMEOUT: Duration = Duration::from_millis(1000);

    #[test]
    fn missing_progman_is_reported() {
        let shell = FakeShell::default();
        assert!(matches!(
            locate(&shell, TIMEOUT),
            Err(WallpaperError::DesktopNotFound(PROGMAN_CLASS))
        ));
    }

    #[test]
    fn spawn_message_is_sent_on_every_locate() {
        let shell = FakeShell::modern(true);
        locate(&shell, TIMEOUT).unwrap();
        locate(&shell, TIMEOUT).unwrap();
        assert_eq!(shell.spawn_messages(), 2);
    }

    #[test]
    fn legacy_targets_the_worker_after_each_icon_host() {
        let monitors = dual_monitors();
        let shell = FakeShell::legacy(&[monitors[0].rect, monitors[1].rect]);
        let topology = locate(&shell, TIMEOUT).unwrap();

        let ShellTopology::Legacy { progman, hosts } = &topology else {
            panic!("expected legacy topology, got {topology:?}");
        };
        assert_eq!(*progman, PROGMAN);
        assert_eq!(hosts.len(), 2);

        for (index, monitor) in monitors.iter().enumerate() {
            let host = hosts[index].host;
            let expected = shell.sibling_worker(host).unwrap();
            let target = topology.target_for(monitor, index).unwrap();
            assert_eq!(target.parent(), expected);
            assert_ne!(target.parent(), host);
        }
    }

    #[test]
    fn legacy_maps_hosts_by_geometry_before_order() {
        let monitors = dual_monitors();
        // Hosts created right-to-left so index order disagrees with geometry.
        let shell = FakeShell::legacy(&[monitors[1].rect, monitors[0].rect]);
        let topology = locate(&shell, TIMEOUT).unwrap();

        let left = topology.target_for(&monitors[0], 0).unwrap();
        assert_eq!(left.parent(), WindowId(113));
        let right = topology.target_for(&monitors[1], 1).unwrap();
        assert_eq!(right.parent(), WindowId(103));
    }

    #[test]
    fn legacy_host_without_sibling_yields_no_target() {
        let shell = FakeShell::default();
        let host = shell.add(100, WORKER_CLASS, None, Rect::new(0, 0, 1920, 1080));
        shell.add(101, ICON_VIEW_CLASS, Some(host), Rect::new(0, 0, 1920, 1080));
        shell.add(PROGMAN.0, PROGMAN_CLASS, None, Rect::new(0, 0, 1920, 1080));

        let topology = locate(&shell, TIMEOUT).unwrap();
        assert_eq!(topology.name(), "legacy");
        assert_eq!(topology.target_for(&dual_monitors()[0], 0), None);
    }

    #[test]
    fn zero_icon_hosting_workers_means_modern() {
        let shell = FakeShell::modern(true);
        let topology = locate(&shell, TIMEOUT).unwrap();
        assert_eq!(
            topology,
            ShellTopology::Modern {
                progman: PROGMAN,
                icon_view: Some(WindowId(2)),
                worker: Some(WindowId(4)),
            }
        );

        for (index, monitor) in dual_monitors().iter().enumerate() {
            assert_eq!(topology.target_for(monitor, index).unwrap().parent(), WindowId(4));
        }
    }

    #[test]
    fn modern_without_worker_parents_into_progman() {
        let topology = locate(&FakeShell::modern(false), TIMEOUT).unwrap();
        let target = topology.target_for(&dual_monitors()[1], 1).unwrap();
        assert_eq!(target.parent(), PROGMAN);
    }
}
