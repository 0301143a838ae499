//! In-memory stand-ins for the desktop and media engine traits.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use super::{
    shell::{ICON_LIST_CLASS, ICON_VIEW_CLASS, PROGMAN_CLASS, WORKER_CLASS},
    DisplaySource, Monitor, MonitorId, Rect, ShellProbe, StaticWallpaperSetter, SurfaceHost,
    WindowId,
};
use crate::{
    error::{WallpaperError, WallpaperResult},
    playback::{EndOfStream, MediaEngine, MediaPlayer, PlayerRequest},
};

pub fn monitor(id: isize, rect: Rect, primary: bool) -> Monitor {
    Monitor {
        id: MonitorId(id),
        rect,
        work_area: Rect::new(rect.left, rect.top, rect.right, rect.bottom - 40),
        primary,
    }
}

pub fn dual_monitors() -> Vec<Monitor> {
    vec![
        monitor(11, Rect::new(0, 0, 1920, 1080), true),
        monitor(22, Rect::new(1920, 0, 3840, 1080), false),
    ]
}

#[derive(Clone)]
pub struct FakeDisplays {
    pub monitors: Rc<RefCell<Option<Vec<Monitor>>>>,
    pub primary: (i32, i32),
}

impl FakeDisplays {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        Self {
            monitors: Rc::new(RefCell::new(Some(monitors))),
            primary: (1920, 1080),
        }
    }

    pub fn failing(primary: (i32, i32)) -> Self {
        Self {
            monitors: Rc::new(RefCell::new(None)),
            primary,
        }
    }
}

impl DisplaySource for FakeDisplays {
    fn monitors(&self) -> WallpaperResult<Vec<Monitor>> {
        self.monitors
            .borrow()
            .clone()
            .ok_or_else(|| WallpaperError::DisplayEnumeration("EnumDisplayMonitors failed".into()))
    }

    fn primary_size(&self) -> (i32, i32) {
        self.primary
    }
}

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub id: WindowId,
    pub class: String,
    pub parent: Option<WindowId>,
    pub rect: Rect,
    pub alive: bool,
}

#[derive(Default)]
pub struct ShellState {
    /// Creation order doubles as z-order, front to back.
    pub windows: Vec<FakeWindow>,
    pub spawn_messages: usize,
}

#[derive(Clone, Default)]
pub struct FakeShell {
    pub state: Rc<RefCell<ShellState>>,
}

pub const PROGMAN: WindowId = WindowId(1);

impl FakeShell {
    pub fn add(&self, id: isize, class: &str, parent: Option<WindowId>, rect: Rect) -> WindowId {
        let id = WindowId(id);
        self.state.borrow_mut().windows.push(FakeWindow {
            id,
            class: class.to_string(),
            parent,
            rect,
            alive: true,
        });
        id
    }

    /// Pre-24H2 layout: per monitor an icon-hosting `WorkerW` followed by the
    /// wallpaper `WorkerW`, Progman last.
    pub fn legacy(monitor_rects: &[Rect]) -> Self {
        let shell = Self::default();
        for (i, rect) in monitor_rects.iter().enumerate() {
            let base = 100 + (i as isize) * 10;
            let host = shell.add(base, WORKER_CLASS, None, *rect);
            let defview = shell.add(base + 1, ICON_VIEW_CLASS, Some(host), *rect);
            shell.add(base + 2, ICON_LIST_CLASS, Some(defview), *rect);
            shell.add(base + 3, WORKER_CLASS, None, *rect);
        }
        shell.add(PROGMAN.0, PROGMAN_CLASS, None, Rect::new(0, 0, 3840, 1080));
        shell
    }

    /// 24H2 layout: icon view and the optional worker are children of Progman.
    pub fn modern(with_worker: bool) -> Self {
        let shell = Self::default();
        let progman = shell.add(PROGMAN.0, PROGMAN_CLASS, None, Rect::new(0, 0, 3840, 1080));
        let defview = shell.add(2, ICON_VIEW_CLASS, Some(progman), Rect::new(0, 0, 3840, 1080));
        shell.add(3, ICON_LIST_CLASS, Some(defview), Rect::new(0, 0, 3840, 1080));
        if with_worker {
            shell.add(4, WORKER_CLASS, Some(progman), Rect::new(0, 0, 3840, 1080));
        }
        shell
    }

    pub fn kill(&self, id: WindowId) {
        if let Some(w) = self.state.borrow_mut().windows.iter_mut().find(|w| w.id == id) {
            w.alive = false;
        }
    }

    pub fn spawn_messages(&self) -> usize {
        self.state.borrow().spawn_messages
    }

    fn find(&self, pred: impl Fn(&FakeWindow) -> bool) -> Option<WindowId> {
        self.state
            .borrow()
            .windows
            .iter()
            .find(|w| w.alive && pred(w))
            .map(|w| w.id)
    }
}

impl ShellProbe for FakeShell {
    fn find_top_level(&self, class: &str) -> Option<WindowId> {
        self.find(|w| w.parent.is_none() && w.class == class)
    }

    fn find_child(&self, parent: WindowId, class: &str) -> Option<WindowId> {
        self.find(|w| w.parent == Some(parent) && w.class == class)
    }

    fn top_level_windows(&self) -> Vec<WindowId> {
        self.state
            .borrow()
            .windows
            .iter()
            .filter(|w| w.alive && w.parent.is_none())
            .map(|w| w.id)
            .collect()
    }

    fn class_name(&self, window: WindowId) -> Option<String> {
        self.state
            .borrow()
            .windows
            .iter()
            .find(|w| w.id == window)
            .map(|w| w.class.clone())
    }

    fn sibling_worker(&self, host: WindowId) -> Option<WindowId> {
        let top = self.top_level_windows();
        let pos = top.iter().position(|w| *w == host)?;
        top[pos + 1..]
            .iter()
            .copied()
            .find(|w| self.class_name(*w).as_deref() == Some(WORKER_CLASS))
    }

    fn window_rect(&self, window: WindowId) -> Option<Rect> {
        self.state
            .borrow()
            .windows
            .iter()
            .find(|w| w.id == window && w.alive)
            .map(|w| w.rect)
    }

    fn is_window(&self, window: WindowId) -> bool {
        self.state
            .borrow()
            .windows
            .iter()
            .any(|w| w.id == window && w.alive)
    }

    fn spawn_workers(&self, _progman: WindowId, _timeout: Duration) -> bool {
        self.state.borrow_mut().spawn_messages += 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Create(WindowId),
    SetParent(WindowId, WindowId),
    Place(WindowId, Rect),
    Bottom(WindowId),
    Top(WindowId),
    Hide(WindowId),
    Destroy(WindowId),
}

#[derive(Default)]
pub struct HostState {
    pub ops: Vec<HostOp>,
    pub next_id: isize,
    pub fail_create: bool,
    pub fail_parent: Option<WindowId>,
}

#[derive(Clone, Default)]
pub struct FakeHost {
    pub state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    pub fn ops(&self) -> Vec<HostOp> {
        self.state.borrow().ops.clone()
    }

    pub fn created(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, HostOp::Create(_)))
            .count()
    }

    pub fn destroyed(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, HostOp::Destroy(_)))
            .count()
    }

    pub fn parent_of(&self, surface: WindowId) -> Option<WindowId> {
        self.ops().iter().rev().find_map(|op| match op {
            HostOp::SetParent(s, p) if *s == surface => Some(*p),
            _ => None,
        })
    }

    fn record(&self, op: HostOp) {
        self.state.borrow_mut().ops.push(op);
    }
}

impl SurfaceHost for FakeHost {
    fn create(&mut self, _rect: Rect) -> WallpaperResult<WindowId> {
        let mut state = self.state.borrow_mut();
        if state.fail_create {
            return Err(WallpaperError::SurfaceCreation("CreateWindowExW failed".into()));
        }
        state.next_id += 1;
        let id = WindowId(1000 + state.next_id);
        state.ops.push(HostOp::Create(id));
        Ok(id)
    }

    fn set_parent(&mut self, surface: WindowId, parent: WindowId) -> WallpaperResult<()> {
        if self.state.borrow().fail_parent == Some(parent) {
            return Err(WallpaperError::Reparent(format!("SetParent into {parent:?} failed")));
        }
        self.record(HostOp::SetParent(surface, parent));
        Ok(())
    }

    fn place(&mut self, surface: WindowId, rect: Rect) -> WallpaperResult<()> {
        self.record(HostOp::Place(surface, rect));
        Ok(())
    }

    fn send_to_bottom(&mut self, window: WindowId) -> WallpaperResult<()> {
        self.record(HostOp::Bottom(window));
        Ok(())
    }

    fn bring_to_top(&mut self, window: WindowId) -> WallpaperResult<()> {
        self.record(HostOp::Top(window));
        Ok(())
    }

    fn hide(&mut self, surface: WindowId) {
        self.record(HostOp::Hide(surface));
    }

    fn destroy(&mut self, surface: WindowId) {
        self.record(HostOp::Destroy(surface));
    }
}

#[derive(Clone, Default)]
pub struct FakeStatic {
    pub applied: Rc<RefCell<Vec<PathBuf>>>,
}

impl StaticWallpaperSetter for FakeStatic {
    fn apply(&mut self, path: &Path) -> WallpaperResult<()> {
        self.applied.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OpenedPlayer {
    pub monitor: MonitorId,
    pub surface: WindowId,
    pub media: PathBuf,
    pub volume: i32,
    pub loop_hint: bool,
    pub active: bool,
    pub restarts: usize,
    pub stops: usize,
}

#[derive(Default)]
pub struct EngineState {
    pub players: Vec<OpenedPlayer>,
    pub end_of_stream: Vec<EndOfStream>,
    pub fail_open_for: Option<MonitorId>,
    pub fail_restart: bool,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub state: Rc<RefCell<EngineState>>,
}

impl FakeEngine {
    pub fn opened(&self) -> usize {
        self.state.borrow().players.len()
    }

    pub fn player(&self, index: usize) -> OpenedPlayer {
        self.state.borrow().players[index].clone()
    }

    pub fn live_players(&self) -> usize {
        self.state.borrow().players.iter().filter(|p| p.active).count()
    }

    /// Fires the end-of-stream notification captured for player `index`.
    pub fn end_reached(&self, index: usize) {
        let notifier = self.state.borrow().end_of_stream[index].clone();
        notifier.notify();
    }
}

impl MediaEngine for FakeEngine {
    fn open(
        &mut self,
        request: &PlayerRequest<'_>,
        on_end: EndOfStream,
    ) -> WallpaperResult<Box<dyn MediaPlayer>> {
        let mut state = self.state.borrow_mut();
        if state.fail_open_for == Some(request.monitor) {
            return Err(WallpaperError::PlayerCreation("media_player_new failed".into()));
        }
        state.players.push(OpenedPlayer {
            monitor: request.monitor,
            surface: request.surface,
            media: request.media.to_path_buf(),
            volume: request.volume,
            loop_hint: request.loop_hint,
            active: false,
            restarts: 0,
            stops: 0,
        });
        state.end_of_stream.push(on_end);
        Ok(Box::new(FakePlayer {
            index: state.players.len() - 1,
            state: Rc::clone(&self.state),
        }))
    }
}

struct FakePlayer {
    index: usize,
    state: Rc<RefCell<EngineState>>,
}

impl MediaPlayer for FakePlayer {
    fn play(&mut self) -> WallpaperResult<()> {
        self.state.borrow_mut().players[self.index].active = true;
        Ok(())
    }

    fn restart(&mut self) -> WallpaperResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_restart {
            return Err(WallpaperError::Playback("demux error".into()));
        }
        let player = &mut state.players[self.index];
        player.restarts += 1;
        player.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        let player = &mut state.players[self.index];
        player.stops += 1;
        player.active = false;
    }

    fn is_active(&self) -> bool {
        self.state.borrow().players[self.index].active
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.players[self.index].active = false;
        }
    }
}
