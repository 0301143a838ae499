//! Per-monitor playback sessions on top of a media engine.
//!
//! Looping is done twice on purpose: the engine gets a native repeat hint, and
//! every player also reports end-of-stream so the session can be rewound to
//! position zero. The native hint is not honoured by every codec.
//!
//! End-of-stream arrives on the engine's own thread. The notifier only posts a
//! `LoopSignal` to a channel; `PlaybackCoordinator::pump` runs on the owning
//! thread and acts on it only if the signalled session is still the one
//! registered for that monitor.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
};

use crate::{
    debug,
    desktop::{MonitorId, WindowId},
    error::WallpaperResult,
    info, warn,
};

/// Wallpapers never play audio.
pub const WALLPAPER_VOLUME: i32 = 0;

pub struct PlayerRequest<'a> {
    pub monitor: MonitorId,
    pub surface: WindowId,
    pub media: &'a Path,
    pub volume: i32,
    pub loop_hint: bool,
}

pub trait MediaPlayer {
    fn play(&mut self) -> WallpaperResult<()>;

    /// Seeks to position zero and resumes playback.
    fn restart(&mut self) -> WallpaperResult<()>;

    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

pub trait MediaEngine {
    /// Creates a player rendering into `request.surface`, muted, with
    /// `on_end` subscribed to its end-of-stream event.
    fn open(
        &mut self,
        request: &PlayerRequest<'_>,
        on_end: EndOfStream,
    ) -> WallpaperResult<Box<dyn MediaPlayer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSignal {
    pub monitor: MonitorId,
    pub generation: u64,
}

/// Handed to the engine; safe to fire from any thread, never blocks.
#[derive(Debug, Clone)]
pub struct EndOfStream {
    signal: LoopSignal,
    tx: Sender<LoopSignal>,
}

impl EndOfStream {
    pub fn notify(&self) {
        // The coordinator may already be gone; a stale signal is a no-op.
        let _ = self.tx.send(self.signal);
    }
}

struct PlaybackSession {
    generation: u64,
    surface: WindowId,
    media: PathBuf,
    player: Box<dyn MediaPlayer>,
}

pub struct PlaybackCoordinator {
    engine: Box<dyn MediaEngine>,
    sessions: HashMap<MonitorId, PlaybackSession>,
    next_generation: u64,
    loop_hint: bool,
    tx: Sender<LoopSignal>,
    rx: Receiver<LoopSignal>,
}

impl PlaybackCoordinator {
    pub fn new(engine: Box<dyn MediaEngine>, loop_hint: bool) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            engine,
            sessions: HashMap::new(),
            next_generation: 0,
            loop_hint,
            tx,
            rx,
        }
    }

    /// Replaces whatever plays on `monitor` with `media` rendered into `surface`.
    pub fn start(&mut self, monitor: MonitorId, surface: WindowId, media: &Path) -> WallpaperResult<()> {
        self.stop(monitor);

        self.next_generation += 1;
        let generation = self.next_generation;
        let on_end = EndOfStream {
            signal: LoopSignal { monitor, generation },
            tx: self.tx.clone(),
        };

        let request = PlayerRequest {
            monitor,
            surface,
            media,
            volume: WALLPAPER_VOLUME,
            loop_hint: self.loop_hint,
        };
        let mut player = self.engine.open(&request, on_end)?;
        if let Err(e) = player.play() {
            player.stop();
            return Err(e);
        }

        info!(
            "[WALLPAPER][PLAYBACK] monitor {:?} playing '{}' into {:?} (generation {})",
            monitor,
            media.display(),
            surface,
            generation
        );
        self.sessions.insert(
            monitor,
            PlaybackSession {
                generation,
                surface,
                media: media.to_path_buf(),
                player,
            },
        );
        Ok(())
    }

    pub fn stop(&mut self, monitor: MonitorId) {
        if let Some(mut session) = self.sessions.remove(&monitor) {
            session.player.stop();
            info!(
                "[WALLPAPER][PLAYBACK] stopped monitor {:?} ('{}' on {:?})",
                monitor,
                session.media.display(),
                session.surface
            );
        }
    }

    pub fn stop_all(&mut self) {
        let monitors: Vec<MonitorId> = self.sessions.keys().copied().collect();
        for monitor in monitors {
            self.stop(monitor);
        }
    }

    pub fn is_any_playing(&self) -> bool {
        self.sessions.values().any(|s| s.player.is_active())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_playing_on(&self, monitor: MonitorId) -> bool {
        self.sessions
            .get(&monitor)
            .is_some_and(|s| s.player.is_active())
    }

    /// Rewinds every live session whose end-of-stream fired since the last
    /// call. Returns how many sessions were restarted.
    pub fn pump(&mut self) -> usize {
        let mut restarted = 0;
        while let Ok(signal) = self.rx.try_recv() {
            match self.sessions.get_mut(&signal.monitor) {
                Some(session) if session.generation == signal.generation => {
                    match session.player.restart() {
                        Ok(()) => restarted += 1,
                        Err(e) => warn!(
                            "[WALLPAPER][PLAYBACK] loop restart failed on monitor {:?}: {}",
                            signal.monitor,
                            e
                        ),
                    }
                }
                _ => debug!(
                    "[WALLPAPER][PLAYBACK] ignoring stale end-of-stream for monitor {:?} (generation {})",
                    signal.monitor,
                    signal.generation
                ),
            }
        }
        restarted
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.stop_all();
    }
}
