mod bootstrap;
mod cli;
mod control;
mod data_loaders;
mod desktop;
mod error;
mod library;
mod logging;
mod paths;
mod playback;
mod thumbnail;
#[cfg(windows)]
mod utility;
mod wallpaper_engine;
#[cfg(windows)]
mod win32;

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant, SystemTime},
};

use clap::Parser;

use crate::{
    cli::{Args, Cmd},
    control::{ControlReply, ControlRequest, Envelope, Next},
    data_loaders::config::AppConfig,
    desktop::shell::ShellTopology,
    error::{WallpaperError, WallpaperResult},
    library::Library,
    thumbnail::{FrameDecoder, ThumbnailCache},
    wallpaper_engine::{ApplyReport, MonitorStatus, WallpaperService},
};

pub const DEBUG_NAME: &str = "WALLPAPER";

/// How many times a `set` retries while another process is mid-claim.
const CLAIM_ATTEMPTS: u32 = 10;
const CLAIM_RETRY: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let args = Args::parse();

    logging::init(args.debug, "info");
    bootstrap::bootstrap();
    let config_path = args.config.clone().unwrap_or_else(paths::config_path);
    let config = AppConfig::load(&config_path).unwrap_or_default();

    logging::set_debug(config.debug || args.debug);
    logging::set_level(&config.log_level);
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
        default_hook(panic_info);
    }));

    info!("!---------- [{}] Starting planetboy-wallpaper ----------!", DEBUG_NAME);
    info!("[{}] Config loaded from {}", DEBUG_NAME, config_path.display());

    match run(args.cmd, &config, &config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[{}] {}", DEBUG_NAME, e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cmd: Cmd, config: &AppConfig, config_path: &Path) -> WallpaperResult<()> {
    match cmd {
        Cmd::Set { path } => set_wallpaper(&path, config, config_path),
        Cmd::Stop => send_to_owner(&ControlRequest::Stop),
        Cmd::Status => send_to_owner(&ControlRequest::Status),
        Cmd::Apply => {
            let library = open_library(config)?;
            let current = library
                .catalog()
                .current_wallpaper
                .clone()
                .ok_or_else(|| WallpaperError::MissingFile(PathBuf::from("<no current wallpaper>")))?;
            set_wallpaper(&current, config, config_path)
        }
        Cmd::Add { path, set } => {
            let mut library = open_library(config)?;
            let stored = library.add(&path)?;
            println!("{}", stored.display());
            if set {
                set_wallpaper(&stored, config, config_path)?;
            }
            Ok(())
        }
        Cmd::Remove { path } => {
            let mut library = open_library(config)?;
            if library.remove(&path)? {
                println!("removed {}", path.display());
            } else {
                println!("not in library: {}", path.display());
            }
            Ok(())
        }
        Cmd::List => {
            let mut library = open_library(config)?;
            let current = library.catalog().current_wallpaper.clone();
            for entry in library.list()? {
                let marker = if current.as_deref() == Some(entry.path.as_path()) { "*" } else { " " };
                println!("{marker} {:<5} {}  {}", format!("{:?}", entry.kind).to_lowercase(), entry.name, entry.path.display());
            }
            Ok(())
        }
        Cmd::Monitors => {
            let service = open_service(config)?;
            for (index, monitor) in service.monitors().iter().enumerate() {
                let r = monitor.rect;
                println!(
                    "#{index} {:?} [{},{} {}x{}]{}",
                    monitor.id,
                    r.left,
                    r.top,
                    r.width(),
                    r.height(),
                    if monitor.primary { " primary" } else { "" }
                );
            }
            Ok(())
        }
        Cmd::Shell => {
            let service = open_service(config)?;
            match service.detect_shell()? {
                ShellTopology::Legacy { progman, hosts } => {
                    println!("legacy (Progman {:?})", progman);
                    for host in hosts {
                        println!(
                            "  host {:?} icons {:?} wallpaper worker {:?}",
                            host.host, host.icon_view, host.wallpaper_worker
                        );
                    }
                }
                ShellTopology::Modern { progman, icon_view, worker } => {
                    println!("modern (Progman {:?}) icons {:?} worker {:?}", progman, icon_view, worker);
                }
            }
            Ok(())
        }
        Cmd::Thumbnail { path, out, width, height } => {
            if !path.is_file() {
                return Err(WallpaperError::MissingFile(path));
            }
            let thumbs = &config.settings.thumbnails;
            let size = (width.unwrap_or(thumbs.width), height.unwrap_or(thumbs.height));
            let mut cache = ThumbnailCache::new(video_decoder(), config.settings.library.video_extensions.clone());
            let thumb = cache
                .get_cached_thumbnail(&path, Some(size))
                .ok_or_else(|| WallpaperError::Decode {
                    path: path.clone(),
                    reason: "no preview could be produced".to_string(),
                })?;
            thumb.save(&out).map_err(|e| WallpaperError::Decode {
                path: out.clone(),
                reason: e.to_string(),
            })?;
            println!("{}x{} -> {}", thumb.width(), thumb.height(), out.display());
            Ok(())
        }
    }
}

fn open_library(config: &AppConfig) -> WallpaperResult<Library> {
    Library::open(
        &paths::app_data_dir(),
        config.settings.library.video_extensions.clone(),
    )
}

/// Applies `path`. When another process already owns the wallpaper the
/// request is handed to it, so surfaces and players only ever live in one
/// process. Otherwise this process claims ownership and, for a video, stays
/// alive serving later requests until stopped.
fn set_wallpaper(path: &Path, config: &AppConfig, config_path: &Path) -> WallpaperResult<()> {
    if !path.is_file() {
        return Err(WallpaperError::MissingFile(path.to_path_buf()));
    }
    let path = std::path::absolute(path)?;
    let request = ControlRequest::Set { path: path.clone() };

    for attempt in 1..=CLAIM_ATTEMPTS {
        if let Some(reply) = platform::forward(&request)? {
            return finish_forwarded(&path, config, reply);
        }
        if let Some(guard) = platform::claim_instance()? {
            return apply_as_owner(&path, config, config_path, guard);
        }
        debug!(
            "[{}][CONTROL] Another process is claiming the desktop (attempt {}/{})",
            DEBUG_NAME, attempt, CLAIM_ATTEMPTS
        );
        thread::sleep(CLAIM_RETRY);
    }
    Err(WallpaperError::Control(
        "another wallpaper process holds the desktop but does not answer".to_string(),
    ))
}

fn finish_forwarded(path: &Path, config: &AppConfig, reply: ControlReply) -> WallpaperResult<()> {
    if !reply.ok {
        return Err(WallpaperError::Control(reply.message));
    }
    println!("{} (running wallpaper process)", reply.message);
    record_current(config, path);
    Ok(())
}

fn apply_as_owner(
    path: &Path,
    config: &AppConfig,
    config_path: &Path,
    _guard: platform::InstanceGuard,
) -> WallpaperResult<()> {
    let mut service = open_service(config)?;
    let report = service.set_wallpaper(path)?;
    print_report(path, &report);

    if !report.succeeded() {
        return Err(WallpaperError::Playback(
            "no monitor could start video playback".to_string(),
        ));
    }
    record_current(config, path);
    if service.current_video().is_none() {
        return Ok(());
    }

    let (tx, commands) = mpsc::channel();
    platform::serve_control(tx)?;
    println!("playing; run `planetboy-wallpaper stop` or press Ctrl+C to stop");
    run_loop(&mut service, config.clone(), config_path, &commands)
}

fn record_current(config: &AppConfig, path: &Path) {
    match open_library(config) {
        Ok(mut library) => {
            if let Err(e) = library.set_current(path) {
                warn!("[{}] Could not record current wallpaper: {}", DEBUG_NAME, e);
            }
        }
        Err(e) => warn!("[{}] Library unavailable: {}", DEBUG_NAME, e),
    }
}

fn send_to_owner(request: &ControlRequest) -> WallpaperResult<()> {
    match platform::forward(request)? {
        Some(reply) if reply.ok => {
            println!("{}", reply.message);
            Ok(())
        }
        Some(reply) => Err(WallpaperError::Control(reply.message)),
        None => {
            println!("no wallpaper process is running");
            Ok(())
        }
    }
}

fn print_report(path: &Path, report: &ApplyReport) {
    match report.topology {
        Some(topology) => println!("{} ({} shell)", path.display(), topology),
        None => println!("{}", path.display()),
    }
    for outcome in &report.monitors {
        let status = match &outcome.status {
            MonitorStatus::Playing => "playing".to_string(),
            MonitorStatus::NoContainer => "no desktop container".to_string(),
            MonitorStatus::Failed(reason) => format!("failed: {reason}"),
        };
        println!("  monitor {:?}: {}", outcome.monitor.id, status);
    }
}

fn run_loop(
    service: &mut WallpaperService,
    mut config: AppConfig,
    config_path: &Path,
    commands: &Receiver<Envelope>,
) -> WallpaperResult<()> {
    platform::install_quit_handler();

    let mut loop_sleep = Duration::from_millis(config.settings.runtime.tick_sleep_ms.max(1));
    let mut monitor_check_interval =
        Duration::from_millis(config.settings.runtime.monitor_check_interval_ms);
    let mut watcher_enabled = config.settings.watcher.enabled;
    let mut watcher_interval = Duration::from_millis(config.settings.watcher.interval_ms.max(100));
    let mut last_watch_tick = Instant::now();
    let mut last_monitor_check = Instant::now();
    let mut last_config_modified: Option<SystemTime> =
        fs::metadata(config_path).and_then(|m| m.modified()).ok();

    loop {
        if platform::quit_requested() {
            warn!("[{}] Quit requested, stopping video wallpaper", DEBUG_NAME);
            service.stop();
            return Ok(());
        }

        if control::drain(service, commands) == Next::Exit {
            info!("[{}][CONTROL] Released the desktop on request", DEBUG_NAME);
            return Ok(());
        }

        let restarted = service.pump();
        if restarted > 0 {
            debug!("[{}][LOOP] Restarted {} session(s) at end of stream", DEBUG_NAME, restarted);
        }

        // Monitor hot-plug, resolution changes and explorer restarts all
        // invalidate the attached surfaces.
        if last_monitor_check.elapsed() >= monitor_check_interval {
            last_monitor_check = Instant::now();
            if service.needs_refresh() {
                match service.refresh() {
                    Ok(Some(report)) => warn!(
                        "[{}][MONITORS] Desktop changed, reapplied on {}/{} monitor(s)",
                        DEBUG_NAME,
                        report.playing(),
                        report.monitors.len()
                    ),
                    Ok(None) => {}
                    Err(e) => {
                        service.stop();
                        return Err(e);
                    }
                }
            }
        }

        if watcher_enabled && last_watch_tick.elapsed() >= watcher_interval {
            last_watch_tick = Instant::now();

            let current_modified = fs::metadata(config_path).and_then(|m| m.modified()).ok();
            let changed = match (last_config_modified, current_modified) {
                (Some(prev), Some(curr)) => curr > prev,
                (None, Some(_)) => true,
                _ => false,
            };

            if changed {
                data_loaders::yaml::forget(config_path);
                match AppConfig::load(config_path) {
                    Some(new_config) => {
                        config = new_config;
                        logging::set_debug(config.debug);
                        logging::set_level(&config.log_level);
                        loop_sleep = Duration::from_millis(config.settings.runtime.tick_sleep_ms.max(1));
                        monitor_check_interval =
                            Duration::from_millis(config.settings.runtime.monitor_check_interval_ms);
                        watcher_enabled = config.settings.watcher.enabled;
                        watcher_interval =
                            Duration::from_millis(config.settings.watcher.interval_ms.max(100));
                        warn!(
                            "[{}][WATCHER] Reloaded config from {}; playback settings apply to the next wallpaper process",
                            DEBUG_NAME,
                            config_path.display()
                        );
                    }
                    None => warn!(
                        "[{}][WATCHER] Detected config change but failed to parse {}; keeping previous config",
                        DEBUG_NAME,
                        config_path.display()
                    ),
                }
                last_config_modified = current_modified;
            }
        }

        thread::sleep(loop_sleep);
    }
}

#[cfg(windows)]
fn open_service(config: &AppConfig) -> WallpaperResult<WallpaperService> {
    use crate::{wallpaper_engine::ServiceOptions, win32::vlc_engine::VlcEngine};

    win32::enable_per_monitor_dpi_awareness();
    Ok(WallpaperService::new(
        win32::native_desktop(),
        Box::new(VlcEngine::new(&config.settings.playback)),
        ServiceOptions::from_settings(&config.settings),
    ))
}

#[cfg(not(windows))]
fn open_service(_config: &AppConfig) -> WallpaperResult<WallpaperService> {
    Err(WallpaperError::UnsupportedPlatform)
}

#[cfg(windows)]
fn video_decoder() -> Box<dyn FrameDecoder> {
    Box::new(win32::vlc_engine::VlcFrameDecoder::default())
}

#[cfg(not(windows))]
fn video_decoder() -> Box<dyn FrameDecoder> {
    Box::new(thumbnail::NoVideoDecoder)
}

#[cfg(windows)]
mod platform {
    use std::sync::mpsc::Sender;

    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_QUIT,
    };

    pub use crate::win32::pipe::{forward, InstanceGuard};
    use crate::{control::Envelope, error::WallpaperResult};

    pub fn claim_instance() -> WallpaperResult<Option<InstanceGuard>> {
        InstanceGuard::acquire()
    }

    pub fn serve_control(commands: Sender<Envelope>) -> WallpaperResult<()> {
        crate::win32::pipe::spawn_server(commands)
    }

    pub fn install_quit_handler() {
        crate::win32::install_ctrl_c_handler();
    }

    /// Drains this thread's message queue. True on WM_QUIT or Ctrl+C.
    pub fn quit_requested() -> bool {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    return true;
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        crate::win32::stop_requested()
    }
}

#[cfg(not(windows))]
mod platform {
    use std::sync::mpsc::Sender;

    use crate::{
        control::{ControlReply, ControlRequest, Envelope},
        error::WallpaperResult,
    };

    pub struct InstanceGuard;

    pub fn forward(_request: &ControlRequest) -> WallpaperResult<Option<ControlReply>> {
        Ok(None)
    }

    pub fn claim_instance() -> WallpaperResult<Option<InstanceGuard>> {
        Ok(Some(InstanceGuard))
    }

    pub fn serve_control(_commands: Sender<Envelope>) -> WallpaperResult<()> {
        Ok(())
    }

    pub fn install_quit_handler() {}

    pub fn quit_requested() -> bool {
        true
    }
}
