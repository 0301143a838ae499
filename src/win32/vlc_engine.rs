//! libVLC playback and first-frame extraction.
//!
//! libVLC delivers events on its own threads; the end-of-stream callback only
//! forwards the session's `EndOfStream` notifier and never touches the player.

use std::{
    ffi::{c_char, c_int, CString},
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use image::DynamicImage;
use vlc::{
    sys, EventType, Instance, Media, MediaPlayer as VlcMediaPlayer, MediaPlayerAudioEx, MediaPlayerVideoEx, State,
};

use super::hwnd;
use crate::{
    data_loaders::config::PlaybackSettings,
    debug,
    error::{WallpaperError, WallpaperResult},
    playback::{EndOfStream, MediaEngine, MediaPlayer, PlayerRequest},
    thumbnail::FrameDecoder,
    warn,
};

const BASE_MEDIA_OPTIONS: &[&str] = &[":no-video-title-show"];

/// One shared libVLC instance; the native repeat hint and user engine
/// arguments travel as per-media options.
pub struct VlcEngine {
    settings: PlaybackSettings,
    instance: Option<Instance>,
}

impl VlcEngine {
    pub fn new(settings: &PlaybackSettings) -> Self {
        Self {
            settings: settings.clone(),
            instance: None,
        }
    }

    fn instance(&mut self) -> WallpaperResult<&Instance> {
        if self.instance.is_none() {
            debug!("[WALLPAPER][VLC] creating libVLC instance");
            self.instance = Instance::new();
        }
        self.instance
            .as_ref()
            .ok_or_else(|| WallpaperError::PlayerCreation("libvlc_new failed; is libVLC installed?".to_string()))
    }
}

fn add_media_option(media: &Media, option: &str) {
    match CString::new(option) {
        Ok(option) => unsafe { sys::libvlc_media_add_option(media.raw(), option.as_ptr()) },
        Err(_) => warn!("[WALLPAPER][VLC] skipping media option with NUL byte: {:?}", option),
    }
}

impl MediaEngine for VlcEngine {
    fn open(
        &mut self,
        request: &PlayerRequest<'_>,
        on_end: EndOfStream,
    ) -> WallpaperResult<Box<dyn MediaPlayer>> {
        let options = self.settings.media_options(request.loop_hint);
        let instance = self.instance()?;

        let media = Media::new_path(instance, request.media).ok_or_else(|| {
            WallpaperError::PlayerCreation(format!("cannot open '{}'", request.media.display()))
        })?;
        for option in BASE_MEDIA_OPTIONS.iter().copied().chain(options.iter().map(String::as_str)) {
            add_media_option(&media, option);
        }
        debug!("[WALLPAPER][VLC] media options {:?}", options);

        let player = VlcMediaPlayer::new(instance)
            .ok_or_else(|| WallpaperError::PlayerCreation("libvlc_media_player_new failed".to_string()))?;

        player.set_media(&media);
        player.set_hwnd(hwnd(request.surface).0);
        player.set_scale(0.0);
        player.set_mute(true);
        if player.set_volume(request.volume).is_err() {
            warn!("[WALLPAPER][VLC] set_volume({}) rejected for '{}'", request.volume, request.media.display());
        }

        player
            .event_manager()
            .attach(EventType::MediaPlayerEndReached, move |_, _| on_end.notify())
            .map_err(|_| WallpaperError::PlayerCreation("cannot subscribe to end-of-stream".to_string()))?;

        Ok(Box::new(VlcPlayer { player, media }))
    }
}

struct VlcPlayer {
    player: VlcMediaPlayer,
    media: Media,
}

impl MediaPlayer for VlcPlayer {
    fn play(&mut self) -> WallpaperResult<()> {
        self.player
            .play()
            .map_err(|_| WallpaperError::Playback("libvlc_media_player_play failed".to_string()))
    }

    /// An ended player ignores seeks, so reload the media and start over.
    fn restart(&mut self) -> WallpaperResult<()> {
        self.player.stop();
        self.player.set_media(&self.media);
        self.play()?;
        self.player.set_position(0.0);
        Ok(())
    }

    fn stop(&mut self) {
        self.player.stop();
    }

    fn is_active(&self) -> bool {
        matches!(
            self.player.state(),
            State::Opening | State::Buffering | State::Playing
        )
    }
}

/// libVLC instance built from explicit arguments. `vlc::Instance` only
/// exposes the default constructor, and the scene filter is an instance option.
struct ArgsInstance(*mut sys::libvlc_instance_t);

impl ArgsInstance {
    fn new(args: &[String]) -> Option<Self> {
        let owned: Vec<CString> = args
            .iter()
            .filter_map(|arg| CString::new(arg.as_str()).ok())
            .collect();
        let argv: Vec<*const c_char> = owned.iter().map(|arg| arg.as_ptr()).collect();
        let ptr = unsafe { sys::libvlc_new(argv.len() as c_int, argv.as_ptr()) };
        (!ptr.is_null()).then_some(Self(ptr))
    }
}

impl Drop for ArgsInstance {
    fn drop(&mut self) {
        unsafe { sys::libvlc_release(self.0) }
    }
}

struct RawMedia(*mut sys::libvlc_media_t);

impl Drop for RawMedia {
    fn drop(&mut self) {
        unsafe { sys::libvlc_media_release(self.0) }
    }
}

struct RawPlayer(*mut sys::libvlc_media_player_t);

impl RawPlayer {
    fn state(&self) -> State {
        unsafe { sys::libvlc_media_player_get_state(self.0) }
    }
}

impl Drop for RawPlayer {
    fn drop(&mut self) {
        unsafe {
            sys::libvlc_media_player_stop(self.0);
            sys::libvlc_media_player_release(self.0);
        }
    }
}

/// Grabs a video's first frame with libVLC's scene filter into a temp PNG.
pub struct VlcFrameDecoder {
    timeout: Duration,
}

impl VlcFrameDecoder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for VlcFrameDecoder {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl FrameDecoder for VlcFrameDecoder {
    fn first_frame(&self, path: &Path) -> WallpaperResult<DynamicImage> {
        let decode_error = |reason: String| WallpaperError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let dir = std::env::temp_dir().join(format!("planetboy-thumbs-{}", std::process::id()));
        fs::create_dir_all(&dir)?;
        let prefix = "frame";
        let target: PathBuf = dir.join(format!("{prefix}.png"));
        let _ = fs::remove_file(&target);

        let args = vec![
            "--intf=dummy".to_string(),
            "--vout=dummy".to_string(),
            "--no-audio".to_string(),
            "--video-filter=scene".to_string(),
            "--scene-format=png".to_string(),
            "--scene-ratio=1".to_string(),
            "--scene-replace".to_string(),
            format!("--scene-prefix={prefix}"),
            format!("--scene-path={}", dir.display()),
        ];
        let media_path = path
            .to_str()
            .and_then(|p| CString::new(p).ok())
            .ok_or_else(|| decode_error("path is not valid UTF-8".to_string()))?;

        let instance = ArgsInstance::new(&args).ok_or_else(|| decode_error("libvlc_new failed".to_string()))?;
        let media = unsafe { sys::libvlc_media_new_path(instance.0, media_path.as_ptr()) };
        if media.is_null() {
            return Err(decode_error("cannot open media".to_string()));
        }
        let media = RawMedia(media);
        let player = unsafe { sys::libvlc_media_player_new_from_media(media.0) };
        if player.is_null() {
            return Err(decode_error("libvlc_media_player_new failed".to_string()));
        }
        let player = RawPlayer(player);
        if unsafe { sys::libvlc_media_player_play(player.0) } != 0 {
            return Err(decode_error("libvlc_media_player_play failed".to_string()));
        }

        let deadline = Instant::now() + self.timeout;
        let frame = loop {
            if target.exists() {
                // The filter may still be writing.
                if let Ok(frame) = image::open(&target) {
                    break Ok(frame);
                }
            }
            if matches!(player.state(), State::Error | State::Ended) && !target.exists() {
                break Err(decode_error("no video frame produced".to_string()));
            }
            if Instant::now() >= deadline {
                break Err(decode_error(format!("no frame within {:?}", self.timeout)));
            }
            thread::sleep(Duration::from_millis(50));
        };

        drop(player);
        let _ = fs::remove_file(&target);
        frame
    }
}
