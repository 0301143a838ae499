//! Control channel between CLI invocations and the process that owns the
//! running video wallpaper.
//!
//! Only one process holds surfaces and players at a time. Later invocations
//! forward their request to that owner, which applies it on its own service so
//! the video/image exclusion holds across processes. Each message is a single
//! JSON line.

use std::{
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{WallpaperError, WallpaperResult},
    info,
    wallpaper_engine::{ApplyReport, WallpaperService},
    warn,
};

/// Base name of the owner's pipe and single-instance mutex.
pub const CHANNEL_NAME: &str = "planetboy-wallpaper";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlRequest {
    Set { path: PathBuf },
    Stop,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub ok: bool,
    pub message: String,
    #[serde(default)]
    pub playing: Option<PathBuf>,
}

impl ControlReply {
    fn success(message: impl Into<String>, playing: Option<PathBuf>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            playing,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            playing: None,
        }
    }
}

/// What the owning loop does after answering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    KeepRunning,
    Exit,
}

/// A request handed from the pipe thread to the owning loop.
pub struct Envelope {
    pub request: ControlRequest,
    pub reply: Sender<ControlReply>,
}

pub fn describe(path: &Path, report: &ApplyReport) -> String {
    let kind = format!("{:?}", report.kind).to_lowercase();
    if report.monitors.is_empty() {
        format!("{} set as {} wallpaper", path.display(), kind)
    } else {
        format!(
            "{}: playing on {}/{} monitor(s)",
            path.display(),
            report.playing(),
            report.monitors.len()
        )
    }
}

/// Applies one request to the owner's service.
pub fn dispatch(service: &mut WallpaperService, request: &ControlRequest) -> (ControlReply, Next) {
    let still_playing = |service: &WallpaperService| {
        if service.current_video().is_some() {
            Next::KeepRunning
        } else {
            Next::Exit
        }
    };

    match request {
        ControlRequest::Set { path } => match service.set_wallpaper(path) {
            Ok(report) if report.succeeded() => {
                let playing = service.current_video().map(Path::to_path_buf);
                (
                    ControlReply::success(describe(path, &report), playing),
                    still_playing(service),
                )
            }
            Ok(report) => {
                service.stop();
                (ControlReply::failure(describe(path, &report)), Next::Exit)
            }
            Err(e) => (ControlReply::failure(e.to_string()), still_playing(service)),
        },
        ControlRequest::Stop => {
            service.stop();
            (ControlReply::success("stopped", None), Next::Exit)
        }
        ControlRequest::Status => {
            let playing = service.current_video().map(Path::to_path_buf);
            let message = match &playing {
                Some(path) => format!("playing {}", path.display()),
                None => "idle".to_string(),
            };
            (ControlReply::success(message, playing), Next::KeepRunning)
        }
    }
}

/// Answers every queued request. Stops at the first one that leaves nothing
/// to keep running.
pub fn drain(service: &mut WallpaperService, commands: &Receiver<Envelope>) -> Next {
    while let Ok(envelope) = commands.try_recv() {
        info!("[WALLPAPER][CONTROL] handling {:?}", envelope.request);
        let (reply, next) = dispatch(service, &envelope.request);
        if envelope.reply.send(reply).is_err() {
            warn!("[WALLPAPER][CONTROL] client left before the reply");
        }
        if next == Next::Exit {
            return Next::Exit;
        }
    }
    Next::KeepRunning
}

pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> WallpaperResult<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> WallpaperResult<T> {
    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line)?;
    if line.trim().is_empty() {
        return Err(WallpaperError::Control("connection closed without a message".to_string()));
    }
    Ok(serde_json::from_str(line.trim())?)
}

/// Client side: one request, one reply.
pub fn exchange<S: Read + Write>(stream: &mut S, request: &ControlRequest) -> WallpaperResult<ControlReply> {
    write_message(stream, request)?;
    read_message(stream)
}

/// Owner side of one connection. Errors only when the owning loop is gone.
pub fn serve_connection<S: Read + Write>(stream: &mut S, commands: &Sender<Envelope>) -> WallpaperResult<()> {
    let request: ControlRequest = match read_message(stream) {
        Ok(request) => request,
        Err(e) => {
            warn!("[WALLPAPER][CONTROL] unreadable request: {}", e);
            return write_message(stream, &ControlReply::failure(format!("bad request: {e}")));
        }
    };

    let (reply_tx, reply_rx) = mpsc::channel();
    if commands
        .send(Envelope {
            request,
            reply: reply_tx,
        })
        .is_err()
    {
        let _ = write_message(stream, &ControlReply::failure("wallpaper owner is shutting down"));
        return Err(WallpaperError::Control("owning loop has exited".to_string()));
    }

    let reply = reply_rx
        .recv()
        .unwrap_or_else(|_| ControlReply::failure("wallpaper owner exited before replying"));
    write_message(stream, &reply)
}
