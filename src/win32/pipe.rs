//! Named-pipe transport for the control channel, and the named mutex held by
//! the process that owns the wallpaper.

use std::{
    io::{self, Read, Write},
    sync::mpsc::Sender,
    thread,
};

use windows::{
    core::{HRESULT, PCWSTR},
    Win32::{
        Foundation::{
            CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, ERROR_BROKEN_PIPE, ERROR_MORE_DATA, ERROR_NO_DATA,
            ERROR_PIPE_BUSY, ERROR_PIPE_CONNECTED, ERROR_PIPE_NOT_CONNECTED, HANDLE,
        },
        Storage::FileSystem::{
            CreateFileW, FlushFileBuffers, ReadFile, WriteFile, FILE_GENERIC_READ, FILE_GENERIC_WRITE,
            FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
        },
        System::{
            Pipes::{
                ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, WaitNamedPipeW, PIPE_READMODE_BYTE,
                PIPE_REJECT_REMOTE_CLIENTS, PIPE_TYPE_BYTE, PIPE_UNLIMITED_INSTANCES, PIPE_WAIT,
            },
            Threading::CreateMutexW,
        },
    },
};

use crate::{
    control::{self, ControlReply, ControlRequest, Envelope, CHANNEL_NAME},
    error::{WallpaperError, WallpaperResult},
    info,
    utility::to_wstring,
    warn,
};

const BUSY_ATTEMPTS: u32 = 3;
const BUSY_WAIT_MS: u32 = 500;
const BUFFER_SIZE: u32 = 4096;

fn pipe_name() -> Vec<u16> {
    to_wstring(&format!(r"\\.\pipe\{CHANNEL_NAME}"))
}

fn is_win32_error(err: &windows::core::Error, win32_code: u32) -> bool {
    err.code() == HRESULT::from_win32(win32_code)
}

fn io_error(err: windows::core::Error) -> io::Error {
    io::Error::other(format!("{err:?}"))
}

pub struct PipeStream {
    handle: HANDLE,
    server: bool,
}

impl Read for PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read: u32 = 0;
        match unsafe { ReadFile(self.handle, Some(buf), Some(&mut read), None) } {
            Ok(()) => Ok(read as usize),
            Err(e) if is_win32_error(&e, ERROR_MORE_DATA.0) => Ok(read as usize),
            // The peer closed its end.
            Err(e)
                if is_win32_error(&e, ERROR_BROKEN_PIPE.0)
                    || is_win32_error(&e, ERROR_PIPE_NOT_CONNECTED.0)
                    || is_win32_error(&e, ERROR_NO_DATA.0) =>
            {
                Ok(0)
            }
            Err(e) => Err(io_error(e)),
        }
    }
}

impl Write for PipeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written: u32 = 0;
        unsafe { WriteFile(self.handle, Some(buf), Some(&mut written), None) }.map_err(io_error)?;
        Ok(written as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        unsafe { FlushFileBuffers(self.handle) }.map_err(io_error)
    }
}

impl Drop for PipeStream {
    fn drop(&mut self) {
        unsafe {
            if self.server {
                let _ = FlushFileBuffers(self.handle);
                let _ = DisconnectNamedPipe(self.handle);
            }
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Opens the owner's pipe, waiting briefly while it is busy. `None` when no
/// process owns the wallpaper.
fn connect() -> Option<PipeStream> {
    let name = pipe_name();
    let pipe = PCWSTR(name.as_ptr());

    for attempt in 0..BUSY_ATTEMPTS {
        let result = unsafe {
            CreateFileW(
                pipe,
                (FILE_GENERIC_READ.0 | FILE_GENERIC_WRITE.0) as u32,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                Default::default(),
                None,
            )
        };
        match result {
            Ok(handle) if !handle.is_invalid() => return Some(PipeStream { handle, server: false }),
            Ok(_) => return None,
            Err(e) if is_win32_error(&e, ERROR_PIPE_BUSY.0) => {
                info!(
                    "[WALLPAPER][CONTROL] Pipe busy (attempt {}/{}), waiting {}ms",
                    attempt + 1,
                    BUSY_ATTEMPTS,
                    BUSY_WAIT_MS
                );
                let _ = unsafe { WaitNamedPipeW(pipe, BUSY_WAIT_MS) };
            }
            Err(_) => return None,
        }
    }

    warn!("[WALLPAPER][CONTROL] Pipe busy after {} attempts", BUSY_ATTEMPTS);
    None
}

/// Sends `request` to the owning process. `Ok(None)` when there is none.
pub fn forward(request: &ControlRequest) -> WallpaperResult<Option<ControlReply>> {
    match connect() {
        Some(mut stream) => control::exchange(&mut stream, request).map(Some),
        None => Ok(None),
    }
}

/// Accepts control connections on a background thread until the owning loop
/// drops its receiver.
pub fn spawn_server(commands: Sender<Envelope>) -> WallpaperResult<()> {
    thread::Builder::new()
        .name("control-pipe".to_string())
        .spawn(move || serve(commands))?;
    Ok(())
}

fn serve(commands: Sender<Envelope>) {
    let name = pipe_name();
    loop {
        let handle = unsafe {
            CreateNamedPipeW(
                PCWSTR(name.as_ptr()),
                PIPE_ACCESS_DUPLEX,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT | PIPE_REJECT_REMOTE_CLIENTS,
                PIPE_UNLIMITED_INSTANCES,
                BUFFER_SIZE,
                BUFFER_SIZE,
                0,
                None,
            )
        };
        if handle.is_invalid() {
            warn!("[WALLPAPER][CONTROL] CreateNamedPipeW failed: {:?}", unsafe { GetLastError() });
            return;
        }

        let mut stream = PipeStream { handle, server: true };
        if let Err(e) = unsafe { ConnectNamedPipe(handle, None) } {
            if !is_win32_error(&e, ERROR_PIPE_CONNECTED.0) {
                warn!("[WALLPAPER][CONTROL] ConnectNamedPipe failed: {:?}", e);
                continue;
            }
        }

        if let Err(e) = control::serve_connection(&mut stream, &commands) {
            info!("[WALLPAPER][CONTROL] Closing control pipe: {}", e);
            return;
        }
    }
}

/// Held for as long as this process owns the desktop wallpaper.
pub struct InstanceGuard(HANDLE);

impl InstanceGuard {
    /// `Ok(None)` when another process already holds it.
    pub fn acquire() -> WallpaperResult<Option<Self>> {
        let name = to_wstring(&format!(r"Local\{CHANNEL_NAME}"));
        let handle = unsafe { CreateMutexW(None, false, PCWSTR(name.as_ptr())) }
            .map_err(|e| WallpaperError::Control(format!("CreateMutexW failed: {e:?}")))?;
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Ok(None);
        }
        Ok(Some(Self(handle)))
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
