//! C ABI entry point.
//!
//! Foreign callers hand over borrowed byte buffers; every buffer is copied
//! before the call returns and ownership never changes hands.

use crate::session::{run_session, RdpEngine, RdpError, RdpEvent, ScreenSize, SessionRequest};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{debug, error};

/// Borrowed byte buffer passed across the C boundary
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ForeignString {
    pub data: *const u8,
    pub len: u16,
}

impl ForeignString {
    /// Borrow a Rust string for the duration of a call.
    ///
    /// Returns `None` when `s` is longer than the `u16` length field can describe.
    pub fn borrowed(s: &str) -> Option<Self> {
        let len = u16::try_from(s.len()).ok()?;
        Some(Self { data: s.as_ptr(), len })
    }

    /// Copy the buffer into an owned UTF-8 string.
    ///
    /// # Safety
    ///
    /// `data` must point to `len` readable bytes, or be null when `len` is 0.
    pub unsafe fn to_owned_string(&self, what: &str) -> Result<String, RdpError> {
        if self.len == 0 {
            return Ok(String::new());
        }
        if self.data.is_null() {
            return Err(RdpError::InvalidRequest(format!("{} is null", what)));
        }
        let bytes = std::slice::from_raw_parts(self.data, usize::from(self.len));
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| RdpError::InvalidRequest(format!("{} is not valid UTF-8", what)))
    }
}

/// Status codes returned by [`connect_rdp`]; mirrored in `keyplane_rdp.h`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Ok = 0,
    InvalidArgument = 1,
    NoEngine = 2,
    ConnectFailed = 3,
    SessionFailed = 4,
    Panicked = 5,
}

impl From<&RdpError> for ConnectStatus {
    fn from(error: &RdpError) -> Self {
        match error {
            RdpError::InvalidRequest(_) => ConnectStatus::InvalidArgument,
            RdpError::NoEngine => ConnectStatus::NoEngine,
            RdpError::Connect(_) => ConnectStatus::ConnectFailed,
            RdpError::Session(_) => ConnectStatus::SessionFailed,
        }
    }
}

static ENGINE: OnceLock<Box<dyn RdpEngine>> = OnceLock::new();

/// Install the process-wide protocol engine used by [`connect_rdp`].
///
/// Only the first installation takes effect; a second engine is handed back.
pub fn install_engine(engine: Box<dyn RdpEngine>) -> Result<(), Box<dyn RdpEngine>> {
    ENGINE.set(engine)
}

/// Open a session to `addr` and stream it until the server disconnects.
///
/// # Safety
///
/// Each [`ForeignString`] must satisfy [`ForeignString::to_owned_string`].
#[no_mangle]
pub unsafe extern "C" fn connect_rdp(
    addr: ForeignString,
    username: ForeignString,
    password: ForeignString,
    screen_width: u16,
    screen_height: u16,
) -> i32 {
    let screen = ScreenSize { width: screen_width, height: screen_height };
    let result = catch_unwind(AssertUnwindSafe(|| {
        connect(ENGINE.get().map(|engine| engine.as_ref()), addr, username, password, screen)
    }));
    match result {
        Ok(status) => status as i32,
        Err(_) => {
            error!("RDP engine panicked");
            ConnectStatus::Panicked as i32
        }
    }
}

unsafe fn connect(
    engine: Option<&dyn RdpEngine>,
    addr: ForeignString,
    username: ForeignString,
    password: ForeignString,
    screen: ScreenSize,
) -> ConnectStatus {
    let outcome = (|| {
        let request = SessionRequest::new(
            &addr.to_owned_string("address")?,
            username.to_owned_string("username")?,
            password.to_owned_string("password")?,
            screen,
        )?;
        let engine = engine.ok_or(RdpError::NoEngine)?;
        run_session(engine, &request, log_event)
    })();

    match outcome {
        Ok(_) => ConnectStatus::Ok,
        Err(e) => {
            error!(error = %e, "RDP session failed");
            ConnectStatus::from(&e)
        }
    }
}

fn log_event(event: &RdpEvent) {
    match event {
        RdpEvent::Bitmap { width, height } => debug!(width, height, "RDP bitmap"),
        RdpEvent::Pointer { x, y } => debug!(x, y, "RDP pointer"),
        RdpEvent::Key { code } => debug!(code, "RDP key"),
    }
}
