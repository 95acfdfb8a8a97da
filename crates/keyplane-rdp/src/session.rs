//! Session contract between the caller and a remote desktop protocol engine.

use keyplane::secrets::SecretString;
use keyplane::utils::{extract_host_port, split_host_port};
use std::fmt;
use tracing::{debug, info, warn};

/// Errors surfaced by the session boundary
#[derive(Debug, thiserror::Error)]
pub enum RdpError {
    /// Address or credentials rejected before connecting
    #[error("Invalid session request: {0}")]
    InvalidRequest(String),

    /// No protocol engine has been installed
    #[error("No RDP engine installed")]
    NoEngine,

    /// The engine could not establish a session
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The session failed after it was established
    #[error("Session error: {0}")]
    Session(String),
}

impl From<keyplane::KeyplaneError> for RdpError {
    fn from(error: keyplane::KeyplaneError) -> Self {
        RdpError::InvalidRequest(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RdpError>;

/// Remote screen dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u16,
    pub height: u16,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

/// Everything an engine needs to open a session.
#[derive(Clone)]
pub struct SessionRequest {
    addr: String,
    username: String,
    password: SecretString,
    screen: ScreenSize,
}

impl fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRequest")
            .field("addr", &self.addr)
            .field("username", &self.username)
            .field("password", &self.password)
            .field("screen", &self.screen)
            .finish()
    }
}

impl SessionRequest {
    /// Validate and normalize a request. `addr` may carry a `tcp://` scheme
    /// but must name a port.
    pub fn new(
        addr: &str,
        username: impl Into<String>,
        password: impl Into<SecretString>,
        screen: ScreenSize,
    ) -> Result<Self> {
        let addr = extract_host_port(addr)?;
        split_host_port(&addr).map_err(|e| RdpError::InvalidRequest(format!("{}: {:?}", e, addr)))?;

        let username = username.into();
        if username.is_empty() {
            return Err(RdpError::InvalidRequest("missing username".to_string()));
        }
        if screen.width == 0 || screen.height == 0 {
            return Err(RdpError::InvalidRequest(format!(
                "invalid screen size {}x{}",
                screen.width, screen.height
            )));
        }
        Ok(Self { addr, username, password: password.into(), screen })
    }

    /// Target as `host:port`
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }
}

/// Events streamed from the remote desktop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdpEvent {
    Bitmap { width: u16, height: u16 },
    Pointer { x: u16, y: u16 },
    Key { code: u16 },
}

/// An established session
pub trait RdpSession: Send {
    /// Next event, or `None` once the server has disconnected.
    fn next_event(&mut self) -> Result<Option<RdpEvent>>;

    fn shutdown(&mut self) -> Result<()>;
}

/// External protocol engine
pub trait RdpEngine: Send + Sync {
    fn open(&self, request: &SessionRequest) -> Result<Box<dyn RdpSession>>;
}

/// Counters for a finished session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub events: u64,
}

/// Open a session and pump events into `on_event` until the server disconnects.
///
/// The session is shut down even when reading fails; the read error wins
/// over a shutdown error.
pub fn run_session<F>(engine: &dyn RdpEngine, request: &SessionRequest, mut on_event: F) -> Result<SessionSummary>
where
    F: FnMut(&RdpEvent),
{
    info!(addr = %request.addr(), username = %request.username(), "Opening RDP session");
    let mut session = engine.open(request)?;
    let mut summary = SessionSummary::default();

    let outcome = loop {
        match session.next_event() {
            Ok(Some(event)) => {
                summary.events += 1;
                on_event(&event);
            }
            Ok(None) => {
                debug!("Server closed the RDP session");
                break Ok(());
            }
            Err(e) => {
                warn!(error = %e, "RDP session read failed");
                break Err(e);
            }
        }
    };

    let shutdown = session.shutdown();
    outcome?;
    shutdown?;
    info!(events = summary.events, "RDP session finished");
    Ok(summary)
}
