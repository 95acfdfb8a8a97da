//! # keyplane-rdp
//!
//! Narrow boundary for remote desktop sessions. The protocol engine lives
//! outside this crate and plugs in through [`RdpEngine`]; foreign callers
//! reach it through the C ABI in [`ffi`] (header: `include/keyplane_rdp.h`).

pub mod ffi;
pub mod session;

pub use ffi::{connect_rdp, install_engine, ConnectStatus, ForeignString};
pub use session::{
    run_session, RdpEngine, RdpError, RdpEvent, RdpSession, ScreenSize, SessionRequest, SessionSummary,
};
