//! Non-blocking TCP server and client engines implementing the instrument
//! bridge protocol defined in `daq_proto`.

mod client;
mod config;
mod dispatcher;
mod events;
mod host;
mod registry;
mod server;
mod socket;

pub use client::{ClientEngine, ClientHandle, ClientState};
pub use config::{ClientConfig, ServerConfig, DEFAULT_PORT, DEFAULT_TICK_PERIOD};
pub use dispatcher::DispatchOutcome;
pub use events::{ClientCommand, ClientEvent, ServerEvent, StatusLog};
pub use host::{NoopExtension, ServerExtension};
pub use registry::{PeerEntry, PeerRegistry};
pub use server::Server;
pub use socket::PeerSocket;
