//! Configuration surface exposed to operators. Parsing CLI flags into these
//! types is someone else's job; these are just plain structs with sane
//! defaults.

use std::time::Duration;

use daq_proto::{Role, DEFAULT_MAX_FRAME_LEN};

/// Default TCP port for the instrument bridge.
pub const DEFAULT_PORT: u16 = 6341;

/// Default tick period for the server's event loop.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_ip: String,
    pub port_id: u16,
    /// Roles this server accepts on handshake; anything else is rejected.
    pub accepted_roles: Vec<Role>,
    pub tick_period: Duration,
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_ip: "0.0.0.0".to_owned(),
            port_id: DEFAULT_PORT,
            accepted_roles: vec![Role::Grabber, Role::Actuator],
            tick_period: DEFAULT_TICK_PERIOD,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    pub fn accepts(&self, role: Role) -> bool {
        self.accepted_roles.contains(&role)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_ip: String,
    pub port_id: u16,
    pub role: Role,
    pub max_frame_len: usize,
}

impl ClientConfig {
    pub fn new(server_ip: impl Into<String>, port_id: u16, role: Role) -> Self {
        Self { server_ip: server_ip.into(), port_id, role, max_frame_len: DEFAULT_MAX_FRAME_LEN }
    }
}
