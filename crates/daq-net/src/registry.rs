//! The server's table of live peers, keyed by `mio::Token`.
//!
//! Invariant: at most one entry per token; the registry mirrors exactly the
//! set of file descriptors the server currently owns.

use daq_proto::{Role, SettingsMirror};
use indexmap::IndexMap;
use mio::Token;

use crate::socket::PeerSocket;

pub struct PeerEntry {
    pub role: Role,
    pub socket: PeerSocket,
    pub mirror: SettingsMirror,
}

#[derive(Default)]
pub struct PeerRegistry {
    peers: IndexMap<Token, PeerEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self { peers: IndexMap::new() }
    }

    pub fn insert(&mut self, token: Token, role: Role, socket: PeerSocket) {
        flux_utils::safe_assert!(
            !self.peers.contains_key(&token),
            "registering {token:?} twice, a prior peer was never removed"
        );
        self.peers.insert(token, PeerEntry { role, socket, mirror: SettingsMirror::new() });
    }

    pub fn remove(&mut self, token: Token) -> Option<PeerEntry> {
        self.peers.shift_remove(&token)
    }

    pub fn get(&self, token: Token) -> Option<&PeerEntry> {
        self.peers.get(&token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut PeerEntry> {
        self.peers.get_mut(&token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, &PeerEntry)> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.peers.keys().copied()
    }

    pub fn clear(&mut self) {
        for (_, mut entry) in self.peers.drain(..) {
            entry.socket.close();
        }
    }

    /// Builds the published table: `role -> "ip:port"`, insertion order
    /// preserved, with the listener's own address under `"server"`.
    pub fn peer_table(&self, server_addr: &str) -> IndexMap<String, String> {
        let mut table = IndexMap::with_capacity(self.peers.len() + 1);
        table.insert("server".to_owned(), server_addr.to_owned());
        for entry in self.peers.values() {
            table.insert(entry.role.as_str().to_owned(), entry.socket.peer_addr().to_string());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    use super::*;

    fn dummy_socket(port: u16) -> PeerSocket {
        // Loopback listener + a real connect gives us a live, closeable
        // PeerSocket without depending on test ordering or external state.
        let listener = mio::net::TcpListener::bind(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::LOCALHOST,
            port,
        )))
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let connector = std::net::TcpStream::connect(addr).unwrap();
        connector.set_nonblocking(true).unwrap();
        let (accepted, peer_addr) = listener.accept().unwrap();
        drop(connector);
        PeerSocket::from_raw_for_test(accepted, peer_addr)
    }

    #[test]
    fn peer_table_lists_server_then_peers_in_insertion_order() {
        let mut registry = PeerRegistry::new();
        registry.insert(Token(1), Role::Grabber, dummy_socket(0));
        registry.insert(Token(2), Role::Actuator, dummy_socket(0));

        let table = registry.peer_table("127.0.0.1:6341");
        let keys: Vec<_> = table.keys().cloned().collect();
        assert_eq!(keys, vec!["server", "GRABBER", "ACTUATOR"]);
    }

    #[test]
    fn remove_shrinks_registry_and_table() {
        let mut registry = PeerRegistry::new();
        registry.insert(Token(1), Role::Grabber, dummy_socket(0));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(Token(1)).is_some());
        assert!(registry.is_empty());
        assert_eq!(registry.peer_table("x").len(), 1);
    }

    #[test]
    fn clear_empties_registry() {
        let mut registry = PeerRegistry::new();
        registry.insert(Token(1), Role::Grabber, dummy_socket(0));
        registry.insert(Token(2), Role::Actuator, dummy_socket(0));
        registry.clear();
        assert!(registry.is_empty());
    }
}
