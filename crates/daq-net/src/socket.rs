//! A connected peer socket: the codec operations from `daq_proto::frame`
//! composed onto a non-blocking `mio::net::TcpStream`.
//!
//! `mio::net::TcpStream` implements `std::io::Read`/`Write`, and the codec's
//! `WouldBlock`-spin loops tolerate non-blocking sockets directly, so this
//! type is little more than a named handle plus the remote address.

use std::net::SocketAddr;

use daq_proto::{
    get_array, get_list, get_scalar, get_string, send_array, send_list, send_scalar, send_string,
    Array, ListItem, Result, Scalar,
};
use mio::net::{TcpListener, TcpStream};
use tracing::debug;

/// A connected, non-blocking peer socket.
pub struct PeerSocket {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl PeerSocket {
    /// Opens a fresh non-blocking outbound connection.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, peer_addr: addr })
    }

    /// Accepts one pending connection off `listener`.
    pub fn accept(listener: &TcpListener) -> Result<(Self, SocketAddr)> {
        let (stream, peer_addr) = listener.accept()?;
        stream.set_nodelay(true)?;
        Ok((Self { stream, peer_addr }, peer_addr))
    }

    /// Test-only constructor for wrapping an already-accepted stream without
    /// going through a real `listen`/`connect` pair.
    #[cfg(test)]
    pub(crate) fn from_raw_for_test(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self { stream, peer_addr }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_address(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Idempotent: tolerates being called on an already-closed handle.
    pub fn close(&mut self) {
        if let Err(err) = self.stream.shutdown(std::net::Shutdown::Both) {
            debug!(?err, peer = %self.peer_addr, "daq-net: shutdown on close (already closed?)");
        }
    }

    pub fn send_string(&mut self, s: &str) -> Result<()> {
        send_string(&mut self.stream, s)
    }

    pub fn get_string(&mut self, max_len: usize) -> Result<String> {
        get_string(&mut self.stream, max_len)
    }

    pub fn send_scalar(&mut self, value: Scalar) -> Result<()> {
        send_scalar(&mut self.stream, value)
    }

    pub fn get_scalar(&mut self, max_len: usize) -> Result<Scalar> {
        get_scalar(&mut self.stream, max_len)
    }

    pub fn send_array(&mut self, array: &Array) -> Result<()> {
        send_array(&mut self.stream, array)
    }

    pub fn get_array(&mut self, max_len: usize) -> Result<Array> {
        get_array(&mut self.stream, max_len)
    }

    pub fn send_list(&mut self, items: &[ListItem]) -> Result<()> {
        send_list(&mut self.stream, items)
    }

    pub fn get_list(&mut self, max_len: usize) -> Result<Vec<ListItem>> {
        get_list(&mut self.stream, max_len)
    }
}
