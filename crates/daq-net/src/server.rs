//! The server engine: accepts connections, classifies peers by declared
//! role, and drives the command dispatcher on a periodic tick.
//!
//! Mirrors `flux-network`'s single-`Poll`-per-task model: one thread owns
//! the listener, the registry, and the poll instance; nothing here is
//! `Send`-required to cross threads, and nothing needs to be.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Duration;

use daq_proto::{Error, Result, Role, SettingsCodec};
use indexmap::IndexMap;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::{self, DispatchOutcome};
use crate::events::{ServerEvent, StatusLog};
use crate::host::ServerExtension;
use crate::registry::PeerRegistry;
use crate::socket::PeerSocket;

const LISTENER_TOKEN: Token = Token(0);
const FIRST_PEER_TOKEN: usize = 1;

/// Accepts, classifies, and services peers on a single cooperative event
/// loop, per-tick, matching the source protocol's "one task, can't block"
/// design.
pub struct Server<S: SettingsCodec, X: ServerExtension> {
    config: ServerConfig,
    poll: Poll,
    events: Events,
    listener: mio::net::TcpListener,
    listener_addr: SocketAddr,
    registry: PeerRegistry,
    next_token: usize,
    /// Reentrancy guard: a tick still in flight causes the next tick
    /// invocation to be a no-op, not a queued retry.
    processing: bool,
    ext: X,
    _codec: PhantomData<S>,
}

impl<S: SettingsCodec, X: ServerExtension> Server<S, X> {
    /// Binds and registers the listening socket. Bind failure is fatal and
    /// surfaces as `Error::Configuration`.
    pub fn bind(config: ServerConfig, ext: X) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.socket_ip, config.port_id)
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid bind address: {e}")))?;

        let mut listener = mio::net::TcpListener::bind(addr)
            .map_err(|e| Error::Configuration(format!("failed to bind {addr}: {e}")))?;
        let listener_addr = listener
            .local_addr()
            .map_err(|e| Error::Configuration(format!("failed to read bound address: {e}")))?;

        let poll = Poll::new().map_err(Error::Io)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|e| Error::Configuration(format!("failed to register listener: {e}")))?;

        info!(addr = %listener_addr, "daq-net: server listening");

        Ok(Self {
            config,
            poll,
            events: Events::with_capacity(128),
            listener,
            listener_addr,
            registry: PeerRegistry::new(),
            next_token: FIRST_PEER_TOKEN,
            processing: false,
            ext,
            _codec: PhantomData,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener_addr
    }

    pub fn peer_table(&self) -> IndexMap<String, String> {
        self.registry.peer_table(&self.listener_addr.to_string())
    }

    pub fn tick_period(&self) -> Duration {
        self.config.tick_period
    }

    /// The settings mirror held for a given peer, if it's still connected.
    pub fn peer_mirror(&self, token: Token) -> Option<&daq_proto::SettingsMirror> {
        self.registry.get(token).map(|entry| &entry.mirror)
    }

    /// Runs one tick: polls every registered socket, accepts new peers,
    /// reads and dispatches one command per ready peer. Errors are
    /// per-peer; the server itself never returns an error from here.
    pub fn tick(&mut self, emit: &mut impl FnMut(ServerEvent)) {
        if self.processing {
            return;
        }
        self.processing = true;

        if let Err(err) = self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            warn!(?err, "daq-net: poll failed");
            self.processing = false;
            return;
        }

        let ready: Vec<Token> = self.events.iter().map(mio::event::Event::token).collect();
        for token in ready {
            if token == LISTENER_TOKEN {
                self.accept_all(emit);
            } else {
                self.service_peer(token, emit);
            }
        }

        self.processing = false;
    }

    fn accept_all(&mut self, emit: &mut impl FnMut(ServerEvent)) {
        loop {
            let (mut socket, addr) = match PeerSocket::accept(&self.listener) {
                Ok(pair) => pair,
                Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(?err, "daq-net: accept failed");
                    break;
                }
            };

            let role_str = match socket.get_string(self.config.max_frame_len) {
                Ok(s) => s,
                Err(err) => {
                    warn!(?err, %addr, "daq-net: failed to read role on handshake");
                    continue;
                }
            };

            let Some(role) = Role::parse(&role_str) else {
                let message = format!("{role_str} is not a valid type");
                warn!(%message, %addr);
                emit(ServerEvent::Status(StatusLog::new(tracing::Level::WARN, message)));
                continue;
            };

            if !self.config.accepts(role) {
                let message = format!("{role_str} is not a valid type");
                warn!(%message, %addr);
                emit(ServerEvent::Status(StatusLog::new(tracing::Level::WARN, message)));
                continue;
            }

            let token = Token(self.next_token);
            self.next_token += 1;
            if let Err(err) =
                self.poll.registry().register(socket.stream_mut(), token, Interest::READABLE)
            {
                warn!(?err, %addr, "daq-net: failed to register peer");
                continue;
            }

            let message = format!("{role} connected with {addr}");
            info!(%message);
            self.registry.insert(token, role, socket);
            emit(ServerEvent::Status(StatusLog::new(tracing::Level::INFO, message)));
            emit(ServerEvent::PeerAttached { token, role, addr: addr.to_string() });
        }
    }

    fn service_peer(&mut self, token: Token, emit: &mut impl FnMut(ServerEvent)) {
        let Some(entry) = self.registry.get_mut(token) else { return };

        let command = match entry.socket.get_string(self.config.max_frame_len) {
            Ok(cmd) => cmd,
            Err(err) => {
                debug!(?err, ?token, "daq-net: read failed, removing peer");
                self.remove_peer(token, emit);
                return;
            }
        };

        let max_frame_len = self.config.max_frame_len;
        let Some(entry) = self.registry.get_mut(token) else { return };
        match dispatcher::dispatch::<S, X>(
            token,
            entry,
            &command,
            max_frame_len,
            &mut self.ext,
            emit,
        ) {
            Ok(DispatchOutcome::Continue) => {}
            Ok(DispatchOutcome::Remove) => self.remove_peer(token, emit),
            Err(err) => {
                debug!(?err, ?token, %command, "daq-net: dispatch failed, removing peer");
                self.remove_peer(token, emit);
            }
        }
    }

    fn remove_peer(&mut self, token: Token, emit: &mut impl FnMut(ServerEvent)) {
        if let Some(mut entry) = self.registry.remove(token) {
            let _ = self.poll.registry().deregister(entry.socket.stream_mut());
            entry.socket.close();
            emit(ServerEvent::PeerRemoved { token, role: entry.role });
        }
    }

    /// Closes every registered socket and republishes an empty peer table.
    pub fn shutdown(&mut self, emit: &mut impl FnMut(ServerEvent)) {
        for token in self.registry.tokens().collect::<Vec<_>>() {
            self.remove_peer(token, emit);
        }
        let _ = self.poll.registry().deregister(&mut self.listener);
        self.registry.clear();
    }
}
