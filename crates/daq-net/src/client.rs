//! The client engine: connects, announces its role, uploads its settings,
//! then runs a cooperative poll loop dispatching inbound commands and
//! draining outbound ones from its host.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use daq_proto::{CommandName, Error, ListItem, ParamGroup, Result, SettingsCodec};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::events::{ClientCommand, ClientEvent, StatusLog};
use crate::socket::PeerSocket;

const SOCKET_TOKEN: Token = Token(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Running,
    Closing,
    Terminated,
}

/// Sending half the host keeps, to enqueue outbound commands for the engine.
#[derive(Clone)]
pub struct ClientHandle {
    tx: Sender<ClientCommand>,
}

impl ClientHandle {
    pub fn send(&self, command: ClientCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

pub struct ClientEngine<S: SettingsCodec> {
    config: ClientConfig,
    settings: ParamGroup,
    socket: Option<PeerSocket>,
    poll: Option<Poll>,
    events: Events,
    cmd_rx: Receiver<ClientCommand>,
    state: ClientState,
    _codec: PhantomData<S>,
}

impl<S: SettingsCodec> ClientEngine<S> {
    pub fn new(config: ClientConfig, settings: ParamGroup) -> (Self, ClientHandle) {
        let (tx, rx) = unbounded();
        let engine = Self {
            config,
            settings,
            socket: None,
            poll: None,
            events: Events::with_capacity(16),
            cmd_rx: rx,
            state: ClientState::Disconnected,
            _codec: PhantomData,
        };
        (engine, ClientHandle { tx })
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Opens the TCP connection, announces the role, and uploads the initial
    /// settings tree. On success the engine is `Running`; on failure it
    /// reverts to `Disconnected` and the caller may retry — this crate does
    /// not auto-reconnect.
    pub fn ini_connection(&mut self, emit: &mut impl FnMut(ClientEvent)) -> Result<()> {
        self.state = ClientState::Connecting;

        let addr: SocketAddr = format!("{}:{}", self.config.server_ip, self.config.port_id)
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid server address: {e}")))?;

        let mut socket = match PeerSocket::connect(addr) {
            Ok(socket) => socket,
            Err(err) => {
                self.state = ClientState::Disconnected;
                warn!(?err, %addr, "daq-net: client connect failed");
                emit(ClientEvent::Status(StatusLog::new(
                    tracing::Level::WARN,
                    format!("connection to {addr} failed: {err}"),
                )));
                emit(ClientEvent::Disconnected);
                return Err(err);
            }
        };

        let poll = Poll::new().map_err(Error::Io)?;
        poll.registry()
            .register(socket.stream_mut(), SOCKET_TOKEN, Interest::READABLE)
            .map_err(Error::Io)?;

        socket.send_string(self.config.role.as_str())?;
        socket.send_string("Infos")?;
        socket.send_string(&S::to_xml(&self.settings))?;

        self.socket = Some(socket);
        self.poll = Some(poll);
        self.state = ClientState::Running;
        emit(ClientEvent::Connected);
        emit(ClientEvent::GetAxis);
        Ok(())
    }

    /// One iteration of the run loop: poll for inbound commands, dispatch
    /// each, then drain any outbound commands the host has queued.
    pub fn run_once(&mut self, emit: &mut impl FnMut(ClientEvent)) {
        if self.state != ClientState::Running {
            return;
        }
        self.poll_inbound(emit);
        if self.state == ClientState::Running {
            self.drain_outbound(emit);
        }
    }

    fn poll_inbound(&mut self, emit: &mut impl FnMut(ClientEvent)) {
        let Some(poll) = self.poll.as_ref() else { return };
        if let Err(err) = poll.poll(&mut self.events, Some(Duration::ZERO)) {
            warn!(?err, "daq-net: client poll failed");
            return;
        }
        if self.events.is_empty() {
            return;
        }

        loop {
            let max_len = self.config.max_frame_len;
            let Some(socket) = self.socket.as_mut() else { break };
            match socket.get_string(max_len) {
                Ok(name) => self.handle_inbound(&name, emit),
                Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    self.fail(err, emit);
                    break;
                }
            }
            if self.state != ClientState::Running {
                break;
            }
        }
    }

    fn handle_inbound(&mut self, name: &str, emit: &mut impl FnMut(ClientEvent)) {
        let max_len = self.config.max_frame_len;
        match CommandName::parse(name) {
            CommandName::Quit => {
                self.close(emit);
            }
            CommandName::MoveAbs => match self.socket.as_mut().unwrap().get_scalar(max_len) {
                Ok(value) => emit(ClientEvent::MoveAbs(value)),
                Err(err) => self.fail(err, emit),
            },
            CommandName::MoveRel => match self.socket.as_mut().unwrap().get_scalar(max_len) {
                Ok(value) => emit(ClientEvent::MoveRel(value)),
                Err(err) => self.fail(err, emit),
            },
            CommandName::XAxis => emit(ClientEvent::XAxisRequest),
            CommandName::YAxis => emit(ClientEvent::YAxisRequest),
            CommandName::Other(other) => emit(ClientEvent::Command { name: other }),
            known => emit(ClientEvent::Command { name: known.as_str().to_owned() }),
        }
    }

    fn drain_outbound(&mut self, emit: &mut impl FnMut(ClientEvent)) {
        while let Ok(command) = self.cmd_rx.try_recv() {
            if let Err(err) = self.handle_outbound(command, emit) {
                self.fail(err, emit);
                break;
            }
            if self.state != ClientState::Running {
                break;
            }
        }
    }

    fn handle_outbound(
        &mut self,
        command: ClientCommand,
        emit: &mut impl FnMut(ClientEvent),
    ) -> Result<()> {
        match command {
            ClientCommand::DataReady(arrays) => {
                let socket = self.socket.as_mut().expect("running state implies a socket");
                socket.send_string("Done")?;
                let items: Vec<ListItem> = arrays.into_iter().map(ListItem::Array).collect();
                socket.send_list(&items)
            }
            ClientCommand::SendInfo { path, xml } => {
                let socket = self.socket.as_mut().expect("running state implies a socket");
                socket.send_string("Info_xml")?;
                let path_items: Vec<ListItem> = path.into_iter().map(ListItem::Str).collect();
                socket.send_list(&path_items)?;
                socket.send_string(&xml)
            }
            ClientCommand::PositionIs(value) => {
                let socket = self.socket.as_mut().expect("running state implies a socket");
                socket.send_string("position_is")?;
                socket.send_scalar(value)
            }
            ClientCommand::MoveDone(value) => {
                let socket = self.socket.as_mut().expect("running state implies a socket");
                socket.send_string("move_done")?;
                socket.send_scalar(value)
            }
            ClientCommand::XAxis { data, label, units } => {
                let socket = self.socket.as_mut().expect("running state implies a socket");
                socket.send_string("x_axis")?;
                socket.send_array(&data)?;
                socket.send_string(&label)?;
                socket.send_string(&units)
            }
            ClientCommand::YAxis { data, label, units } => {
                let socket = self.socket.as_mut().expect("running state implies a socket");
                socket.send_string("y_axis")?;
                socket.send_array(&data)?;
                socket.send_string(&label)?;
                socket.send_string(&units)
            }
            ClientCommand::UpdateConnection { ip, port } => {
                self.config.server_ip = ip;
                self.config.port_id = port;
                Ok(())
            }
            ClientCommand::Quit => {
                self.close(emit);
                Ok(())
            }
        }
    }

    fn fail(&mut self, err: Error, emit: &mut impl FnMut(ClientEvent)) {
        debug!(?err, "daq-net: client connection failed, closing");
        emit(ClientEvent::Status(StatusLog::new(tracing::Level::WARN, err.to_string())));
        self.close(emit);
    }

    /// Tears the connection down. Idempotent: safe to call from any state.
    pub fn close(&mut self, emit: &mut impl FnMut(ClientEvent)) {
        self.state = ClientState::Closing;
        if let Some(mut socket) = self.socket.take() {
            if let Some(poll) = &self.poll {
                let _ = poll.registry().deregister(socket.stream_mut());
            }
            socket.close();
        }
        self.poll = None;
        self.state = ClientState::Terminated;
        emit(ClientEvent::Disconnected);
    }
}
