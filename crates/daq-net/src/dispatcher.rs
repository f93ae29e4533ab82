//! Per-command handlers for the closed vocabulary a connected peer may send.

use daq_proto::{CommandName, Error, ListItem, Result, Role, SettingsCodec};
use mio::Token;
use tracing::warn;

use crate::{events::ServerEvent, host::ServerExtension, registry::PeerEntry};

/// What the caller should do with the peer after a dispatch call.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Remove,
}

fn path_from_list(items: Vec<ListItem>) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| match item {
            ListItem::Str(s) => Ok(s),
            other => Err(Error::Protocol(format!("expected string path segment, got {other:?}"))),
        })
        .collect()
}

/// Handles one already-read command name for `entry`, consuming whatever
/// further framed values that command implies.
///
/// `S` is the settings-XML codec supplied by the host; `X` is the extension
/// hook for anything outside the built-in vocabulary.
pub fn dispatch<S: SettingsCodec, X: ServerExtension>(
    token: Token,
    entry: &mut PeerEntry,
    command: &str,
    max_frame_len: usize,
    ext: &mut X,
    emit: &mut impl FnMut(ServerEvent),
) -> Result<DispatchOutcome> {
    match CommandName::parse(command) {
        CommandName::Done => {
            let data = entry.socket.get_list(max_frame_len)?;
            ext.on_data_done(token, entry.role, data);
            Ok(DispatchOutcome::Continue)
        }
        CommandName::Infos => {
            let xml = entry.socket.get_string(max_frame_len)?;
            let tree = S::from_xml(&xml)?;
            entry.mirror.replace_settings_client(tree);
            Ok(DispatchOutcome::Continue)
        }
        CommandName::InfoXml => {
            let path = path_from_list(entry.socket.get_list(max_frame_len)?)?;
            let xml = entry.socket.get_string(max_frame_len)?;
            entry.mirror.apply_delta::<S>(&path, &xml)?;
            Ok(DispatchOutcome::Continue)
        }
        CommandName::Info => {
            let name = entry.socket.get_string(max_frame_len)?;
            let value = entry.socket.get_string(max_frame_len)?;
            entry.mirror.set_info(&name, &value);
            ext.on_read_info(token, entry.role, &name, &value);
            Ok(DispatchOutcome::Continue)
        }
        CommandName::PositionIs => {
            let value = entry.socket.get_scalar(max_frame_len)?;
            emit(ServerEvent::PositionIs { token, role: entry.role, value });
            Ok(DispatchOutcome::Continue)
        }
        CommandName::MoveDone => {
            let value = entry.socket.get_scalar(max_frame_len)?;
            emit(ServerEvent::MoveDone { token, role: entry.role, value });
            Ok(DispatchOutcome::Continue)
        }
        CommandName::Quit => Ok(DispatchOutcome::Remove),
        CommandName::SetInfo | CommandName::MoveAbs | CommandName::MoveRel | CommandName::XAxis
        | CommandName::YAxis => {
            // Server-to-client-only commands received in the wrong
            // direction; treat like any other unrecognized command rather
            // than tearing down the peer.
            warn!(role = %entry.role, %command, "daq-net: received a client-bound command on the server side");
            ext.on_unknown_command(token, entry.role, command);
            Ok(DispatchOutcome::Continue)
        }
        CommandName::Other(name) => {
            ext.on_unknown_command(token, entry.role, &name);
            Ok(DispatchOutcome::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    use daq_proto::{ParamGroup, ParamLeaf, ParamNode, ParamValue, Scalar};

    use super::*;
    use crate::socket::PeerSocket;

    struct ReflectCodec;

    impl SettingsCodec for ReflectCodec {
        fn to_xml(tree: &ParamGroup) -> String {
            let ParamNode::Leaf(leaf) = tree.children.values().next().unwrap() else {
                panic!("expected a single leaf")
            };
            format!("<leaf value=\"{}\"/>", leaf.value.as_int().unwrap())
        }

        fn from_xml(xml: &str) -> Result<ParamGroup> {
            let value: i64 = xml
                .split("value=\"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .ok_or_else(|| Error::Protocol("malformed test xml".into()))?
                .parse()
                .map_err(|_| Error::Protocol("non-integer test xml value".into()))?;
            let mut group = ParamGroup::new("delta");
            group.insert("leaf_x", ParamNode::Leaf(ParamLeaf::new("leaf_x", ParamValue::Int(value))));
            Ok(group)
        }
    }

    fn connected_pair() -> (PeerSocket, PeerSocket) {
        let listener = mio::net::TcpListener::bind(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::LOCALHOST,
            0,
        )))
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        client.set_nonblocking(true).unwrap();
        let (server_side, peer_addr) = listener.accept().unwrap();
        let client_side = mio::net::TcpStream::from_std(client);
        (
            PeerSocket::from_raw_for_test(server_side, peer_addr),
            PeerSocket::from_raw_for_test(client_side, addr),
        )
    }

    #[test]
    fn quit_returns_remove() {
        let (server_socket, _client_socket) = connected_pair();
        let mut entry = PeerEntry {
            role: Role::Grabber,
            socket: server_socket,
            mirror: daq_proto::SettingsMirror::new(),
        };
        let mut ext = crate::host::NoopExtension;
        let outcome = dispatch::<ReflectCodec, _>(
            mio::Token(0),
            &mut entry,
            "Quit",
            daq_proto::DEFAULT_MAX_FRAME_LEN,
            &mut ext,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome, DispatchOutcome::Remove);
    }

    #[test]
    fn info_xml_patches_mirror_leaf() {
        let (server_socket, mut client_socket) = connected_pair();
        let mut group_a = ParamGroup::new("group_a");
        group_a.insert("leaf_x", ParamNode::Leaf(ParamLeaf::new("leaf_x", ParamValue::Int(1))));
        let mut tree = ParamGroup::new("settings_client");
        tree.insert("group_a", ParamNode::Group(group_a));

        let mut entry =
            PeerEntry { role: Role::Actuator, socket: server_socket, mirror: daq_proto::SettingsMirror::new() };
        entry.mirror.replace_settings_client(tree);

        client_socket
            .send_list(&[
                daq_proto::ListItem::Str("root".into()),
                daq_proto::ListItem::Str("group_a".into()),
                daq_proto::ListItem::Str("leaf_x".into()),
            ])
            .unwrap();
        client_socket.send_string("<leaf value=\"42\"/>").unwrap();

        let mut ext = crate::host::NoopExtension;
        dispatch::<ReflectCodec, _>(
            mio::Token(0),
            &mut entry,
            "Info_xml",
            daq_proto::DEFAULT_MAX_FRAME_LEN,
            &mut ext,
            &mut |_| {},
        )
        .unwrap();

        let leaf = entry
            .mirror
            .settings_client
            .group_at(&["group_a".into()])
            .unwrap()
            .get("leaf_x")
            .unwrap();
        assert_eq!(leaf, &ParamNode::Leaf(ParamLeaf::new("leaf_x", ParamValue::Int(42))));
    }

    #[test]
    fn position_is_emits_event() {
        let (server_socket, mut client_socket) = connected_pair();
        client_socket.send_scalar(Scalar::F8(3.25)).unwrap();
        let mut entry =
            PeerEntry { role: Role::Actuator, socket: server_socket, mirror: daq_proto::SettingsMirror::new() };
        let mut ext = crate::host::NoopExtension;
        let mut captured = None;
        dispatch::<ReflectCodec, _>(
            mio::Token(7),
            &mut entry,
            "position_is",
            daq_proto::DEFAULT_MAX_FRAME_LEN,
            &mut ext,
            &mut |ev| captured = Some(ev),
        )
        .unwrap();
        match captured.unwrap() {
            ServerEvent::PositionIs { token, role, value } => {
                assert_eq!(token, mio::Token(7));
                assert_eq!(role, Role::Actuator);
                assert_eq!(value, Scalar::F8(3.25));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
