//! The thin surface the server engine requires from its host, replacing the
//! source protocol's `TCPServer` abstract base and its
//! `command_to_from_client` override hook with composition.

use daq_proto::{ListItem, Role};
use mio::Token;

/// Extension points a server host implements to react to commands the
/// dispatcher can't fully resolve on its own.
///
/// All methods have no-op defaults: a host that only cares about one hook
/// overrides just that one.
pub trait ServerExtension {
    /// A command name outside the closed vocabulary arrived from `token`.
    /// Default: silently ignored (the dispatch loop must not break on it).
    fn on_unknown_command(&mut self, token: Token, role: Role, command: &str) {
        let _ = (token, role, command);
    }

    /// `"Done"` was received and its data list has been read off the wire.
    fn on_data_done(&mut self, token: Token, role: Role, data: Vec<ListItem>) {
        let _ = (token, role, data);
    }

    /// `"Info"` updated (or added) a free-form key/value pair.
    fn on_read_info(&mut self, token: Token, role: Role, name: &str, value: &str) {
        let _ = (token, role, name, value);
    }
}

/// A host extension that does nothing; useful for tests and for servers that
/// only want the built-in command handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExtension;

impl ServerExtension for NoopExtension {}
