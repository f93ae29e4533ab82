//! The closed command vocabulary exchanged once a peer is attached.
//!
//! Commands travel as plain strings on the wire (a `send_string`/`get_string`
//! frame). This type gives the closed set a name and a typed escape hatch
//! (`Other`) for anything outside it, which callers route to
//! `ServerExtension::on_unknown_command` rather than treating as a protocol
//! error.

use std::fmt;

/// Server-to-client and client-to-server command names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// Server → client: acknowledges a completed action with no payload.
    Done,
    /// Client → server: upload of the full settings tree (as XML).
    Infos,
    /// Client → server: a single free-form `(name, value)` info pair.
    Info,
    /// Client → server: a single settings-tree leaf delta (as XML).
    InfoXml,
    /// Client → server (actuator): current position, followed by a scalar.
    PositionIs,
    /// Client → server (actuator): a move has completed, followed by a scalar.
    MoveDone,
    /// Either direction: orderly shutdown request.
    Quit,
    /// Client → server: push a settings-tree leaf value, followed by an
    /// `Info_xml`-shaped path/value pair.
    SetInfo,
    /// Server → client (actuator): absolute move request, followed by a scalar.
    MoveAbs,
    /// Server → client (actuator): relative move request, followed by a scalar.
    MoveRel,
    /// Server → client (grabber): request a frame along the x axis.
    XAxis,
    /// Server → client (grabber): request a frame along the y axis.
    YAxis,
    /// Anything outside the closed vocabulary above.
    Other(String),
}

impl CommandName {
    pub fn as_str(&self) -> &str {
        match self {
            CommandName::Done => "Done",
            CommandName::Infos => "Infos",
            CommandName::Info => "Info",
            CommandName::InfoXml => "Info_xml",
            CommandName::PositionIs => "position_is",
            CommandName::MoveDone => "move_done",
            CommandName::Quit => "Quit",
            CommandName::SetInfo => "set_info",
            CommandName::MoveAbs => "move_abs",
            CommandName::MoveRel => "move_rel",
            CommandName::XAxis => "x_axis",
            CommandName::YAxis => "y_axis",
            CommandName::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Done" => CommandName::Done,
            "Infos" => CommandName::Infos,
            "Info" => CommandName::Info,
            "Info_xml" => CommandName::InfoXml,
            "position_is" => CommandName::PositionIs,
            "move_done" => CommandName::MoveDone,
            "Quit" => CommandName::Quit,
            "set_info" => CommandName::SetInfo,
            "move_abs" => CommandName::MoveAbs,
            "move_rel" => CommandName::MoveRel,
            "x_axis" => CommandName::XAxis,
            "y_axis" => CommandName::YAxis,
            other => CommandName::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CommandName {
    fn from(s: &str) -> Self {
        CommandName::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_round_trip_through_as_str() {
        for cmd in [
            CommandName::Done,
            CommandName::Infos,
            CommandName::Info,
            CommandName::InfoXml,
            CommandName::PositionIs,
            CommandName::MoveDone,
            CommandName::Quit,
            CommandName::SetInfo,
            CommandName::MoveAbs,
            CommandName::MoveRel,
            CommandName::XAxis,
            CommandName::YAxis,
        ] {
            assert_eq!(CommandName::parse(cmd.as_str()), cmd);
        }
    }

    #[test]
    fn unrecognized_command_becomes_other() {
        let cmd = CommandName::parse("frobnicate");
        assert_eq!(cmd, CommandName::Other("frobnicate".into()));
        assert_eq!(cmd.as_str(), "frobnicate");
    }
}
