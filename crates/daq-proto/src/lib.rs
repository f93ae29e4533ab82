//! Wire framing, command vocabulary, and settings-mirror types for the
//! instrument TCP bridge. Transport-agnostic: every type here works equally
//! over a live socket or an in-memory buffer, which is what lets `daq-net`
//! test its dispatch logic without binding a port.

mod command;
mod error;
mod frame;
mod mirror;
mod role;

pub use command::CommandName;
pub use error::{Error, Result};
pub use frame::{
    get_array, get_list, get_scalar, get_string, send_array, send_list, send_scalar, send_string,
    Array, ArrayData, ListItem, Scalar, DEFAULT_MAX_FRAME_LEN,
};
pub use mirror::{ParamGroup, ParamLeaf, ParamNode, ParamValue, SettingsCodec, SettingsMirror};
pub use role::Role;
