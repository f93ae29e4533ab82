//! The settings mirror: a nested tagged-variant tree (leaf vs. group)
//! replicated between a client's authoritative settings and the server's
//! per-peer copy.
//!
//! The mirror itself never touches XML — that's an external collaborator's
//! job (`SettingsCodec`). This module only knows how to store, address, and
//! compare the tree.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A leaf's current/default value. Intentionally small: the framework
/// widget this mirrors (a parameter-tree) deals in a handful of primitive
/// kinds plus strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// A single option: declared type (implicit in `value`'s variant), current
/// value, default, and display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLeaf {
    pub title: String,
    pub value: ParamValue,
    pub default: ParamValue,
    pub read_only: bool,
}

impl ParamLeaf {
    pub fn new(title: impl Into<String>, value: ParamValue) -> Self {
        let title = title.into();
        Self { title, default: value.clone(), value, read_only: false }
    }
}

/// An ordered subgroup of named nodes. `IndexMap` preserves insertion order,
/// which matters for round-tripping through a widget that displays children
/// top to bottom in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamGroup {
    pub title: String,
    pub children: IndexMap<String, ParamNode>,
}

impl ParamGroup {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), children: IndexMap::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, node: ParamNode) {
        self.children.insert(name.into(), node);
    }

    pub fn get(&self, name: &str) -> Option<&ParamNode> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParamNode> {
        self.children.get_mut(name)
    }

    /// Walks `path` through nested groups, returning the group at the end.
    /// An empty path returns `self`.
    pub fn group_at(&self, path: &[String]) -> Result<&ParamGroup> {
        let mut current = self;
        for segment in path {
            current = match current.children.get(segment) {
                Some(ParamNode::Group(g)) => g,
                Some(ParamNode::Leaf(_)) => {
                    return Err(Error::Protocol(format!("{segment:?} is a leaf, not a group")));
                }
                None => return Err(Error::Protocol(format!("no such group {segment:?}"))),
            };
        }
        Ok(current)
    }

    pub fn group_at_mut(&mut self, path: &[String]) -> Result<&mut ParamGroup> {
        let mut current = self;
        for segment in path {
            current = match current.children.get_mut(segment) {
                Some(ParamNode::Group(g)) => g,
                Some(ParamNode::Leaf(_)) => {
                    return Err(Error::Protocol(format!("{segment:?} is a leaf, not a group")));
                }
                None => return Err(Error::Protocol(format!("no such group {segment:?}"))),
            };
        }
        Ok(current)
    }

    /// Finds the leaf at `parent_path / leaf_name`, creating intermediate
    /// groups as needed — mirrors the source's "first `Infos` creates the
    /// subtree" behavior for deltas that arrive before a full upload.
    pub fn leaf_mut(&mut self, parent_path: &[String], leaf_name: &str) -> Result<&mut ParamLeaf> {
        let group = self.group_at_mut(parent_path)?;
        match group.children.get_mut(leaf_name) {
            Some(ParamNode::Leaf(leaf)) => Ok(leaf),
            Some(ParamNode::Group(_)) => {
                Err(Error::Protocol(format!("{leaf_name:?} is a group, not a leaf")))
            }
            None => Err(Error::Protocol(format!("no such leaf {leaf_name:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamNode {
    Leaf(ParamLeaf),
    Group(ParamGroup),
}

/// The external collaborator contract for settings XML. Production
/// deployments back this with whatever parameter-tree widget they use; the
/// protocol only ever round-trips opaque XML strings through it.
pub trait SettingsCodec {
    fn to_xml(tree: &ParamGroup) -> String;
    fn from_xml(xml: &str) -> Result<ParamGroup>;
}

/// The server-side replica of one peer's settings, keyed by the well-known
/// top-level slots the source protocol uses.
#[derive(Debug, Clone, Default)]
pub struct SettingsMirror {
    /// Mirrors the connected client's full settings tree, replaced wholesale
    /// on `Infos` and patched leaf-by-leaf on `Info_xml`.
    pub settings_client: ParamGroup,
    /// Free-form key/value pairs pushed by non-framework clients via `Info`.
    pub infos: ParamGroup,
}

impl SettingsMirror {
    pub fn new() -> Self {
        Self { settings_client: ParamGroup::new("settings_client"), infos: ParamGroup::new("infos") }
    }

    /// `"Infos"`: wholesale replace of `settings_client`.
    pub fn replace_settings_client(&mut self, tree: ParamGroup) {
        self.settings_client = tree;
    }

    /// `"Info_xml"`: patch a single leaf. `path` includes the repeated
    /// mirror-root element as its first segment, which is dropped.
    pub fn apply_delta<C: SettingsCodec>(&mut self, path: &[String], xml: &str) -> Result<()> {
        let Some((leaf_name, parent_path)) = path.split_last() else {
            return Err(Error::Protocol("empty settings delta path".into()));
        };
        // path[0] repeats the mirror root ("settings_client"); drop it.
        let parent_path = if parent_path.is_empty() { parent_path } else { &parent_path[1..] };
        let delivered = C::from_xml(xml)?;
        let leaf = self.settings_client.leaf_mut(parent_path, leaf_name)?;
        let Some(ParamNode::Leaf(new_leaf)) = delivered.children.into_values().next() else {
            return Err(Error::Protocol("settings delta xml did not decode to a single leaf".into()));
        };
        *leaf = new_leaf;
        Ok(())
    }

    /// `"Info"`: add-or-update a free-form string leaf.
    pub fn set_info(&mut self, name: &str, value: &str) {
        match self.infos.children.get_mut(name) {
            Some(ParamNode::Leaf(leaf)) => leaf.value = ParamValue::Str(value.to_owned()),
            _ => {
                self.infos.insert(name, ParamNode::Leaf(ParamLeaf::new(name, ParamValue::Str(value.to_owned()))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: i64) -> ParamNode {
        ParamNode::Leaf(ParamLeaf::new("leaf_x", ParamValue::Int(value)))
    }

    #[test]
    fn replace_then_patch_leaf() {
        let mut mirror = SettingsMirror::new();
        let mut group_a = ParamGroup::new("group_a");
        group_a.insert("leaf_x", leaf(1));
        let mut tree = ParamGroup::new("settings_client");
        tree.insert("group_a", ParamNode::Group(group_a));
        mirror.replace_settings_client(tree);

        assert_eq!(
            mirror.settings_client.group_at(&["group_a".into()]).unwrap().get("leaf_x"),
            Some(&leaf(1))
        );

        struct TestCodec;
        impl SettingsCodec for TestCodec {
            fn to_xml(tree: &ParamGroup) -> String {
                let ParamNode::Leaf(leaf) = tree.children.values().next().unwrap() else {
                    panic!("expected leaf")
                };
                format!("<leaf value=\"{}\"/>", leaf.value.as_int().unwrap())
            }
            fn from_xml(xml: &str) -> Result<ParamGroup> {
                let value: i64 = xml
                    .split("value=\"")
                    .nth(1)
                    .and_then(|rest| rest.split('"').next())
                    .unwrap()
                    .parse()
                    .unwrap();
                let mut g = ParamGroup::new("delta");
                g.insert("leaf_x", leaf(value));
                Ok(g)
            }
        }

        let path = vec!["root".to_string(), "group_a".to_string(), "leaf_x".to_string()];
        mirror.apply_delta::<TestCodec>(&path, "<leaf value=\"42\"/>").unwrap();

        assert_eq!(
            mirror.settings_client.group_at(&["group_a".into()]).unwrap().get("leaf_x"),
            Some(&leaf(42))
        );
    }

    #[test]
    fn set_info_adds_then_updates() {
        let mut mirror = SettingsMirror::new();
        mirror.set_info("firmware", "1.0");
        assert_eq!(
            mirror.infos.get("firmware"),
            Some(&ParamNode::Leaf(ParamLeaf::new("firmware", ParamValue::Str("1.0".into()))))
        );
        mirror.set_info("firmware", "1.1");
        assert_eq!(
            mirror.infos.get("firmware"),
            Some(&ParamNode::Leaf(ParamLeaf::new("firmware", ParamValue::Str("1.1".into()))))
        );
    }
}
