//! Request/response codec for the device's nested `pn`/`pv`/`pch`
//! attribute trees.
//!
//! Writes are described as a flat list of [`Attribute`]s and merged into
//! one request tree per destination; reads walk the response tree by a
//! key path. The tree is rebuilt per command, so everything stays
//! allocation-light and insertion-ordered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::OP_WRITE;
use crate::{Error, Result};

/// A single leaf write target, consumed once during serialization.
#[derive(Debug, Clone)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: String,
    pub path: Vec<String>,
    pub to: String,
}

impl Attribute {
    pub fn new(name: &str, value: &str, path: &[&str], to: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
            to: to.to_string(),
        }
    }
}

/// One node of an attribute tree. Leaves carry `pv`; interior nodes
/// carry children in `pch`. First match by `pn` wins on lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Node {
    pub pn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pch: Vec<Node>,
}

impl Node {
    fn named(pn: &str) -> Self {
        Self {
            pn: pn.to_string(),
            pv: None,
            pch: Vec::new(),
        }
    }

    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.pch.iter().find(|c| c.pn == name)
    }

    fn find_or_insert_child(&mut self, name: &str) -> &mut Node {
        if let Some(idx) = self.pch.iter().position(|c| c.pn == name) {
            &mut self.pch[idx]
        } else {
            self.pch.push(Node::named(name));
            self.pch.last_mut().unwrap()
        }
    }

    /// True if any leaf in this subtree satisfies the predicate.
    pub fn any_leaf(&self, pred: &dyn Fn(&str) -> bool) -> bool {
        if self.pv.is_some() && pred(&self.pn) {
            return true;
        }
        self.pch.iter().any(|c| c.any_leaf(pred))
    }

    /// Drop leaves failing the predicate; interior nodes are kept so the
    /// remaining leaves stay addressable at their original paths.
    pub fn retain_leaves(&mut self, keep: &dyn Fn(&str) -> bool) {
        self.pch.retain(|c| c.pv.is_none() || keep(&c.pn));
        for child in &mut self.pch {
            child.retain_leaves(keep);
        }
    }
}

/// One write request block: `{"op":3,"to":...,"pc":{...}}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct WriteBlock {
    pub op: u8,
    pub to: String,
    pub pc: Node,
}

/// Root node name derived from the destination, e.g.
/// `/dsiot/edge/adr_0100.dgc_status` -> `dgc_status`.
fn root_name(to: &str) -> &str {
    let last = to.rsplit('/').next().unwrap_or(to);
    last.rsplit('.').next().unwrap_or(last)
}

/// Merge a flat list of writes into deduplicated request trees: one block
/// per destination, one node per `pn` at each level, last write wins per
/// leaf. The device rejects duplicate siblings, so merging is mandatory.
pub(crate) fn serialize_writes(attributes: &[Attribute]) -> Vec<WriteBlock> {
    let mut blocks: Vec<WriteBlock> = Vec::new();
    for attr in attributes {
        let block = match blocks.iter_mut().find(|b| b.to == attr.to) {
            Some(b) => b,
            None => {
                blocks.push(WriteBlock {
                    op: OP_WRITE,
                    to: attr.to.clone(),
                    pc: Node::named(root_name(&attr.to)),
                });
                blocks.last_mut().unwrap()
            }
        };
        let mut node = &mut block.pc;
        for key in &attr.path {
            node = node.find_or_insert_child(key);
        }
        match node.pch.iter_mut().find(|c| c.pn == attr.name) {
            Some(leaf) => leaf.pv = Some(Value::String(attr.value.clone())),
            None => node.pch.push(Node {
                pn: attr.name.clone(),
                pv: Some(Value::String(attr.value.clone())),
                pch: Vec::new(),
            }),
        }
    }
    blocks
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub responses: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseBlock {
    pub fr: String,
    #[serde(default)]
    pub rsc: Option<u16>,
    #[serde(default)]
    pub pc: Option<Node>,
}

/// Walk `keys` depth-first through the blocks originating from `fr` and
/// return the matched leaf's raw value. Each level matches by `pn`,
/// first match wins. Missing keys are a per-field condition
/// ([`Error::KeyNotFound`]), expected for sparse mode-dependent fields.
pub(crate) fn find_value<'a>(
    env: &'a ResponseEnvelope,
    fr: &str,
    keys: &[&str],
) -> Result<&'a Value> {
    let mut level: Vec<&'a Node> = env
        .responses
        .iter()
        .filter(|b| b.fr == fr)
        .filter_map(|b| b.pc.as_ref())
        .collect();
    let mut matched: Option<&'a Node> = None;
    for key in keys {
        matched = level.iter().copied().find(|n| n.pn == *key);
        let node = matched.ok_or_else(|| Error::KeyNotFound((*key).to_string()))?;
        level = node.pch.iter().collect();
    }
    matched
        .and_then(|n| n.pv.as_ref())
        .ok_or_else(|| Error::KeyNotFound(keys.join("/")))
}

pub(crate) fn find_str<'a>(
    env: &'a ResponseEnvelope,
    fr: &str,
    keys: &[&str],
) -> Result<&'a str> {
    match find_value(env, fr, keys)? {
        Value::String(s) => Ok(s.as_str()),
        other => Err(Error::Protocol(format!(
            "expected string value at {}: {other}",
            keys.join("/")
        ))),
    }
}
