//! Lowered node specifications.
//!
//! A [`NodeSpec`] describes one interpreter node class: its child slots and
//! what `execute` does. Specs are plain data, derived from the AST on every
//! run and serialisable as they are.

use super::layout::{Location, SlotKind};
use crate::ast::{Arity, Origin};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Name of the declaration this node was lowered from.
    pub name: String,
    pub class_name: String,
    pub kind: SpecKind,
    pub children: Vec<ChildSlot>,
    /// Class of the value `execute` returns.
    pub returns: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub supertype: Option<String>,
    pub aliases: Vec<String>,
    pub body: NodeBody,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    /// Transition rules left out of the body.
    pub skipped_transitions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecKind {
    Funcon,
    Datatype,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSlot {
    pub name: String,
    pub kind: SlotKind,
    pub arity: Arity,
    pub class: String,
    pub lazy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NodeBody {
    /// Signature only.
    Interface,
    Unconditional(Value),
    /// Branches tried in order; the first whose conditions hold wins.
    Dispatch(Vec<Branch>),
    /// Constructors of a datatype.
    Constructors(Vec<Constructor>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub conditions: Vec<Condition>,
    pub result: Value,
    /// The rule the branch was compiled from.
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    pub name: String,
    pub class_name: String,
    pub children: Vec<ChildSlot>,
}

/// A runtime value reachable from the node's children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Access {
    Child { slot: usize },
    Element { of: Box<Access>, index: usize },
    FromEnd { of: Box<Access>, back: usize },
    /// Child slot of a value known to be a `class` node.
    Field { of: Box<Access>, class: String, slot: usize },
}

impl Access {
    pub fn child(slot: usize) -> Self {
        Access::Child { slot }
    }

    /// The slot `slot` of the node at `base`, or of the current node.
    pub fn slot_of(base: Option<&(Access, String)>, slot: usize) -> Self {
        match base {
            None => Access::child(slot),
            Some((of, class)) => Access::Field {
                of: Box::new(of.clone()),
                class: class.clone(),
                slot,
            },
        }
    }

    /// Resolves a layout location relative to `base`.
    pub fn locate(base: Option<&(Access, String)>, location: Location) -> Self {
        match location {
            Location::Regular(slot) | Location::Final { slot, .. } => Self::slot_of(base, slot),
            Location::Vararg { slot, offset } => Access::Element {
                of: Box::new(Self::slot_of(base, slot)),
                index: offset,
            },
            Location::VarargFromEnd { slot, back } => Access::FromEnd {
                of: Box::new(Self::slot_of(base, slot)),
                back,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    VarargEmpty {
        at: Access,
    },
    VarargLength {
        at: Access,
        len: usize,
        at_least: bool,
    },
    Equals {
        at: Access,
        value: Value,
    },
    HasType {
        at: Access,
        class: String,
    },
    /// Two occurrences of one pattern variable must be equal.
    Equivalent {
        left: Access,
        right: Access,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Field { at: Access },
    /// The whole vararg array, spread.
    Spread { at: Access },
    /// The vararg array without `from` leading and `back` trailing items.
    Slice { at: Access, from: usize, back: usize },
    /// Several runs of arguments spread one after the other.
    Sequence { items: Vec<Value> },
    Construct { class: String, args: Vec<Value> },
    /// A constant of the declared return type.
    Literal { class: String, text: String },
    /// A constant compared against in a condition.
    Atom { name: String },
    Number { value: i64 },
    Text { value: String },
    Tuple { items: Vec<Value> },
    List { items: Vec<Value> },
    Map { entries: Vec<(Value, Value)> },
}
