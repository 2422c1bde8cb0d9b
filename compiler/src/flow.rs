// flow.rs — Dataflow netlist: the input of synthesis
//
// A `Func` is a set of named nets plus guarded, mutually exclusive
// conditions (branches). Nets and conditions live in append-only arenas; a
// net's position is its permanent `NetId`. Every condition also owns a
// synthetic `Cond` net (`case_<n>`) that carries its readiness once
// synthesized.
//
// Preconditions: none; callers build a `Func` through `push_net`,
//   `push_cond`, and the `req`/`mem`/`ack` accessors.
// Postconditions: arena indices are never reused or reordered.
// Failure modes: indexing with a foreign id panics, like slice indexing.
//   `check::check_func` reports every cross-reference violation.
// Side effects: none.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, NameLookup};
use crate::id::{CondId, NetId};

/// Expression over dataflow nets.
pub type FlowExpr = Expr<NetId>;

// ── Types and purposes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Bits,
    Fixed,
}

/// Value type of a net: a tag, a bit width, and a fixed-point scaling shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub width: u32,
    pub shift: i32,
}

impl Type {
    pub fn bits(width: u32) -> Self {
        Type {
            kind: TypeKind::Bits,
            width,
            shift: 0,
        }
    }

    pub fn fixed(width: u32) -> Self {
        Type {
            kind: TypeKind::Fixed,
            width,
            shift: 0,
        }
    }

    pub fn with_shift(mut self, shift: i32) -> Self {
        self.shift = shift;
        self
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::fixed(16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    /// Declared but not part of any channel (e.g. defined on lookup).
    None,
    /// Input channel, consumed by acknowledging it.
    In,
    /// Output channel, produced by requesting it.
    Out,
    /// Internal state register.
    Reg,
    /// Synthetic per-condition net.
    Cond,
}

impl Purpose {
    /// Nets whose value an expression may read.
    pub fn is_readable(self) -> bool {
        matches!(self, Purpose::In | Purpose::Reg)
    }

    pub fn describe(self) -> &'static str {
        match self {
            Purpose::None => "an unbound net",
            Purpose::In => "an input",
            Purpose::Out => "an output",
            Purpose::Reg => "a register",
            Purpose::Cond => "a condition net",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    pub ty: Type,
    pub purpose: Purpose,
}

impl Default for Net {
    fn default() -> Self {
        Net::new("", Type::bits(1), Purpose::None)
    }
}

impl Net {
    pub fn new(name: impl Into<String>, ty: Type, purpose: Purpose) -> Self {
        Net {
            name: name.into(),
            ty,
            purpose,
        }
    }
}

// ── Conditions ─────────────────────────────────────────────────────────────

/// A guarded transaction: when `valid` holds and every channel it touches
/// is ready, it sends `outs`, updates `regs`, and consumes `ins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    uid: NetId,
    valid: FlowExpr,
    outs: Vec<(NetId, FlowExpr)>,
    regs: Vec<(NetId, FlowExpr)>,
    ins: Vec<NetId>,
}

impl Condition {
    fn new(uid: NetId, valid: FlowExpr) -> Self {
        Condition {
            uid,
            valid,
            outs: Vec::new(),
            regs: Vec::new(),
            ins: Vec::new(),
        }
    }

    /// The backing `Cond` net.
    pub fn uid(&self) -> NetId {
        self.uid
    }

    pub fn valid(&self) -> &FlowExpr {
        &self.valid
    }

    pub fn outs(&self) -> &[(NetId, FlowExpr)] {
        &self.outs
    }

    pub fn regs(&self) -> &[(NetId, FlowExpr)] {
        &self.regs
    }

    pub fn ins(&self) -> &[NetId] {
        &self.ins
    }

    /// Request that output `out` send `value` when this branch fires.
    pub fn req(&mut self, out: NetId, value: impl Into<FlowExpr>) -> &mut Self {
        self.outs.push((out, value.into()));
        self
    }

    /// Write `value` into register `reg` when this branch fires.
    pub fn mem(&mut self, reg: NetId, value: impl Into<FlowExpr>) -> &mut Self {
        self.regs.push((reg, value.into()));
        self
    }

    /// Consume input `input` when this branch fires.
    pub fn ack(&mut self, input: NetId) -> &mut Self {
        self.ins.push(input);
        self
    }

    pub fn ack_all(&mut self, inputs: impl IntoIterator<Item = NetId>) -> &mut Self {
        self.ins.extend(inputs);
        self
    }
}

// ── Function ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    nets: Vec<Net>,
    conds: Vec<Condition>,
}

impl Func {
    pub fn new(name: impl Into<String>) -> Self {
        Func {
            name: name.into(),
            nets: Vec::new(),
            conds: Vec::new(),
        }
    }

    pub fn push_net(&mut self, name: impl Into<String>, ty: Type, purpose: Purpose) -> NetId {
        let id = NetId::from_index(self.nets.len());
        self.nets.push(Net::new(name, ty, purpose));
        id
    }

    /// Append a condition guarded by `valid`, together with its backing
    /// `case_<n>` net.
    pub fn push_cond(&mut self, valid: impl Into<FlowExpr>) -> CondId {
        let id = CondId::from_index(self.conds.len());
        let uid = self.push_net(format!("case_{}", id.0), Type::bits(1), Purpose::Cond);
        self.conds.push(Condition::new(uid, valid.into()));
        id
    }

    pub fn net_index(&self, name: &str) -> Option<NetId> {
        self.nets
            .iter()
            .position(|n| n.name == name)
            .map(NetId::from_index)
    }

    /// Look up `name`, defining an unbound 1-bit net when it is missing.
    pub fn net_index_or_define(&mut self, name: &str) -> NetId {
        match self.net_index(name) {
            Some(id) => id,
            None => self.push_net(name, Type::bits(1), Purpose::None),
        }
    }

    pub fn net_at(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id.index())
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn iter_nets(&self) -> impl Iterator<Item = (NetId, &Net)> + '_ {
        self.nets
            .iter()
            .enumerate()
            .map(|(i, n)| (NetId::from_index(i), n))
    }

    pub fn cond(&self, id: CondId) -> Option<&Condition> {
        self.conds.get(id.index())
    }

    pub fn cond_mut(&mut self, id: CondId) -> Option<&mut Condition> {
        self.conds.get_mut(id.index())
    }

    pub fn conds(&self) -> &[Condition] {
        &self.conds
    }

    pub fn iter_conds(&self) -> impl Iterator<Item = (CondId, &Condition)> + '_ {
        self.conds
            .iter()
            .enumerate()
            .map(|(i, c)| (CondId::from_index(i), c))
    }
}

impl Index<NetId> for Func {
    type Output = Net;

    fn index(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }
}

impl Index<CondId> for Func {
    type Output = Condition;

    fn index(&self, id: CondId) -> &Condition {
        &self.conds[id.index()]
    }
}

impl IndexMut<CondId> for Func {
    fn index_mut(&mut self, id: CondId) -> &mut Condition {
        &mut self.conds[id.index()]
    }
}

impl NameLookup<NetId> for Func {
    fn name_of(&self, id: NetId) -> Option<&str> {
        self.net_at(id).map(|n| n.name.as_str())
    }
}
