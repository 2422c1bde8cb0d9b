// probe.rs — Probe Rewriter
//
// Translates an expression over dataflow nets into one over clocked wires.
// Plain reads become the channel's data wire. Probed reads become the data
// wire too, but each probe leaves a pending obligation that its channel be
// valid; the obligation is discharged at the nearest enclosing scope
// boundary (`|`, `||`, `&`) by conjoining the valid wires there, or at the
// root when no boundary encloses it. A whole expression that is a single
// probe is a validity test and becomes the valid wire itself.
//
// Preconditions: `bindings` maps every net the expression mentions.
// Postconditions: the result is minimized; every data wire read through a
//   probe sits under a conjunction with that channel's valid wire at its
//   nearest enclosing boundary.
// Failure modes: E0301 for a probe with no valid wire, E0302 for a read with
//   no data wire.
// Side effects: trace-level logging of each resolution.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::clocked::{ClkExpr, Channel};
use crate::diag::{codes, Diagnostic, Subject};
use crate::expr::{Expr, Op};
use crate::flow::FlowExpr;
use crate::id::{ClkNetId, NetId};

// ── Bindings ───────────────────────────────────────────────────────────────

/// Valid and data wire tables, keyed by source net.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeBindings {
    valid: BTreeMap<NetId, ClkNetId>,
    data: BTreeMap<NetId, ClkNetId>,
}

impl ProbeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind readable channels: inputs get valid and data, registers data only.
    pub fn from_channels(chans: &[Channel]) -> Self {
        let mut bindings = Self::new();
        for (i, chan) in chans.iter().enumerate() {
            let net = NetId::from_index(i);
            match *chan {
                Channel::In { valid, data, .. } => {
                    bindings.bind_valid(net, valid);
                    bindings.bind_data(net, data);
                }
                Channel::Reg { data } => bindings.bind_data(net, data),
                _ => {}
            }
        }
        bindings
    }

    pub fn bind_valid(&mut self, net: NetId, wire: ClkNetId) {
        self.valid.insert(net, wire);
    }

    pub fn bind_data(&mut self, net: NetId, wire: ClkNetId) {
        self.data.insert(net, wire);
    }

    pub fn valid(&self, net: NetId) -> Option<ClkNetId> {
        self.valid.get(&net).copied()
    }

    pub fn data(&self, net: NetId) -> Option<ClkNetId> {
        self.data.get(&net).copied()
    }
}

// ── Public entry point ─────────────────────────────────────────────────────

pub fn rewrite_probes(expr: &FlowExpr, bindings: &ProbeBindings) -> Result<ClkExpr, Diagnostic> {
    let rewriter = ProbeRewriter { bindings };
    if let Expr::Probe(net) = expr {
        trace!("bare probe of {} is a validity test", net);
        return rewriter.valid_of(*net).map(Expr::var);
    }
    let (rewritten, pending) = rewriter.rewrite(expr)?;
    let resolved = rewriter.resolve(rewritten, &pending, "root")?;
    Ok(resolved.minimize())
}

/// Whether `op` discharges the probes pending beneath it.
pub fn is_scope_boundary(op: Op) -> bool {
    matches!(op, Op::Or | Op::BitOr | Op::BitAnd)
}

// ── Rewriter ───────────────────────────────────────────────────────────────

struct ProbeRewriter<'a> {
    bindings: &'a ProbeBindings,
}

impl ProbeRewriter<'_> {
    /// Post-order rewrite returning the clocked expression and the probes
    /// still awaiting a validity guard.
    fn rewrite(&self, expr: &FlowExpr) -> Result<(ClkExpr, BTreeSet<NetId>), Diagnostic> {
        match expr {
            Expr::Bool(b) => Ok((Expr::Bool(*b), BTreeSet::new())),
            Expr::Int(n) => Ok((Expr::Int(*n), BTreeSet::new())),
            Expr::Var(net) => Ok((Expr::var(self.data_of(*net)?), BTreeSet::new())),
            Expr::Probe(net) => {
                // Fail early on a probe that can never be guarded.
                self.valid_of(*net)?;
                Ok((Expr::var(self.data_of(*net)?), BTreeSet::from([*net])))
            }
            Expr::Op(op, args) => {
                let mut pending = BTreeSet::new();
                let mut rewritten = Vec::with_capacity(args.len());
                for arg in args {
                    let (e, p) = self.rewrite(arg)?;
                    rewritten.push(e);
                    pending.extend(p);
                }
                let node = Expr::Op(*op, rewritten);
                if is_scope_boundary(*op) && !pending.is_empty() {
                    let guarded = self.resolve(node, &pending, op.symbol())?;
                    Ok((guarded, BTreeSet::new()))
                } else {
                    Ok((node, pending))
                }
            }
        }
    }

    /// Conjoin the valid wire of every pending probe with `node`.
    fn resolve(
        &self,
        node: ClkExpr,
        pending: &BTreeSet<NetId>,
        scope: &str,
    ) -> Result<ClkExpr, Diagnostic> {
        if pending.is_empty() {
            return Ok(node);
        }
        let mut terms = Vec::with_capacity(pending.len() + 1);
        for &net in pending {
            trace!("probe of {} resolved at `{}`", net, scope);
            terms.push(Expr::var(self.valid_of(net)?));
        }
        terms.push(node);
        Ok(Expr::all(terms))
    }

    fn valid_of(&self, net: NetId) -> Result<ClkNetId, Diagnostic> {
        self.bindings.valid(net).ok_or_else(|| {
            Diagnostic::error(codes::E0301, format!("probe of {} has no valid wire", net))
                .with_subject(Subject::Net(net))
                .with_hint("only input nets can be probed")
        })
    }

    fn data_of(&self, net: NetId) -> Result<ClkNetId, Diagnostic> {
        self.bindings.data(net).ok_or_else(|| {
            Diagnostic::error(codes::E0302, format!("read of {} has no data wire", net))
                .with_subject(Subject::Net(net))
                .with_hint("expressions may only read input and register nets")
        })
    }
}
