// synth.rs — Branch Synthesizer
//
// Lowers a dataflow `Func` into a clocked valid/ready `Module`. Every source
// net gets a channel; every condition becomes one guarded rule of the
// module's clocked block, tagged with its position in a `branch_id`
// arbitration register. A branch only reports ready to the inputs it
// acknowledges while `branch_id` selects it, so no two branches can consume
// the same input token.
//
// Preconditions: none; `check::check_func` runs first.
// Postconditions: `module.chans()` is index-aligned with `func.nets()`;
//   the block has one rule per condition, in declaration order.
// Failure modes: structural errors from the check, arbitration errors
//   (no conditions), and unresolved probes, all returned as `SynthError`.
// Side effects: debug-level logging per branch and input.

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::channel::build_channel;
use crate::check::check_func;
use crate::clocked::{self, Assign, Channel, ClkExpr, Module, ModuleBuilder, Rule};
use crate::diag::{codes, has_errors, Diagnostic, Subject, SynthError};
use crate::expr::{Expr, Op};
use crate::flow::{Condition, FlowExpr, Func, Purpose};
use crate::id::{ClkNetId, CondId, NetId};
use crate::probe::{rewrite_probes, ProbeBindings};
use crate::scan::nets_read_by;

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthOptions {
    /// Emit a `__<net>_ok` wire per output asserting `!valid | ready`.
    pub debug_checks: bool,
}

// ── Public entry points ────────────────────────────────────────────────────

pub fn synthesize(func: &Func) -> Result<Module, SynthError> {
    synthesize_with(func, &SynthOptions::default())
}

pub fn synthesize_with(func: &Func, options: &SynthOptions) -> Result<Module, SynthError> {
    let diagnostics = check_func(func);
    if has_errors(&diagnostics) {
        let errors = diagnostics
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect();
        return Err(SynthError::new(&func.name, errors));
    }
    synthesize_checked(func, options)
}

/// Synthesize a `Func` that `check_func` has already accepted.
pub(crate) fn synthesize_checked(
    func: &Func,
    options: &SynthOptions,
) -> Result<Module, SynthError> {
    let width =
        branch_id_width(func.conds().len()).map_err(|d| SynthError::single(&func.name, d))?;

    let mut synth = Synthesizer::new(func, options, width);
    synth.synthesize_branches();
    synth.synthesize_input_ready();
    synth.finish()
}

/// Bits needed to encode a branch id for `conds` conditions; never less
/// than one.
pub fn branch_id_width(conds: usize) -> Result<u32, Diagnostic> {
    match conds {
        0 => Err(Diagnostic::error(
            codes::E0201,
            "cannot arbitrate between zero conditions",
        )),
        1 | 2 => Ok(1),
        n => Ok(usize::BITS - (n - 1).leading_zeros()),
    }
}

// ── Internal context ───────────────────────────────────────────────────────

struct Synthesizer<'a> {
    func: &'a Func,
    builder: ModuleBuilder,
    chans: Vec<Channel>,
    bindings: ProbeBindings,
    branch_id: ClkNetId,
    errors: Vec<Diagnostic>,
}

impl<'a> Synthesizer<'a> {
    fn new(func: &'a Func, options: &SynthOptions, width: u32) -> Self {
        let mut builder = ModuleBuilder::new(func.name.clone());
        for net in func.nets() {
            build_channel(&mut builder, net, options);
        }
        let chans = builder.module().chans().to_vec();
        let bindings = ProbeBindings::from_channels(&chans);

        let branch_id = builder.push_net(
            "branch_id",
            clocked::Type::bits(width),
            clocked::Purpose::Reg,
        );
        builder.push_reset(branch_id, 0);
        debug!(
            "`{}`: {} branches, branch_id is {} bit(s)",
            func.name,
            func.conds().len(),
            width
        );

        Synthesizer {
            func,
            builder,
            chans,
            bindings,
            branch_id,
            errors: Vec::new(),
        }
    }

    fn chan(&self, net: NetId) -> Channel {
        self.chans.get(net.index()).copied().unwrap_or(Channel::None)
    }

    fn rewrite(&self, cid: CondId, expr: &FlowExpr) -> Result<ClkExpr, Diagnostic> {
        rewrite_probes(expr, &self.bindings).map_err(|d| d.with_related(Subject::Cond(cid)))
    }

    fn synthesize_branches(&mut self) {
        let func = self.func;
        for (cid, cond) in func.iter_conds() {
            if let Err(d) = self.synthesize_branch(cid, cond) {
                self.errors.push(d);
            }
        }
    }

    fn synthesize_branch(&mut self, cid: CondId, cond: &Condition) -> Result<(), Diagnostic> {
        let predicate = self.truth_of(self.rewrite(cid, cond.valid())?);

        let mut rule = Rule::new(true)
            .with_assign(Assign::registered(self.branch_id, i64::from(cid.0)));
        let mut ready_terms: Vec<ClkExpr> = Vec::new();

        let mut drained = BTreeSet::new();
        for (out, value) in cond.outs() {
            let value = self.rewrite(cid, value)?;
            if let Channel::Out { valid, ready, data } = self.chan(*out) {
                rule.assigns.push(Assign::registered(data, value));
                rule.assigns.push(Assign::registered(valid, 1));
                if drained.insert(*out) {
                    // The output is empty or about to be drained.
                    ready_terms.push(!Expr::var(valid) | Expr::var(ready));
                }
            }
        }
        for (reg, value) in cond.regs() {
            let value = self.rewrite(cid, value)?;
            if let Some(data) = self.chan(*reg).data() {
                rule.assigns.push(Assign::registered(data, value));
            }
        }

        for net in self.required_valid(cond) {
            if let Some(valid) = self.bindings.valid(net) {
                ready_terms.push(Expr::var(valid));
            }
        }
        let branch_ready = conjoin(ready_terms);

        rule.guard = conjoin([predicate, branch_ready.clone()]);
        debug!(
            "{} `{}`: rule {}",
            cid,
            self.func[cond.uid()].name,
            rule.guard.display(self.builder.module())
        );
        self.builder.push_rule(rule);

        let selected = Expr::var(self.branch_id).equals(i64::from(cid.0));
        if let Some(ready) = self.chan(cond.uid()).ready() {
            self.builder.push_assign(ready, conjoin([selected, branch_ready]));
        }
        Ok(())
    }

    /// `expr` as a 1-bit truth value; wider expressions compare against zero.
    fn truth_of(&self, expr: ClkExpr) -> ClkExpr {
        if self.is_single_bit(&expr) {
            expr
        } else {
            expr.not_equals(0).minimize()
        }
    }

    fn is_single_bit(&self, expr: &ClkExpr) -> bool {
        match expr {
            Expr::Var(net) | Expr::Probe(net) => self
                .builder
                .module()
                .net(*net)
                .is_some_and(|n| n.ty.width <= 1),
            Expr::Op(Op::Inv | Op::BitAnd | Op::BitOr | Op::BitXor, args) => {
                args.iter().all(|a| self.is_single_bit(a))
            }
            e => e.is_predicate(),
        }
    }

    /// Inputs whose valid wire must be high before the branch may fire:
    /// nets read outside a probe, plus every acknowledged input.
    fn required_valid(&self, cond: &Condition) -> BTreeSet<NetId> {
        let mut nets = nets_read_by(cond.valid());
        for (_, value) in cond.outs().iter().chain(cond.regs()) {
            nets.extend(nets_read_by(value));
        }
        nets.extend(cond.ins().iter().copied());
        nets
    }

    fn synthesize_input_ready(&mut self) {
        let func = self.func;
        for (id, net) in func.iter_nets() {
            if net.purpose != Purpose::In {
                continue;
            }
            let Some(ready) = self.chan(id).ready() else {
                continue;
            };
            let acks: BTreeSet<ClkNetId> = func
                .conds()
                .iter()
                .filter(|c| c.ins().contains(&id))
                .filter_map(|c| self.chan(c.uid()).ready())
                .collect();
            let expr = if acks.is_empty() {
                Expr::int(0)
            } else {
                Expr::any(acks.into_iter().map(Expr::var)).minimize()
            };
            debug!(
                "input `{}`: ready = {}",
                net.name,
                expr.display(self.builder.module())
            );
            self.builder.push_assign(ready, expr);
        }
    }

    fn finish(self) -> Result<Module, SynthError> {
        if self.errors.is_empty() {
            Ok(self.builder.finish())
        } else {
            Err(SynthError::new(&self.func.name, self.errors))
        }
    }
}

/// Bitwise conjunction of 1-bit terms, minimized, with constant-true terms
/// dropped.
fn conjoin(terms: impl IntoIterator<Item = ClkExpr>) -> ClkExpr {
    Expr::all(terms.into_iter().filter(|t| *t != Expr::Bool(true))).minimize()
}
