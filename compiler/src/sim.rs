// sim.rs — Cycle-level evaluator for synthesized modules
//
// Holds one value per clocked net and advances a `Module` one clock edge at
// a time, following the block semantics of `clocked::Block`. Used to check
// handshake behavior without an external HDL simulator.
//
// Preconditions: the module is acyclic through its continuous assignments.
// Postconditions: every stored value is truncated to its net's width.
// Failure modes: an expression that cannot be evaluated (division by zero)
//   yields zero.
// Side effects: none.

use crate::clocked::{Assign, Block, ClkExpr, Module};
use crate::expr::Value;
use crate::id::ClkNetId;

pub struct Simulator<'m> {
    module: &'m Module,
    values: Vec<i64>,
}

impl<'m> Simulator<'m> {
    /// All nets start at zero.
    pub fn new(module: &'m Module) -> Self {
        Simulator {
            module,
            values: vec![0; module.nets().len()],
        }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn net(&self, name: &str) -> Option<ClkNetId> {
        self.module.net_index(name)
    }

    pub fn get(&self, net: ClkNetId) -> i64 {
        self.values.get(net.index()).copied().unwrap_or(0)
    }

    pub fn set(&mut self, net: ClkNetId, value: i64) {
        let width = self.width(net);
        if let Some(slot) = self.values.get_mut(net.index()) {
            *slot = Value::new(value, width).bits;
        }
    }

    /// Value of the net called `name`.
    pub fn peek(&self, name: &str) -> Option<i64> {
        self.net(name).map(|id| self.get(id))
    }

    fn width(&self, net: ClkNetId) -> u32 {
        self.module.net(net).map_or(64, |n| n.ty.width)
    }

    fn eval(&self, assign: &Assign) -> i64 {
        let lookup = |id: ClkNetId| Some(Value::new(self.get(id), self.width(id)));
        let bits = assign.expr.evaluate(&lookup).map_or(0, |v| v.bits);
        Value::new(bits, self.width(assign.net)).bits
    }

    /// True when `guard` is nonzero under the current net values.
    pub fn holds(&self, guard: &ClkExpr) -> bool {
        let lookup = |id: ClkNetId| Some(Value::new(self.get(id), self.width(id)));
        guard.evaluate(&lookup).is_some_and(Value::is_true)
    }

    /// Propagate continuous assignments to a fixed point.
    pub fn settle(&mut self) {
        let module = self.module;
        for _ in 0..=module.assigns().len() {
            let mut changed = false;
            for assign in module.assigns() {
                let value = self.eval(assign);
                if self.get(assign.net) != value {
                    self.set(assign.net, value);
                    changed = true;
                }
            }
            if !changed {
                return;
            }
        }
    }

    /// Hold reset high for one edge, then release it.
    pub fn reset(&mut self) {
        let reset = self.module.reset();
        self.set(reset, 1);
        self.step();
        self.set(reset, 0);
        self.settle();
    }

    /// Advance one clock edge. Returns, per block, the index of the rule
    /// that fired.
    pub fn step(&mut self) -> Vec<Option<usize>> {
        self.settle();
        let module = self.module;
        let in_reset = self.get(module.reset()) != 0;
        let mut fired = Vec::with_capacity(module.blocks().len());
        let mut writes: Vec<(ClkNetId, i64)> = Vec::new();
        for block in module.blocks() {
            fired.push(self.edge(block, in_reset, &mut writes));
        }
        for (net, value) in writes {
            self.set(net, value);
        }
        self.settle();
        fired
    }

    fn edge(
        &self,
        block: &Block,
        in_reset: bool,
        writes: &mut Vec<(ClkNetId, i64)>,
    ) -> Option<usize> {
        if in_reset {
            writes.extend(block.reset.iter().map(|a| (a.net, self.eval(a))));
            return None;
        }
        for rule in block.fallback.iter().filter(|r| self.holds(&r.guard)) {
            writes.extend(rule.assigns.iter().map(|a| (a.net, self.eval(a))));
        }
        let (index, rule) = block
            .rules
            .iter()
            .enumerate()
            .find(|(_, r)| self.holds(&r.guard))?;
        writes.extend(rule.assigns.iter().map(|a| (a.net, self.eval(a))));
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocked::{self, ModuleBuilder, Rule};
    use crate::expr::Expr;

    fn counter() -> Module {
        let mut b = ModuleBuilder::new("counter");
        let en = b.push_net("en", clocked::Type::wire(), clocked::Purpose::In);
        let q = b.push_net("q", clocked::Type::bits(2), clocked::Purpose::Reg);
        let o = b.push_net("o", clocked::Type::bits(2), clocked::Purpose::Out);
        b.push_assign(o, Expr::var(q));
        b.push_reset(q, 0);
        let incr = Assign::registered(q, Expr::var(q) + 1);
        b.push_rule(Rule::new(Expr::var(en)).with_assign(incr));
        b.finish()
    }

    #[test]
    fn registers_update_on_edges_and_wrap_to_width() {
        let module = counter();
        let mut sim = Simulator::new(&module);
        sim.reset();
        let en = sim.net("en").unwrap();
        sim.set(en, 1);
        for expected in [1, 2, 3, 0, 1] {
            assert_eq!(sim.step(), vec![Some(0)]);
            assert_eq!(sim.peek("o"), Some(expected));
        }
        sim.set(en, 0);
        assert_eq!(sim.step(), vec![None]);
        assert_eq!(sim.peek("q"), Some(1));
    }

    #[test]
    fn reset_overrides_rules() {
        let module = counter();
        let mut sim = Simulator::new(&module);
        let en = sim.net("en").unwrap();
        sim.set(en, 1);
        sim.step();
        sim.step();
        assert_eq!(sim.peek("q"), Some(2));
        sim.reset();
        assert_eq!(sim.peek("q"), Some(0));
        assert_eq!(sim.peek("reset"), Some(0));
    }

    #[test]
    fn wide_nets_hold_their_values() {
        let mut b = ModuleBuilder::new("m");
        let w = b.push_net("w", clocked::Type::bits(63), clocked::Purpose::In);
        let module = b.finish();

        let mut sim = Simulator::new(&module);
        sim.set(w, -1);
        assert_eq!(sim.get(w), i64::MAX);
        assert!(sim.holds(&Expr::var(w)));
        assert!(!sim.holds(&Expr::var(w).equals(-1)));
        sim.set(w, 0);
        assert!(!sim.holds(&Expr::var(w)));
    }

    #[test]
    fn rules_override_fallback_writes() {
        let mut b = ModuleBuilder::new("m");
        let go = b.push_net("go", clocked::Type::wire(), clocked::Purpose::In);
        let q = b.push_net("q", clocked::Type::bits(4), clocked::Purpose::Reg);
        b.push_fallback(Rule::new(true).with_assign(Assign::registered(q, 5)));
        b.push_rule(Rule::new(Expr::var(go)).with_assign(Assign::registered(q, 9)));
        let module = b.finish();

        let mut sim = Simulator::new(&module);
        sim.step();
        assert_eq!(sim.get(q), 5);
        sim.set(go, 1);
        sim.step();
        assert_eq!(sim.get(q), 9);
    }
}
