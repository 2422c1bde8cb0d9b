// scan.rs — Net-Reference Scanner
//
// Structural folds collecting the source nets an expression mentions.
// Expressions are owned trees, so every operand is reached by the walk and
// no shared subexpression can hide a reference.

use std::collections::BTreeSet;

use crate::expr::Expr;
use crate::flow::FlowExpr;
use crate::id::NetId;

/// Every net appearing as an operand, read plainly or probed.
pub fn nets_referenced_by(expr: &FlowExpr) -> BTreeSet<NetId> {
    let mut nets = BTreeSet::new();
    expr.visit(&mut |e| {
        if let Expr::Var(id) | Expr::Probe(id) = e {
            nets.insert(*id);
        }
    });
    nets
}

/// Nets read unconditionally, i.e. outside any probe.
pub fn nets_read_by(expr: &FlowExpr) -> BTreeSet<NetId> {
    let mut nets = BTreeSet::new();
    expr.visit(&mut |e| {
        if let Expr::Var(id) = e {
            nets.insert(*id);
        }
    });
    nets
}

/// Nets read through a probe.
pub fn nets_probed_by(expr: &FlowExpr) -> BTreeSet<NetId> {
    let mut nets = BTreeSet::new();
    expr.visit(&mut |e| {
        if let Expr::Probe(id) = e {
            nets.insert(*id);
        }
    });
    nets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> BTreeSet<NetId> {
        ids.iter().map(|&i| NetId(i)).collect()
    }

    #[test]
    fn collects_every_operand() {
        let e = (Expr::var(NetId(0)) + Expr::probe(NetId(2)))
            .equals(Expr::var(NetId(5)) * Expr::var(NetId(0)));
        assert_eq!(nets_referenced_by(&e), set(&[0, 2, 5]));
        assert_eq!(nets_read_by(&e), set(&[0, 5]));
        assert_eq!(nets_probed_by(&e), set(&[2]));
    }

    #[test]
    fn constants_reference_nothing() {
        let e: FlowExpr = (Expr::int(3) + 4).lnot().or(true);
        assert!(nets_referenced_by(&e).is_empty());
    }

    #[test]
    fn deep_nesting_is_followed() {
        let mut e = Expr::var(NetId(9));
        for i in 0..50 {
            e = !(e & Expr::probe(NetId(i % 3)));
        }
        assert_eq!(nets_referenced_by(&e), set(&[0, 1, 2, 9]));
    }
}
