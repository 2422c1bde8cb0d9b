// check.rs — Structural verification of a dataflow Func
//
// Validates every cross-reference a `Func` carries before synthesis reads
// it: index bounds, purpose agreement of each condition's targets, and which
// nets expressions may read. All violations are collected; nothing stops at
// the first.
//
// Preconditions: none.
// Postconditions: an empty error set guarantees that synthesis can index
//   every net and channel it touches.
// Failure modes: none; problems are returned as diagnostics.
// Side effects: warnings are logged at warn level.

use std::collections::{BTreeSet, HashMap};

use log::warn;

use crate::diag::{codes, DiagCode, Diagnostic, Subject};
use crate::flow::{FlowExpr, Func, Purpose};
use crate::id::{CondId, NetId};
use crate::scan::nets_referenced_by;

pub fn check_func(func: &Func) -> Vec<Diagnostic> {
    let mut checker = Checker {
        func,
        diagnostics: Vec::new(),
    };
    checker.check_names();
    checker.check_conditions();
    checker.check_usage();
    for d in checker.diagnostics.iter().filter(|d| !d.is_error()) {
        warn!("{}: {}", func.name, d);
    }
    checker.diagnostics
}

struct Checker<'a> {
    func: &'a Func,
    diagnostics: Vec<Diagnostic>,
}

impl Checker<'_> {
    fn check_names(&mut self) {
        let func = self.func;
        let mut seen: HashMap<&str, NetId> = HashMap::new();
        for (id, net) in func.iter_nets() {
            if let Some(&first) = seen.get(net.name.as_str()) {
                self.diagnostics.push(
                    Diagnostic::error(codes::E0105, format!("duplicate net name `{}`", net.name))
                        .with_subject(Subject::Net(id))
                        .with_related(Subject::Net(first)),
                );
            } else {
                seen.insert(net.name.as_str(), id);
            }
        }
    }

    fn check_conditions(&mut self) {
        if self.func.conds().is_empty() {
            self.diagnostics.push(
                Diagnostic::error(codes::E0201, format!("`{}` has no conditions", self.func.name))
                    .with_hint("a branch id register needs at least one branch"),
            );
            return;
        }
        let func = self.func;
        let mut owners: HashMap<NetId, CondId> = HashMap::new();
        for (cid, cond) in func.iter_conds() {
            self.check_target(cid, cond.uid(), Purpose::Cond, codes::E0104, "is backed by");
            if let Some(net) = func.net_at(cond.uid()) {
                if let Some(&first) = owners.get(&cond.uid()) {
                    self.diagnostics.push(
                        Diagnostic::error(
                            codes::E0106,
                            format!("{} and {} are both backed by `{}`", first, cid, net.name),
                        )
                        .with_subject(Subject::Cond(cid))
                        .with_related(Subject::Cond(first))
                        .with_hint("each condition drives its own ready wire"),
                    );
                } else {
                    owners.insert(cond.uid(), cid);
                }
            }
            self.check_reads(cid, cond.valid());
            for (out, value) in cond.outs() {
                self.check_target(cid, *out, Purpose::Out, codes::E0102, "requests");
                self.check_reads(cid, value);
            }
            for (reg, value) in cond.regs() {
                self.check_target(cid, *reg, Purpose::Reg, codes::E0102, "writes");
                self.check_reads(cid, value);
            }
            for input in cond.ins() {
                self.check_target(cid, *input, Purpose::In, codes::E0102, "acknowledges");
            }
        }
    }

    fn check_target(
        &mut self,
        cid: CondId,
        net: NetId,
        expected: Purpose,
        code: DiagCode,
        verb: &str,
    ) {
        let Some(found) = self.in_range(cid, net) else {
            return;
        };
        if found != expected {
            self.diagnostics.push(
                Diagnostic::error(
                    code,
                    format!(
                        "{} {} `{}`, which is {} rather than {}",
                        cid,
                        verb,
                        self.func[net].name,
                        found.describe(),
                        expected.describe()
                    ),
                )
                .with_subject(Subject::Cond(cid))
                .with_related(Subject::Net(net)),
            );
        }
    }

    fn check_reads(&mut self, cid: CondId, expr: &FlowExpr) {
        for net in nets_referenced_by(expr) {
            let Some(purpose) = self.in_range(cid, net) else {
                continue;
            };
            if !purpose.is_readable() {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::E0103,
                        format!(
                            "{} reads `{}`, which is {}",
                            cid,
                            self.func[net].name,
                            purpose.describe()
                        ),
                    )
                    .with_subject(Subject::Cond(cid))
                    .with_related(Subject::Net(net))
                    .with_hint("expressions may only read input and register nets"),
                );
            }
        }
    }

    /// Purpose of `net`, or an E0101 diagnostic when it does not exist.
    fn in_range(&mut self, cid: CondId, net: NetId) -> Option<Purpose> {
        match self.func.net_at(net) {
            Some(n) => Some(n.purpose),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::E0101,
                        format!(
                            "{} refers to {}, but `{}` has {} nets",
                            cid,
                            net,
                            self.func.name,
                            self.func.net_count()
                        ),
                    )
                    .with_subject(Subject::Cond(cid))
                    .with_related(Subject::Net(net)),
                );
                None
            }
        }
    }

    fn check_usage(&mut self) {
        let acked: BTreeSet<NetId> = self
            .func
            .conds()
            .iter()
            .flat_map(|c| c.ins().iter().copied())
            .collect();
        let requested: BTreeSet<NetId> = self
            .func
            .conds()
            .iter()
            .flat_map(|c| c.outs().iter().map(|(out, _)| *out))
            .collect();

        let func = self.func;
        for (id, net) in func.iter_nets() {
            match net.purpose {
                Purpose::In if !acked.contains(&id) => self.diagnostics.push(
                    Diagnostic::warning(
                        codes::W0101,
                        format!("input `{}` is never acknowledged", net.name),
                    )
                    .with_subject(Subject::Net(id))
                    .with_hint("its ready wire is tied low"),
                ),
                Purpose::Out if !requested.contains(&id) => self.diagnostics.push(
                    Diagnostic::warning(
                        codes::W0102,
                        format!("output `{}` is never requested", net.name),
                    )
                    .with_subject(Subject::Net(id)),
                ),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::has_errors;
    use crate::expr::Expr;
    use crate::flow::Type;

    fn codes_of(diags: &[Diagnostic]) -> Vec<DiagCode> {
        diags.iter().filter_map(|d| d.code).collect()
    }

    fn buffer() -> Func {
        let mut func = Func::new("buffer");
        let l = func.push_net("L", Type::default(), Purpose::In);
        let r = func.push_net("R", Type::default(), Purpose::Out);
        let b = func.push_cond(true);
        func[b].req(r, Expr::var(l)).ack(l);
        func
    }

    #[test]
    fn well_formed_func_is_clean() {
        assert!(check_func(&buffer()).is_empty());
    }

    #[test]
    fn no_conditions_is_an_error() {
        let mut func = Func::new("empty");
        func.push_net("L", Type::default(), Purpose::In);
        let diags = check_func(&func);
        assert!(has_errors(&diags));
        assert_eq!(codes_of(&diags), vec![codes::E0201, codes::W0101]);
    }

    #[test]
    fn purpose_mismatches_name_the_condition() {
        let mut func = Func::new("bad");
        let l = func.push_net("L", Type::default(), Purpose::In);
        let r = func.push_net("R", Type::default(), Purpose::Out);
        let b = func.push_cond(true);
        // Acknowledging an output and requesting an input.
        func[b].ack(r).req(l, Expr::var(l));

        let diags = check_func(&func);
        let errors: Vec<_> = diags.iter().filter(|d| d.is_error()).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|d| d.code == Some(codes::E0102)));
        assert_eq!(errors[0].subject, Some(Subject::Cond(b)));
        assert_eq!(errors[0].related, vec![Subject::Net(l)]);
        assert!(errors[0].message.contains("`L`, which is an input rather than an output"));
    }

    #[test]
    fn out_of_range_and_unreadable_references() {
        let mut func = Func::new("bad");
        let r = func.push_net("R", Type::default(), Purpose::Out);
        let b = func.push_cond(Expr::var(r).equals(1));
        func[b].req(r, Expr::var(NetId(40)));

        let diags = check_func(&func);
        assert_eq!(codes_of(&diags), vec![codes::E0103, codes::E0101]);
        assert_eq!(diags[1].related, vec![Subject::Net(NetId(40))]);
    }

    #[test]
    fn duplicate_names_are_reported_once_per_repeat() {
        let mut func = buffer();
        func.push_net("L", Type::bits(1), Purpose::Reg);
        let diags = check_func(&func);
        assert_eq!(codes_of(&diags), vec![codes::E0105]);
        assert_eq!(diags[0].subject, Some(Subject::Net(NetId(3))));
        assert_eq!(diags[0].related, vec![Subject::Net(NetId(0))]);
    }

    #[test]
    fn conditions_sharing_a_backing_net_are_rejected() {
        let mut func = buffer();
        let b = func.push_cond(true);
        let r = func.net_index("R").unwrap();
        func[b].req(r, 1);

        // Only a deserialized func can point two conditions at one net.
        let mut value = serde_json::to_value(&func).unwrap();
        value["conds"][1]["uid"] = value["conds"][0]["uid"].clone();
        let shared: Func = serde_json::from_value(value).unwrap();

        let diags = check_func(&shared);
        let errors: Vec<_> = diags.iter().filter(|d| d.is_error()).collect();
        assert_eq!(errors.len(), 1, "{:?}", diags);
        assert_eq!(errors[0].code, Some(codes::E0106));
        assert_eq!(errors[0].subject, Some(Subject::Cond(CondId(1))));
        assert_eq!(errors[0].related, vec![Subject::Cond(CondId(0))]);
        assert!(errors[0].message.contains("`case_0`"), "{}", errors[0].message);
        assert!(crate::synth::synthesize(&shared).is_err());
    }

    #[test]
    fn unused_channels_warn() {
        let mut func = Func::new("idle");
        func.push_net("L", Type::default(), Purpose::In);
        func.push_net("R", Type::default(), Purpose::Out);
        func.push_cond(true);
        let diags = check_func(&func);
        assert!(!has_errors(&diags));
        assert_eq!(codes_of(&diags), vec![codes::W0101, codes::W0102]);
    }
}
