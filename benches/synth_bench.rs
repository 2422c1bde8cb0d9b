use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flowc::expr::Expr;
use flowc::flow::{FlowExpr, Func, Purpose, Type};
use flowc::probe::{rewrite_probes, ProbeBindings};
use flowc::synth::SynthOptions;

// Synthesis scaling scenarios.
// All generated functions pass the structural check.

/// `n` inputs steered onto `n` outputs by a shared selector, one branch per
/// input. Every branch probes the selector and reads its input.
fn generate_crossbar(n: usize) -> Func {
    let mut func = Func::new(format!("crossbar_{}", n));
    let sel = func.push_net("S", Type::bits(8), Purpose::In);
    let ins: Vec<_> = (0..n)
        .map(|k| func.push_net(format!("L{}", k), Type::fixed(16), Purpose::In))
        .collect();
    let outs: Vec<_> = (0..n)
        .map(|k| func.push_net(format!("R{}", k), Type::fixed(16), Purpose::Out))
        .collect();
    let acc = func.push_net("acc", Type::fixed(16), Purpose::Reg);

    for (k, (l, r)) in ins.iter().zip(&outs).enumerate() {
        let b = func.push_cond(Expr::probe(sel).equals(k as i64));
        func[b]
            .req(*r, Expr::var(*l) + Expr::var(acc))
            .mem(acc, Expr::var(*l))
            .ack(sel)
            .ack(*l);
    }
    func
}

/// Right-leaning chain of `depth` probed terms, joined by `|` when
/// `boundary` is set and by `+` otherwise.
fn generate_probe_chain(depth: usize, boundary: bool) -> (Func, FlowExpr) {
    let mut func = Func::new("chain");
    let nets: Vec<_> = (0..depth)
        .map(|k| func.push_net(format!("A{}", k), Type::fixed(16), Purpose::In))
        .collect();
    let b = func.push_cond(true);
    func[b].ack_all(nets.iter().copied());

    let mut expr = Expr::int(0);
    for net in nets {
        let term = Expr::probe(net) + 1;
        expr = if boundary { term | expr } else { term + expr };
    }
    (func, expr)
}

// Full check + synthesis latency as the branch count grows.
fn bench_synthesize_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("synth/scaling");
    let opts = SynthOptions::default();

    for n in [2usize, 8, 32, 128] {
        let func = generate_crossbar(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &func, |b, func| {
            b.iter(|| {
                let module = flowc::synth::synthesize_with(black_box(func), &opts)
                    .expect("benchmark scenario must synthesize");
                black_box(module);
            });
        });
    }

    group.finish();
}

// Probe rewriting on deep expressions, with and without scope boundaries.
fn bench_probe_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("synth/probe_rewrite");

    for (name, boundary) in [("root", false), ("boundary", true)] {
        let (func, expr) = generate_probe_chain(64, boundary);
        let module =
            flowc::synth::synthesize(&func).expect("benchmark scenario must synthesize");
        let bindings = ProbeBindings::from_channels(module.chans());

        group.bench_with_input(BenchmarkId::from_parameter(name), &expr, |b, expr| {
            b.iter(|| black_box(rewrite_probes(black_box(expr), &bindings)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_synthesize_scaling, bench_probe_rewrite);
criterion_main!(benches);
