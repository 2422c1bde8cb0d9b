// pipeline.rs — Phase orchestration and provenance
//
// Runs the structural check and synthesis over one `Func`, accumulating
// diagnostics and per-phase timings, and fingerprints the input so a
// synthesized module can be traced back to the exact description it came
// from.
//
// Preconditions: none.
// Postconditions: `CompileResult.module` is set iff no phase emitted an
//   error-level diagnostic.
// Failure modes: any phase emitting error-level diagnostics stops the run.
// Side effects: calls `on_phase_complete` after each phase; logs phase
//   timing at info level.

use std::time::{Duration, Instant};

use log::info;

use crate::check::check_func;
use crate::clocked::Module;
use crate::diag::{has_errors, Diagnostic};
use crate::flow::Func;
use crate::synth::{synthesize_checked, SynthOptions};

// ── Phases ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Check,
    Synthesize,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Check => "check",
            Phase::Synthesize => "synthesize",
        }
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible builds and cache-key use.
///
/// `func_fingerprint`: SHA-256 of the compact JSON serialization of the
/// input `Func`. `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub func_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the fingerprint (64 characters).
    pub fn func_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.func_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"func_fingerprint\": \"{}\",\n  \"compiler_version\": \"{}\"\n}}\n",
            self.func_fingerprint_hex(),
            self.compiler_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

pub fn compute_provenance(func: &Func) -> Provenance {
    use sha2::{Digest, Sha256};

    // Serializing plain data with string keys cannot fail.
    let canonical = serde_json::to_string(func).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let mut func_fingerprint = [0u8; 32];
    func_fingerprint.copy_from_slice(&hasher.finalize());

    Provenance {
        func_fingerprint,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CompileResult {
    pub module: Option<Module>,
    pub diagnostics: Vec<Diagnostic>,
    pub provenance: Provenance,
    pub timings: Vec<(Phase, Duration)>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

pub fn compile(func: &Func, options: &SynthOptions) -> CompileResult {
    compile_with(func, options, |_, _| {})
}

/// Check then synthesize `func`, reporting each phase's diagnostics through
/// `on_phase_complete` as soon as the phase ends.
pub fn compile_with(
    func: &Func,
    options: &SynthOptions,
    mut on_phase_complete: impl FnMut(Phase, &[Diagnostic]),
) -> CompileResult {
    let mut result = CompileResult {
        module: None,
        diagnostics: Vec::new(),
        provenance: compute_provenance(func),
        timings: Vec::new(),
    };

    let t = Instant::now();
    let diags = check_func(func);
    if !finish_phase(&mut result, Phase::Check, diags, t.elapsed(), &mut on_phase_complete) {
        return result;
    }

    let t = Instant::now();
    let (module, diags) = match synthesize_checked(func, options) {
        Ok(module) => (Some(module), Vec::new()),
        Err(e) => (None, e.diagnostics),
    };
    if finish_phase(&mut result, Phase::Synthesize, diags, t.elapsed(), &mut on_phase_complete) {
        result.module = module;
    }
    result
}

/// Record a finished phase; returns false if it produced errors.
fn finish_phase(
    result: &mut CompileResult,
    phase: Phase,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_phase_complete: &mut impl FnMut(Phase, &[Diagnostic]),
) -> bool {
    on_phase_complete(phase, &diags);
    info!(
        "{} complete, {:.1}ms",
        phase.name(),
        elapsed.as_secs_f64() * 1000.0
    );
    let ok = !has_errors(&diags);
    result.diagnostics.extend(diags);
    result.timings.push((phase, elapsed));
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::codes;
    use crate::expr::Expr;
    use crate::flow::{Purpose, Type};

    fn sink() -> Func {
        let mut func = Func::new("sink");
        let l = func.push_net("L", Type::default(), Purpose::In);
        let b = func.push_cond(true);
        func[b].ack(l);
        func
    }

    #[test]
    fn compile_runs_both_phases() {
        let mut seen = Vec::new();
        let result = compile_with(&sink(), &SynthOptions::default(), |phase, _| seen.push(phase));
        assert!(!result.has_errors());
        assert!(result.module.is_some());
        assert_eq!(seen, vec![Phase::Check, Phase::Synthesize]);
        assert_eq!(result.timings.len(), 2);
    }

    #[test]
    fn check_errors_stop_before_synthesis() {
        let mut func = sink();
        func.push_net("L", Type::bits(1), Purpose::In);
        let result = compile(&func, &SynthOptions::default());
        assert!(result.has_errors());
        assert!(result.module.is_none());
        assert_eq!(result.timings.len(), 1);
        // The duplicate is also never acknowledged.
        let found: Vec<_> = result.diagnostics.iter().filter_map(|d| d.code).collect();
        assert_eq!(found, vec![codes::E0105, codes::W0101]);
    }

    #[test]
    fn synthesis_errors_are_reported() {
        let mut func = Func::new("bad");
        let s = func.push_net("S", Type::bits(1), Purpose::Reg);
        let b = func.push_cond(Expr::probe(s));
        func[b].mem(s, 1);
        let result = compile(&func, &SynthOptions::default());
        assert!(result.module.is_none());
        assert_eq!(result.diagnostics[0].code, Some(codes::E0301));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = compute_provenance(&sink());
        let b = compute_provenance(&sink());
        assert_eq!(a, b);
        assert_eq!(a.func_fingerprint_hex().len(), 64);

        let mut other = sink();
        other.name = "drain".to_string();
        assert_ne!(compute_provenance(&other).func_fingerprint, a.func_fingerprint);
    }

    #[test]
    fn build_info_is_json() {
        let json = compute_provenance(&sink()).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["compiler_version"], env!("CARGO_PKG_VERSION"));
    }
}
