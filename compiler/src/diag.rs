// diag.rs — Diagnostics model for synthesis
//
// Every structural problem found in a dataflow `Func` is reported as a
// `Diagnostic` naming the offending net or condition of the *source*
// netlist, so failures can be traced back to the description that caused
// them.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::id::{CondId, NetId};

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0102`, `W0101`).
///
/// Codes are `&'static str` constants defined in the `codes` module. Once
/// assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Structural reference errors
    pub const E0101: DiagCode = DiagCode("E0101"); // net index out of range
    pub const E0102: DiagCode = DiagCode("E0102"); // purpose mismatch
    pub const E0103: DiagCode = DiagCode("E0103"); // expression reads a non-readable net
    pub const E0104: DiagCode = DiagCode("E0104"); // condition backing net is not a Cond net
    pub const E0105: DiagCode = DiagCode("E0105"); // duplicate net name
    pub const E0106: DiagCode = DiagCode("E0106"); // condition backing net shared by two conditions

    // Arbitration
    pub const E0201: DiagCode = DiagCode("E0201"); // no conditions

    // Probe rewriting
    pub const E0301: DiagCode = DiagCode("E0301"); // unresolved probe
    pub const E0302: DiagCode = DiagCode("E0302"); // unmapped variable read

    // Warnings
    pub const W0101: DiagCode = DiagCode("W0101"); // input never acknowledged
    pub const W0102: DiagCode = DiagCode("W0102"); // output never requested
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Subject ──────────────────────────────────────────────────────────────

/// The source-netlist entity a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Net(NetId),
    Cond(CondId),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Net(id) => write!(f, "{}", id),
            Subject::Cond(id) => write!(f, "{}", id),
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by the structural check or by synthesis.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub subject: Option<Subject>,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<Subject>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, subject, hint, or related entities.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            subject: None,
            message: message.into(),
            hint: None,
            related: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Name the offending net or condition.
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a secondary entity involved in the violation.
    pub fn with_related(mut self, subject: Subject) -> Self {
        self.related.push(subject);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, " ({})", subject)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

// ── Fatal synthesis error ────────────────────────────────────────────────

/// Synthesis of a function was aborted. Carries every error-level
/// diagnostic found, in discovery order.
#[derive(Debug, Clone)]
pub struct SynthError {
    pub func: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl SynthError {
    pub fn new(func: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            func: func.into(),
            diagnostics,
        }
    }

    pub fn single(func: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self::new(func, vec![diagnostic])
    }

    /// Codes of all carried diagnostics, in order.
    pub fn codes(&self) -> Vec<DiagCode> {
        self.diagnostics.iter().filter_map(|d| d.code).collect()
    }
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synthesis of `{}` failed with {} error(s)",
            self.func,
            self.diagnostics.len()
        )?;
        for d in &self.diagnostics {
            write!(f, "\n{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for SynthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_subject() {
        let d = Diagnostic::warning(codes::W0101, "input `L` is never acknowledged")
            .with_subject(Subject::Net(NetId(0)));
        assert_eq!(
            format!("{d}"),
            "warning[W0101]: input `L` is never acknowledged (net#0)"
        );
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::error(codes::E0102, "purpose mismatch")
            .with_subject(Subject::Cond(CondId(1)))
            .with_hint("acknowledge an input net instead")
            .with_related(Subject::Net(NetId(3)));

        assert_eq!(d.code, Some(codes::E0102));
        assert_eq!(d.hint.as_deref(), Some("acknowledge an input net instead"));
        assert_eq!(d.related, vec![Subject::Net(NetId(3))]);
        assert!(d.is_error());
    }

    #[test]
    fn synth_error_lists_every_diagnostic() {
        let err = SynthError::new(
            "merge",
            vec![
                Diagnostic::error(codes::E0101, "net index out of range"),
                Diagnostic::error(codes::E0201, "no conditions"),
            ],
        );
        let text = err.to_string();
        assert!(text.starts_with("synthesis of `merge` failed with 2 error(s)"));
        assert!(text.contains("error[E0101]"));
        assert!(text.contains("error[E0201]"));
        assert_eq!(err.codes(), vec![codes::E0101, codes::E0201]);
    }
}
