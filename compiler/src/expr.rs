// expr.rs — Expression trees shared by both netlists
//
// An `Expr<V>` is an owned tree whose leaves reference variables of one
// index space: `Expr<NetId>` for dataflow guards and values, and
// `Expr<ClkNetId>` for clocked guards and assignments. Synthesis treats this
// module as its expression library: build, substitute, minimize, evaluate.
//
// Preconditions: none.
// Postconditions: `minimize` returns a canonical tree and is a fixed point
//   (minimizing twice yields the same tree).
// Failure modes: `evaluate` returns None on an unbound variable or a
//   division by zero; `try_map_vars` forwards the mapper's error.
// Side effects: none.

use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

// ── Operators ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    /// Associative and commutative; stored flattened after minimization.
    Nary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Op {
    /// Logical negation `!`.
    Not,
    /// Bitwise inversion `~`.
    Inv,
    Neg,
    Sub,
    Div,
    Rem,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    /// Logical conjunction `&&`.
    And,
    /// Logical disjunction `||`.
    Or,
}

impl Op {
    pub fn arity(self) -> Arity {
        match self {
            Op::Not | Op::Inv | Op::Neg => Arity::Unary,
            Op::Sub
            | Op::Div
            | Op::Rem
            | Op::Shl
            | Op::Shr
            | Op::Eq
            | Op::Ne
            | Op::Lt
            | Op::Le
            | Op::Gt
            | Op::Ge => Arity::Binary,
            Op::Add | Op::Mul | Op::BitAnd | Op::BitOr | Op::BitXor | Op::And | Op::Or => {
                Arity::Nary
            }
        }
    }

    /// `x op x == x`.
    pub fn is_idempotent(self) -> bool {
        matches!(self, Op::BitAnd | Op::BitOr | Op::And | Op::Or)
    }

    /// Produces a 1-bit truth value regardless of operand widths.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            Op::Not | Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::And | Op::Or
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Not => "!",
            Op::Inv => "~",
            Op::Neg => "-",
            Op::Sub => "-",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Add => "+",
            Op::Mul => "*",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::And => "&&",
            Op::Or => "||",
        }
    }

    // C precedence, higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            Op::Or => 1,
            Op::And => 2,
            Op::BitOr => 3,
            Op::BitXor => 4,
            Op::BitAnd => 5,
            Op::Eq | Op::Ne => 6,
            Op::Lt | Op::Le | Op::Gt | Op::Ge => 7,
            Op::Shl | Op::Shr => 8,
            Op::Add | Op::Sub => 9,
            Op::Mul | Op::Div | Op::Rem => 10,
            Op::Not | Op::Inv | Op::Neg => 11,
        }
    }
}

// ── Expression tree ────────────────────────────────────────────────────────

/// An expression over variables of type `V`.
///
/// `Probe(v)` reads `v` *only once its validity is established*; a bare
/// `Var(v)` reads the value unconditionally. Probes exist in dataflow
/// expressions only and are eliminated by [`crate::probe::rewrite_probes`].
///
/// The derived ordering is the canonical operand order used by
/// [`Expr::minimize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Expr<V> {
    Bool(bool),
    Int(i64),
    Var(V),
    Probe(V),
    Op(Op, Vec<Expr<V>>),
}

impl<V> From<i64> for Expr<V> {
    fn from(n: i64) -> Self {
        Expr::Int(n)
    }
}

impl<V> From<i32> for Expr<V> {
    fn from(n: i32) -> Self {
        Expr::Int(i64::from(n))
    }
}

impl<V> From<bool> for Expr<V> {
    fn from(b: bool) -> Self {
        Expr::Bool(b)
    }
}

impl<V> Expr<V> {
    pub fn var(v: V) -> Self {
        Expr::Var(v)
    }

    pub fn probe(v: V) -> Self {
        Expr::Probe(v)
    }

    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn unary(op: Op, operand: Self) -> Self {
        Expr::Op(op, vec![operand])
    }

    pub fn binary(op: Op, lhs: Self, rhs: impl Into<Self>) -> Self {
        Expr::Op(op, vec![lhs, rhs.into()])
    }

    /// Bitwise conjunction of `terms`; `true` when empty.
    pub fn all(terms: impl IntoIterator<Item = Self>) -> Self {
        Self::fold_terms(Op::BitAnd, terms, Expr::Bool(true))
    }

    /// Bitwise disjunction of `terms`; `false` when empty.
    pub fn any(terms: impl IntoIterator<Item = Self>) -> Self {
        Self::fold_terms(Op::BitOr, terms, Expr::Bool(false))
    }

    fn fold_terms(op: Op, terms: impl IntoIterator<Item = Self>, empty: Self) -> Self {
        let mut terms: Vec<Self> = terms.into_iter().collect();
        match terms.len() {
            0 => empty,
            1 => terms.remove(0),
            _ => Expr::Op(op, terms),
        }
    }

    /// Logical `self && rhs`.
    pub fn and(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::And, self, rhs)
    }

    /// Logical `self || rhs`.
    pub fn or(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Or, self, rhs)
    }

    /// Logical `!self`.
    pub fn lnot(self) -> Self {
        Self::unary(Op::Not, self)
    }

    pub fn equals(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Eq, self, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Ne, self, rhs)
    }

    pub fn less_than(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Lt, self, rhs)
    }

    pub fn less_eq(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Le, self, rhs)
    }

    pub fn greater_than(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Gt, self, rhs)
    }

    pub fn greater_eq(self, rhs: impl Into<Self>) -> Self {
        Self::binary(Op::Ge, self, rhs)
    }

    pub fn is_op(&self, op: Op) -> bool {
        matches!(self, Expr::Op(o, _) if *o == op)
    }

    /// True when the expression always yields a 1-bit truth value.
    pub fn is_predicate(&self) -> bool {
        match self {
            Expr::Bool(_) => true,
            Expr::Op(op, _) => op.is_predicate(),
            _ => false,
        }
    }

    /// Pre-order walk over every node, operands included.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr<V>)) {
        f(self);
        if let Expr::Op(_, args) = self {
            for arg in args {
                arg.visit(&mut *f);
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        let mut n = 0;
        self.visit(&mut |_| n += 1);
        n
    }
}

impl<V: Copy> Expr<V> {
    /// Substitute every variable (plain or probed) through `f`, keeping the
    /// tree shape and leaf kinds.
    pub fn try_map_vars<W, E>(
        &self,
        f: &mut impl FnMut(V) -> Result<W, E>,
    ) -> Result<Expr<W>, E> {
        Ok(match self {
            Expr::Bool(b) => Expr::Bool(*b),
            Expr::Int(n) => Expr::Int(*n),
            Expr::Var(v) => Expr::Var(f(*v)?),
            Expr::Probe(v) => Expr::Probe(f(*v)?),
            Expr::Op(op, args) => Expr::Op(
                *op,
                args.iter()
                    .map(|a| a.try_map_vars(&mut *f))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    pub fn map_vars<W>(&self, f: &mut impl FnMut(V) -> W) -> Expr<W> {
        let mapped: Result<Expr<W>, std::convert::Infallible> = self.try_map_vars(&mut |v| Ok(f(v)));
        match mapped {
            Ok(e) => e,
            Err(never) => match never {},
        }
    }
}

// ── Operator overloads ─────────────────────────────────────────────────────

macro_rules! binary_overload {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<V, R: Into<Expr<V>>> ops::$trait<R> for Expr<V> {
            type Output = Expr<V>;

            fn $method(self, rhs: R) -> Expr<V> {
                Expr::binary($op, self, rhs)
            }
        }
    };
}

binary_overload!(BitAnd, bitand, Op::BitAnd);
binary_overload!(BitOr, bitor, Op::BitOr);
binary_overload!(BitXor, bitxor, Op::BitXor);
binary_overload!(Add, add, Op::Add);
binary_overload!(Sub, sub, Op::Sub);
binary_overload!(Mul, mul, Op::Mul);
binary_overload!(Div, div, Op::Div);
binary_overload!(Rem, rem, Op::Rem);
binary_overload!(Shl, shl, Op::Shl);
binary_overload!(Shr, shr, Op::Shr);

/// `!expr` is *bitwise* inversion; use [`Expr::lnot`] for logical negation.
impl<V> ops::Not for Expr<V> {
    type Output = Expr<V>;

    fn not(self) -> Expr<V> {
        Expr::unary(Op::Inv, self)
    }
}

impl<V> ops::Neg for Expr<V> {
    type Output = Expr<V>;

    fn neg(self) -> Expr<V> {
        Expr::unary(Op::Neg, self)
    }
}

// ── Minimization ───────────────────────────────────────────────────────────

impl<V: Ord> Expr<V> {
    /// Canonicalize and simplify, bottom-up.
    ///
    /// Flattens nested associative operators, sorts their operands, drops
    /// duplicates of idempotent operators, folds constants, removes
    /// identities and double negations, and collapses single-operand nodes.
    pub fn minimize(self) -> Self {
        match self {
            Expr::Op(op, args) => {
                let args: Vec<Self> = args.into_iter().map(Expr::minimize).collect();
                match op.arity() {
                    Arity::Unary => simplify_unary(op, args),
                    Arity::Binary => simplify_binary(op, args),
                    Arity::Nary => simplify_nary(op, args),
                }
            }
            leaf => leaf,
        }
    }
}

fn simplify_unary<V: Ord>(op: Op, mut args: Vec<Expr<V>>) -> Expr<V> {
    if args.len() != 1 {
        return Expr::Op(op, args);
    }
    let arg = args.remove(0);
    match (op, arg) {
        (Op::Not, Expr::Bool(b)) => Expr::Bool(!b),
        (Op::Not, Expr::Int(n)) => Expr::Bool(n == 0),
        (Op::Inv, Expr::Bool(b)) => Expr::Bool(!b),
        (Op::Inv, Expr::Int(n)) => Expr::Int(!n),
        (Op::Neg, Expr::Int(n)) => Expr::Int(n.wrapping_neg()),
        (Op::Not, Expr::Op(Op::Not, mut inner)) if inner.len() == 1 && inner[0].is_predicate() => {
            inner.remove(0)
        }
        (Op::Inv, Expr::Op(Op::Inv, mut inner)) | (Op::Neg, Expr::Op(Op::Neg, mut inner))
            if inner.len() == 1 =>
        {
            inner.remove(0)
        }
        (op, arg) => Expr::Op(op, vec![arg]),
    }
}

fn simplify_binary<V: Ord>(op: Op, args: Vec<Expr<V>>) -> Expr<V> {
    if args.len() != 2 {
        return Expr::Op(op, args);
    }
    if let (Expr::Int(a), Expr::Int(b)) = (&args[0], &args[1]) {
        if let Some(folded) = fold_binary(op, *a, *b) {
            return folded;
        }
    }
    if let (Expr::Bool(a), Expr::Bool(b)) = (&args[0], &args[1]) {
        match op {
            Op::Eq => return Expr::Bool(a == b),
            Op::Ne => return Expr::Bool(a != b),
            _ => {}
        }
    }
    if matches!(op, Op::Sub | Op::Shl | Op::Shr) && args[1] == Expr::Int(0) {
        let mut args = args;
        return args.swap_remove(0);
    }
    Expr::Op(op, args)
}

fn fold_binary<V>(op: Op, a: i64, b: i64) -> Option<Expr<V>> {
    Some(match op {
        Op::Sub => Expr::Int(a.wrapping_sub(b)),
        Op::Div => Expr::Int(a.checked_div(b)?),
        Op::Rem => Expr::Int(a.checked_rem(b)?),
        Op::Shl => Expr::Int(a.checked_shl(u32::try_from(b).ok()?)?),
        Op::Shr => Expr::Int(((a as u64).checked_shr(u32::try_from(b).ok()?)?) as i64),
        Op::Eq => Expr::Bool(a == b),
        Op::Ne => Expr::Bool(a != b),
        Op::Lt => Expr::Bool(a < b),
        Op::Le => Expr::Bool(a <= b),
        Op::Gt => Expr::Bool(a > b),
        Op::Ge => Expr::Bool(a >= b),
        _ => return None,
    })
}

fn simplify_nary<V: Ord>(op: Op, args: Vec<Expr<V>>) -> Expr<V> {
    let logical = matches!(op, Op::And | Op::Or);

    let mut terms = Vec::with_capacity(args.len());
    let mut ints: Vec<i64> = Vec::new();
    let mut bools: Vec<bool> = Vec::new();
    for arg in args {
        match arg {
            Expr::Op(inner, nested) if inner == op => {
                for n in nested {
                    classify(n, logical, &mut terms, &mut ints, &mut bools);
                }
            }
            other => classify(other, logical, &mut terms, &mut ints, &mut bools),
        }
    }

    match op {
        Op::And | Op::BitAnd => {
            if bools.contains(&false) {
                return Expr::Bool(false);
            }
        }
        Op::Or => {
            if bools.contains(&true) {
                return Expr::Bool(true);
            }
        }
        _ => {}
    }
    match op {
        // `true` is the identity of a conjunction, `false` of a disjunction.
        Op::And => bools.retain(|b| !*b),
        // `true & x` keeps only bit 0 of `x`; that is a no-op once a 1-bit
        // term takes part.
        Op::BitAnd => {
            if (terms.is_empty() && ints.is_empty()) || terms.iter().any(Expr::is_predicate) {
                bools.retain(|b| !*b);
            }
        }
        Op::Or | Op::BitOr => bools.retain(|b| *b),
        _ => {}
    }
    terms.extend(bools.into_iter().map(Expr::Bool));

    if let Some(folded) = fold_ints(op, &ints) {
        if op == Op::BitAnd && folded == 0 {
            return Expr::Int(0);
        }
        if op == Op::Mul && folded == 0 {
            return Expr::Int(0);
        }
        let identity = match op {
            Op::Add | Op::BitOr | Op::BitXor => Some(0),
            Op::Mul => Some(1),
            _ => None,
        };
        if identity != Some(folded) {
            terms.push(Expr::Int(folded));
        }
    }

    terms.sort();
    if op.is_idempotent() {
        terms.dedup();
    }

    match terms.len() {
        0 => match op {
            Op::And | Op::BitAnd => Expr::Bool(true),
            Op::Or => Expr::Bool(false),
            Op::Mul => Expr::Int(1),
            _ => Expr::Int(0),
        },
        1 => {
            let term = terms.remove(0);
            if logical && !term.is_predicate() {
                // `x && true` is the truth value of `x`, not `x` itself.
                Expr::binary(Op::Ne, term, Expr::Int(0))
            } else {
                term
            }
        }
        _ => Expr::Op(op, terms),
    }
}

fn classify<V>(
    e: Expr<V>,
    logical: bool,
    terms: &mut Vec<Expr<V>>,
    ints: &mut Vec<i64>,
    bools: &mut Vec<bool>,
) {
    match e {
        Expr::Bool(b) => bools.push(b),
        Expr::Int(n) if logical => bools.push(n != 0),
        Expr::Int(n) => ints.push(n),
        other => terms.push(other),
    }
}

fn fold_ints(op: Op, ints: &[i64]) -> Option<i64> {
    let (first, rest) = ints.split_first()?;
    Some(rest.iter().fold(*first, |acc, n| match op {
        Op::Add => acc.wrapping_add(*n),
        Op::Mul => acc.wrapping_mul(*n),
        Op::BitAnd => acc & n,
        Op::BitOr => acc | n,
        Op::BitXor => acc ^ n,
        _ => acc,
    }))
}

// ── Evaluation ─────────────────────────────────────────────────────────────

/// A sized bit-vector value. Literals and arithmetic results are 64 bits
/// wide; bitwise results take the width of their widest operand. Stores into
/// a net truncate to the net's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    pub bits: i64,
    pub width: u32,
}

impl Value {
    /// Build a value, truncating `bits` to `width`.
    pub fn new(bits: i64, width: u32) -> Self {
        Value {
            bits: mask(bits, width),
            width,
        }
    }

    pub fn bit(b: bool) -> Self {
        Value::new(b as i64, 1)
    }

    pub fn is_true(self) -> bool {
        self.bits != 0
    }
}

fn mask(bits: i64, width: u32) -> i64 {
    if width >= 64 {
        bits
    } else {
        bits & ((1u64 << width) - 1) as i64
    }
}

impl<V: Copy> Expr<V> {
    /// Evaluate against `lookup`. Probes read like plain variables.
    pub fn evaluate(&self, lookup: &impl Fn(V) -> Option<Value>) -> Option<Value> {
        match self {
            Expr::Bool(b) => Some(Value::bit(*b)),
            Expr::Int(n) => Some(Value { bits: *n, width: 64 }),
            Expr::Var(v) | Expr::Probe(v) => lookup(*v),
            Expr::Op(op, args) => {
                let vals = args
                    .iter()
                    .map(|a| a.evaluate(lookup))
                    .collect::<Option<Vec<Value>>>()?;
                eval_op(*op, &vals)
            }
        }
    }
}

fn eval_op(op: Op, vals: &[Value]) -> Option<Value> {
    let width = vals.iter().map(|v| v.width).max()?;
    match op.arity() {
        Arity::Unary => {
            let a = *vals.first()?;
            Some(match op {
                Op::Not => Value::bit(!a.is_true()),
                Op::Inv => Value::new(!a.bits, a.width),
                _ => Value::new(a.bits.wrapping_neg(), 64),
            })
        }
        Arity::Binary => {
            let (a, b) = (vals.first()?.bits, vals.get(1)?.bits);
            Some(match op {
                Op::Sub => Value::new(a.wrapping_sub(b), 64),
                Op::Div => Value::new(a.checked_div(b)?, width),
                Op::Rem => Value::new(a.checked_rem(b)?, width),
                Op::Shl => Value::new(a.checked_shl(u32::try_from(b).ok()?).unwrap_or(0), 64),
                Op::Shr => Value::new(
                    ((a as u64).checked_shr(u32::try_from(b).ok()?).unwrap_or(0)) as i64,
                    vals[0].width,
                ),
                Op::Eq => Value::bit(a == b),
                Op::Ne => Value::bit(a != b),
                Op::Lt => Value::bit(a < b),
                Op::Le => Value::bit(a <= b),
                Op::Gt => Value::bit(a > b),
                _ => Value::bit(a >= b),
            })
        }
        Arity::Nary => Some(match op {
            Op::And => Value::bit(vals.iter().all(|v| v.is_true())),
            Op::Or => Value::bit(vals.iter().any(|v| v.is_true())),
            _ => {
                let bits = fold_ints(op, &vals.iter().map(|v| v.bits).collect::<Vec<_>>())?;
                let width = if matches!(op, Op::Add | Op::Mul) { 64 } else { width };
                Value::new(bits, width)
            }
        }),
    }
}

// ── Display ────────────────────────────────────────────────────────────────

/// Resolves variable indices to printable names.
pub trait NameLookup<V> {
    fn name_of(&self, v: V) -> Option<&str>;
}

struct NoNames;

impl<V> NameLookup<V> for NoNames {
    fn name_of(&self, _: V) -> Option<&str> {
        None
    }
}

/// An expression paired with the netlist that names its variables.
pub struct ExprDisplay<'a, V, L: ?Sized> {
    expr: &'a Expr<V>,
    names: &'a L,
}

impl<V> Expr<V> {
    pub fn display<'a, L: NameLookup<V> + ?Sized>(&'a self, names: &'a L) -> ExprDisplay<'a, V, L> {
        ExprDisplay { expr: self, names }
    }
}

impl<V: Copy + fmt::Display, L: NameLookup<V> + ?Sized> fmt::Display for ExprDisplay<'_, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self.expr, self.names)
    }
}

impl<V: Copy + fmt::Display> fmt::Display for Expr<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, &NoNames)
    }
}

fn write_var<V: Copy + fmt::Display, L: NameLookup<V> + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    v: V,
    names: &L,
) -> fmt::Result {
    match names.name_of(v) {
        Some(name) => write!(f, "{}", name),
        None => write!(f, "{}", v),
    }
}

fn write_expr<V: Copy + fmt::Display, L: NameLookup<V> + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    e: &Expr<V>,
    names: &L,
) -> fmt::Result {
    match e {
        Expr::Bool(b) => write!(f, "{}", b),
        Expr::Int(n) => write!(f, "{}", n),
        Expr::Var(v) => write_var(f, *v, names),
        Expr::Probe(v) => {
            write!(f, "probe(")?;
            write_var(f, *v, names)?;
            write!(f, ")")
        }
        Expr::Op(op, args) => {
            if op.arity() == Arity::Unary {
                write!(f, "{}", op.symbol())?;
                for arg in args {
                    write_operand(f, arg, op.precedence(), names)?;
                }
                return Ok(());
            }
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op.symbol())?;
                }
                write_operand(f, arg, op.precedence(), names)?;
            }
            Ok(())
        }
    }
}

fn write_operand<V: Copy + fmt::Display, L: NameLookup<V> + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    e: &Expr<V>,
    parent: u8,
    names: &L,
) -> fmt::Result {
    match e {
        Expr::Op(op, _) if op.precedence() <= parent => {
            write!(f, "(")?;
            write_expr(f, e, names)?;
            write!(f, ")")
        }
        Expr::Int(n) if *n < 0 => write!(f, "({})", n),
        _ => write_expr(f, e, names),
    }
}
