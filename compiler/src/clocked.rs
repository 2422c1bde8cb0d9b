// clocked.rs — Clocked RTL netlist: the output of synthesis
//
// A `Module` is a flat list of wires and registers, a channel table that is
// index-aligned with the source `Func`'s nets, top-level continuous
// assignments, and clocked blocks of guarded rules. Modules are only built
// through `ModuleBuilder`, which owns the open block and hands out typed
// `ClkNetId`s; once finished, a `Module` is read-only.
//
// Preconditions: callers push only `ClkNetId`s returned by the same builder.
// Postconditions: net indices are dense and never reordered.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, NameLookup};
use crate::id::{ClkNetId, NetId};

/// Expression over clocked nets.
pub type ClkExpr = Expr<ClkNetId>;

// ── Nets ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Bits,
    Fixed,
}

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

    /// A single-bit control wire.
    pub fn wire() -> Self {
        Type::bits(1)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.shift) {
            (TypeKind::Bits, _) => write!(f, "bits<{}>", self.width),
            (TypeKind::Fixed, 0) => write!(f, "fixed<{}>", self.width),
            (TypeKind::Fixed, shift) => write!(f, "fixed<{}, {}>", self.width, shift),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    Wire,
    In,
    Out,
    Reg,
}

impl Purpose {
    pub fn keyword(self) -> &'static str {
        match self {
            Purpose::Wire => "wire",
            Purpose::In => "in",
            Purpose::Out => "out",
            Purpose::Reg => "reg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    pub ty: Type,
    pub purpose: Purpose,
}

// ── Channels ───────────────────────────────────────────────────────────────

/// Clocked realization of one source net. Which wires exist depends on the
/// source purpose; absent wires are simply not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    /// Source net with no channel (unbound `None` purpose).
    None,
    /// Consumed input: all three wires are module ports.
    In {
        valid: ClkNetId,
        ready: ClkNetId,
        data: ClkNetId,
    },
    /// Produced output. `valid` is the held valid register and `data` the
    /// state register; the port wires mirror them through continuous
    /// assignments.
    Out {
        valid: ClkNetId,
        ready: ClkNetId,
        data: ClkNetId,
    },
    /// Internal memory, always implicitly valid.
    Reg { data: ClkNetId },
    /// Per-condition readiness.
    Cond { ready: ClkNetId },
}

impl Channel {
    pub fn valid(&self) -> Option<ClkNetId> {
        match *self {
            Channel::In { valid, .. } | Channel::Out { valid, .. } => Some(valid),
            _ => None,
        }
    }

    pub fn ready(&self) -> Option<ClkNetId> {
        match *self {
            Channel::In { ready, .. } | Channel::Out { ready, .. } | Channel::Cond { ready } => {
                Some(ready)
            }
            _ => None,
        }
    }

    pub fn data(&self) -> Option<ClkNetId> {
        match *self {
            Channel::In { data, .. } | Channel::Out { data, .. } | Channel::Reg { data } => {
                Some(data)
            }
            _ => None,
        }
    }
}

// ── Behavior ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assign {
    pub net: ClkNetId,
    pub expr: ClkExpr,
    /// Continuous (immediate) wiring rather than a clock-edge update.
    pub blocking: bool,
}

impl Assign {
    pub fn continuous(net: ClkNetId, expr: impl Into<ClkExpr>) -> Self {
        Assign {
            net,
            expr: expr.into(),
            blocking: true,
        }
    }

    pub fn registered(net: ClkNetId, expr: impl Into<ClkExpr>) -> Self {
        Assign {
            net,
            expr: expr.into(),
            blocking: false,
        }
    }

    /// Render as `net = expr` (continuous) or `net <= expr` (registered).
    pub fn display<'a>(&'a self, module: &'a Module) -> AssignDisplay<'a> {
        AssignDisplay {
            assign: self,
            module,
        }
    }
}

pub struct AssignDisplay<'a> {
    assign: &'a Assign,
    module: &'a Module,
}

impl fmt::Display for AssignDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.assign.blocking { "=" } else { "<=" };
        match self.module.name_of(self.assign.net) {
            Some(name) => write!(f, "{} {} ", name, arrow)?,
            None => write!(f, "{} {} ", self.assign.net, arrow)?,
        }
        write!(f, "{}", self.assign.expr.display(self.module))
    }
}

/// Registered updates taken on a clock edge when `guard` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub guard: ClkExpr,
    pub assigns: Vec<Assign>,
}

impl Rule {
    pub fn new(guard: impl Into<ClkExpr>) -> Self {
        Rule {
            guard: guard.into(),
            assigns: Vec::new(),
        }
    }

    pub fn with_assign(mut self, assign: Assign) -> Self {
        self.assigns.push(assign);
        self
    }
}

/// One clocked process.
///
/// On an edge with reset high only `reset` applies. Otherwise every
/// `fallback` rule whose guard holds applies, then the first `rules` entry
/// whose guard holds, overriding fallback writes to the same net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub clk: ClkExpr,
    pub reset: Vec<Assign>,
    pub rules: Vec<Rule>,
    pub fallback: Vec<Rule>,
}

impl Block {
    pub fn new(clk: ClkExpr) -> Self {
        Block {
            clk,
            reset: Vec::new(),
            rules: Vec::new(),
            fallback: Vec::new(),
        }
    }
}

// ── Module ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    name: String,
    nets: Vec<Net>,
    chans: Vec<Channel>,
    clk: ClkNetId,
    reset: ClkNetId,
    assigns: Vec<Assign>,
    blocks: Vec<Block>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn net(&self, id: ClkNetId) -> Option<&Net> {
        self.nets.get(id.index())
    }

    pub fn net_index(&self, name: &str) -> Option<ClkNetId> {
        self.nets
            .iter()
            .position(|n| n.name == name)
            .map(ClkNetId::from_index)
    }

    pub fn iter_nets(&self) -> impl Iterator<Item = (ClkNetId, &Net)> + '_ {
        self.nets
            .iter()
            .enumerate()
            .map(|(i, n)| (ClkNetId::from_index(i), n))
    }

    /// Channel table, index-aligned with the source `Func`'s nets.
    pub fn chans(&self) -> &[Channel] {
        &self.chans
    }

    pub fn chan(&self, source: NetId) -> Option<&Channel> {
        self.chans.get(source.index())
    }

    pub fn clk(&self) -> ClkNetId {
        self.clk
    }

    pub fn reset(&self) -> ClkNetId {
        self.reset
    }

    /// Top-level continuous assignments.
    pub fn assigns(&self) -> &[Assign] {
        &self.assigns
    }

    /// The continuous assignment driving `net`, if any.
    pub fn driver_of(&self, net: ClkNetId) -> Option<&Assign> {
        self.assigns.iter().find(|a| a.net == net)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

impl NameLookup<ClkNetId> for Module {
    fn name_of(&self, id: ClkNetId) -> Option<&str> {
        self.net(id).map(|n| n.name.as_str())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for net in &self.nets {
            writeln!(f, "  {} {}: {}", net.purpose.keyword(), net.name, net.ty)?;
        }
        for assign in &self.assigns {
            writeln!(f, "  assign {};", assign.display(self))?;
        }
        for block in &self.blocks {
            writeln!(f, "  always @({})", block.clk.display(self))?;
            if !block.reset.is_empty() {
                writeln!(f, "    reset")?;
                for assign in &block.reset {
                    writeln!(f, "      {};", assign.display(self))?;
                }
            }
            for rule in &block.rules {
                writeln!(f, "    rule {}", rule.guard.display(self))?;
                for assign in &rule.assigns {
                    writeln!(f, "      {};", assign.display(self))?;
                }
            }
            for rule in &block.fallback {
                writeln!(f, "    else {}", rule.guard.display(self))?;
                for assign in &rule.assigns {
                    writeln!(f, "      {};", assign.display(self))?;
                }
            }
        }
        write!(f, "endmodule")
    }
}

// ── Builder ────────────────────────────────────────────────────────────────

/// Append-only construction of a `Module` with a single open clocked block.
///
/// `new` allocates the `clk` and `reset` inputs and opens the block
/// triggered on `clk`; `finish` closes it.
pub struct ModuleBuilder {
    module: Module,
    open: Block,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut module = Module {
            name: name.into(),
            nets: Vec::new(),
            chans: Vec::new(),
            clk: ClkNetId(0),
            reset: ClkNetId(0),
            assigns: Vec::new(),
            blocks: Vec::new(),
        };
        module.clk = push(&mut module.nets, "clk", Type::wire(), Purpose::In);
        module.reset = push(&mut module.nets, "reset", Type::wire(), Purpose::In);
        let open = Block::new(Expr::var(module.clk));
        ModuleBuilder { module, open }
    }

    pub fn push_net(&mut self, name: impl Into<String>, ty: Type, purpose: Purpose) -> ClkNetId {
        push(&mut self.module.nets, name, ty, purpose)
    }

    /// Record the channel of the next source net.
    pub fn push_channel(&mut self, chan: Channel) -> NetId {
        let id = NetId::from_index(self.module.chans.len());
        self.module.chans.push(chan);
        id
    }

    pub fn push_assign(&mut self, net: ClkNetId, expr: impl Into<ClkExpr>) {
        self.module.assigns.push(Assign::continuous(net, expr));
    }

    pub fn push_reset(&mut self, net: ClkNetId, value: impl Into<ClkExpr>) {
        self.open.reset.push(Assign::registered(net, value));
    }

    pub fn push_rule(&mut self, rule: Rule) {
        self.open.rules.push(rule);
    }

    pub fn push_fallback(&mut self, rule: Rule) {
        self.open.fallback.push(rule);
    }

    /// Read access to the module under construction.
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        let ModuleBuilder { mut module, open } = self;
        module.blocks.push(open);
        module
    }
}

fn push(nets: &mut Vec<Net>, name: impl Into<String>, ty: Type, purpose: Purpose) -> ClkNetId {
    let id = ClkNetId::from_index(nets.len());
    nets.push(Net {
        name: name.into(),
        ty,
        purpose,
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_starts_with_clock_and_reset() {
        let module = ModuleBuilder::new("m").finish();
        assert_eq!(module.clk(), ClkNetId(0));
        assert_eq!(module.reset(), ClkNetId(1));
        assert_eq!(module.nets()[0].name, "clk");
        assert_eq!(module.nets()[1].purpose, Purpose::In);
        assert_eq!(module.blocks().len(), 1);
        assert_eq!(module.blocks()[0].clk, Expr::var(ClkNetId(0)));
    }

    #[test]
    fn channel_accessors_follow_variant() {
        let inp = Channel::In {
            valid: ClkNetId(2),
            ready: ClkNetId(3),
            data: ClkNetId(4),
        };
        assert_eq!(inp.valid(), Some(ClkNetId(2)));
        assert_eq!(inp.ready(), Some(ClkNetId(3)));
        assert_eq!(inp.data(), Some(ClkNetId(4)));

        let reg = Channel::Reg { data: ClkNetId(5) };
        assert_eq!(reg.valid(), None);
        assert_eq!(reg.ready(), None);

        let cond = Channel::Cond { ready: ClkNetId(6) };
        assert_eq!(cond.ready(), Some(ClkNetId(6)));
        assert_eq!(cond.data(), None);
        assert_eq!(Channel::None.ready(), None);
    }

    #[test]
    fn listing_names_every_net() {
        let mut b = ModuleBuilder::new("tiny");
        let q = b.push_net("q", Type::bits(4), Purpose::Reg);
        let o = b.push_net("o", Type::bits(4), Purpose::Out);
        b.push_assign(o, Expr::var(q));
        b.push_reset(q, 0);
        b.push_rule(Rule::new(true).with_assign(Assign::registered(q, Expr::var(q) + 1)));
        let module = b.finish();

        assert_eq!(
            module.to_string(),
            "module tiny\n\
             \x20 in clk: bits<1>\n\
             \x20 in reset: bits<1>\n\
             \x20 reg q: bits<4>\n\
             \x20 out o: bits<4>\n\
             \x20 assign o = q;\n\
             \x20 always @(clk)\n\
             \x20   reset\n\
             \x20     q <= 0;\n\
             \x20   rule true\n\
             \x20     q <= q + 1;\n\
             endmodule"
        );
    }

    #[test]
    fn type_display() {
        assert_eq!(Type::bits(3).to_string(), "bits<3>");
        let fixed = Type {
            kind: TypeKind::Fixed,
            width: 16,
            shift: -2,
        };
        assert_eq!(fixed.to_string(), "fixed<16, -2>");
    }
}
