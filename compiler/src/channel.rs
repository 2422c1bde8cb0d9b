// channel.rs — Channel Builder
//
// Allocates, for one dataflow net, the clocked wires and registers that
// implement its valid/ready handshake, and records the result in the
// module's channel table.
//
// Preconditions: called once per source net, in source order, so the
//   channel table stays index-aligned with `Func::nets`.
// Postconditions: returns the channel just recorded; Out channels have their
//   port wiring, reset values and drain rule in place.
// Failure modes: none (the purpose set is closed).
// Side effects: appends to the builder; logs each channel at debug level.

use log::debug;

use crate::clocked::{self, Assign, Channel, ModuleBuilder, Rule};
use crate::expr::Expr;
use crate::flow;
use crate::synth::SynthOptions;

/// One-to-one tag/width/shift copy.
pub fn translate_type(ty: flow::Type) -> clocked::Type {
    let kind = match ty.kind {
        flow::TypeKind::Bits => clocked::TypeKind::Bits,
        flow::TypeKind::Fixed => clocked::TypeKind::Fixed,
    };
    clocked::Type {
        kind,
        width: ty.width,
        shift: ty.shift,
    }
}

pub fn build_channel(
    builder: &mut ModuleBuilder,
    net: &flow::Net,
    options: &SynthOptions,
) -> Channel {
    let chan = match net.purpose {
        flow::Purpose::In => build_input(builder, net),
        flow::Purpose::Out => build_output(builder, net, options),
        flow::Purpose::Reg => build_register(builder, net),
        flow::Purpose::Cond => Channel::Cond {
            ready: builder.push_net(
                format!("{}_ready", net.name),
                clocked::Type::wire(),
                clocked::Purpose::Wire,
            ),
        },
        flow::Purpose::None => Channel::None,
    };
    let id = builder.push_channel(chan);
    debug!("channel {} `{}`: {:?}", id, net.name, chan);
    chan
}

// The upstream producer holds data stable while valid is high, so an input
// needs no registers.
fn build_input(b: &mut ModuleBuilder, net: &flow::Net) -> Channel {
    let valid = b.push_net(
        format!("{}_valid", net.name),
        clocked::Type::wire(),
        clocked::Purpose::In,
    );
    let ready = b.push_net(
        format!("{}_ready", net.name),
        clocked::Type::wire(),
        clocked::Purpose::Out,
    );
    let data = b.push_net(
        format!("{}_data", net.name),
        translate_type(net.ty),
        clocked::Purpose::In,
    );
    Channel::In { valid, ready, data }
}

// Valid is held in a register until the consumer raises ready, even across
// cycles where no branch drives the output.
fn build_output(b: &mut ModuleBuilder, net: &flow::Net, options: &SynthOptions) -> Channel {
    let ty = translate_type(net.ty);

    let valid_wire = b.push_net(
        format!("{}_valid", net.name),
        clocked::Type::wire(),
        clocked::Purpose::Out,
    );
    let valid = b.push_net(
        format!("{}_valid_reg", net.name),
        clocked::Type::wire(),
        clocked::Purpose::Reg,
    );
    b.push_assign(valid_wire, Expr::var(valid));
    b.push_reset(valid, 0);

    let ready = b.push_net(
        format!("{}_ready", net.name),
        clocked::Type::wire(),
        clocked::Purpose::In,
    );
    // Drained by the consumer, unless a firing branch re-asserts it.
    b.push_fallback(Rule::new(Expr::var(ready)).with_assign(Assign::registered(valid, 0)));

    let data_wire = b.push_net(format!("{}_data", net.name), ty, clocked::Purpose::Out);
    let data = b.push_net(format!("{}_state", net.name), ty, clocked::Purpose::Reg);
    b.push_assign(data_wire, Expr::var(data));
    b.push_reset(data, 0);

    if options.debug_checks {
        let ok = b.push_net(
            format!("__{}_ok", net.name),
            clocked::Type::wire(),
            clocked::Purpose::Wire,
        );
        b.push_assign(ok, !Expr::var(valid) | Expr::var(ready));
    }

    Channel::Out { valid, ready, data }
}

// Internal state is always implicitly valid.
fn build_register(b: &mut ModuleBuilder, net: &flow::Net) -> Channel {
    let data = b.push_net(
        format!("{}_data", net.name),
        translate_type(net.ty),
        clocked::Purpose::Reg,
    );
    b.push_reset(data, 0);
    Channel::Reg { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ClkNetId;

    fn net(name: &str, purpose: flow::Purpose) -> flow::Net {
        flow::Net::new(name, flow::Type::default(), purpose)
    }

    fn names(module: &clocked::Module) -> Vec<&str> {
        module.nets().iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn input_allocates_three_ports() {
        let mut b = ModuleBuilder::new("m");
        let chan = build_channel(&mut b, &net("L", flow::Purpose::In), &SynthOptions::default());
        let module = b.finish();

        assert_eq!(
            chan,
            Channel::In {
                valid: ClkNetId(2),
                ready: ClkNetId(3),
                data: ClkNetId(4),
            }
        );
        assert_eq!(names(&module), ["clk", "reset", "L_valid", "L_ready", "L_data"]);
        assert_eq!(module.nets()[3].purpose, clocked::Purpose::Out);
        assert_eq!(module.nets()[4].ty, clocked::Type {
            kind: clocked::TypeKind::Fixed,
            width: 16,
            shift: 0,
        });
        assert!(module.assigns().is_empty());
        assert!(module.blocks()[0].reset.is_empty());
    }

    #[test]
    fn output_holds_valid_in_a_register() {
        let mut b = ModuleBuilder::new("m");
        let chan = build_channel(&mut b, &net("R", flow::Purpose::Out), &SynthOptions::default());
        let module = b.finish();

        assert_eq!(
            names(&module),
            ["clk", "reset", "R_valid", "R_valid_reg", "R_ready", "R_data", "R_state"]
        );
        let valid = chan.valid().unwrap();
        assert_eq!(module.nets()[valid.index()].name, "R_valid_reg");
        assert_eq!(module.nets()[valid.index()].purpose, clocked::Purpose::Reg);
        assert_eq!(module.nets()[chan.data().unwrap().index()].name, "R_state");

        let wiring: Vec<String> = module
            .assigns()
            .iter()
            .map(|a| a.display(&module).to_string())
            .collect();
        assert_eq!(wiring, ["R_valid = R_valid_reg", "R_data = R_state"]);

        let block = &module.blocks()[0];
        assert_eq!(block.reset.len(), 2);
        assert_eq!(block.fallback.len(), 1);
        assert_eq!(block.fallback[0].guard, Expr::var(chan.ready().unwrap()));
        assert_eq!(block.fallback[0].assigns[0].display(&module).to_string(), "R_valid_reg <= 0");
    }

    #[test]
    fn debug_checks_add_ok_wire() {
        let mut b = ModuleBuilder::new("m");
        let options = SynthOptions { debug_checks: true };
        build_channel(&mut b, &net("R", flow::Purpose::Out), &options);
        let module = b.finish();

        let ok = module.net_index("__R_ok").unwrap();
        let driver = module.driver_of(ok).unwrap();
        assert_eq!(driver.display(&module).to_string(), "__R_ok = ~R_valid_reg | R_ready");
    }

    #[test]
    fn register_and_condition_channels() {
        let mut b = ModuleBuilder::new("m");
        let options = SynthOptions::default();
        let reg = build_channel(&mut b, &net("S", flow::Purpose::Reg), &options);
        let cond = build_channel(&mut b, &net("case_0", flow::Purpose::Cond), &options);
        let none = build_channel(&mut b, &net("x", flow::Purpose::None), &options);
        let module = b.finish();

        assert_eq!(reg, Channel::Reg { data: ClkNetId(2) });
        assert_eq!(cond, Channel::Cond { ready: ClkNetId(3) });
        assert_eq!(none, Channel::None);
        assert_eq!(names(&module), ["clk", "reset", "S_data", "case_0_ready"]);
        assert_eq!(module.chans().len(), 3);
        assert_eq!(module.blocks()[0].reset.len(), 1);
    }
}
