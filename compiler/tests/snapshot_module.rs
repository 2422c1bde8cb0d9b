// Snapshot tests: lock the module listing to detect unintended changes in
// net allocation order, assignment rendering, or guard canonicalization.
//
// Uses the library API (build Func → synthesize) and snapshots the Display
// output inline. Run `cargo insta review` after intentional output changes.

use flowc::expr::Expr;
use flowc::flow::{Func, Purpose, Type};
use flowc::synth::{synthesize_with, SynthOptions};

fn buffer() -> Func {
    let mut func = Func::new("buffer");
    let l = func.push_net("L", Type::fixed(16), Purpose::In);
    let r = func.push_net("R", Type::fixed(16), Purpose::Out);
    let b = func.push_cond(true);
    func[b].req(r, Expr::var(l)).ack(l);
    func
}

fn listing(func: &Func, options: &SynthOptions) -> String {
    synthesize_with(func, options)
        .unwrap_or_else(|e| panic!("synthesis failed: {}", e))
        .to_string()
}

#[test]
fn snapshot_buffer_module() {
    insta::assert_snapshot!(listing(&buffer(), &SynthOptions::default()), @r###"
    module buffer
      in clk: bits<1>
      in reset: bits<1>
      in L_valid: bits<1>
      out L_ready: bits<1>
      in L_data: fixed<16>
      out R_valid: bits<1>
      reg R_valid_reg: bits<1>
      in R_ready: bits<1>
      out R_data: fixed<16>
      reg R_state: fixed<16>
      wire case_0_ready: bits<1>
      reg branch_id: bits<1>
      assign R_valid = R_valid_reg;
      assign R_data = R_state;
      assign case_0_ready = L_valid & branch_id == 0 & (R_ready | ~R_valid_reg);
      assign L_ready = case_0_ready;
      always @(clk)
        reset
          R_valid_reg <= 0;
          R_state <= 0;
          branch_id <= 0;
        rule L_valid & (R_ready | ~R_valid_reg)
          branch_id <= 0;
          R_state <= L_data;
          R_valid_reg <= 1;
        else R_ready
          R_valid_reg <= 0;
    endmodule
    "###);
}

#[test]
fn debug_checks_add_one_wire_per_output() {
    let plain = listing(&buffer(), &SynthOptions::default());
    let checked = listing(&buffer(), &SynthOptions { debug_checks: true });

    let added: Vec<&str> = checked
        .lines()
        .filter(|line| !plain.lines().any(|p| p == *line))
        .collect();
    assert_eq!(
        added,
        ["  wire __R_ok: bits<1>", "  assign __R_ok = ~R_valid_reg | R_ready;"]
    );
}
