// flowc — lowering of guarded dataflow functions to clocked RTL
//
// Library root. `flow` and `clocked` are the source and target netlists,
// `expr` their shared expression language; `synth` connects them.

pub mod channel;
pub mod check;
pub mod clocked;
pub mod diag;
pub mod expr;
pub mod flow;
pub mod id;
pub mod pipeline;
pub mod probe;
pub mod scan;
pub mod sim;
pub mod synth;
