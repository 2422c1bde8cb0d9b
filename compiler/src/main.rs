use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    /// Human-readable module listing
    Module,
    /// Synthesized module as JSON
    Json,
    /// Provenance of the input function as JSON
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "flowc",
    version,
    about = "flowc — lowers guarded dataflow functions to clocked valid/ready RTL modules"
)]
struct Cli {
    /// Input function, serialized as JSON
    source: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Module)]
    emit: EmitStage,

    /// Emit per-output `__<net>_ok` check wires
    #[arg(long)]
    debug_checks: bool,

    /// Print synthesis decisions and phase timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    log::debug!("source = {}", cli.source.display());
    log::debug!("emit   = {:?}", cli.emit);

    // ── Read and decode the function ──
    let text = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("flowc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };
    let func: flowc::flow::Func = match serde_json::from_str(&text) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("flowc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    if let EmitStage::BuildInfo = cli.emit {
        let provenance = flowc::pipeline::compute_provenance(&func);
        write_output(cli.output.as_ref(), &provenance.to_json());
        return;
    }

    // ── Check and synthesize ──
    let options = flowc::synth::SynthOptions {
        debug_checks: cli.debug_checks,
    };
    let result = flowc::pipeline::compile_with(&func, &options, |_, diags| {
        for diag in diags {
            eprintln!("flowc: {}", diag);
        }
    });
    let module = match result.module {
        Some(m) => m,
        None => {
            eprintln!(
                "flowc: synthesis of `{}` failed with {} error(s)",
                func.name,
                result.diagnostics.iter().filter(|d| d.is_error()).count()
            );
            std::process::exit(1);
        }
    };

    let rendered = match cli.emit {
        EmitStage::Json => match serde_json::to_string_pretty(&module) {
            Ok(s) => s + "\n",
            Err(e) => {
                eprintln!("flowc: error: {}", e);
                std::process::exit(2);
            }
        },
        _ => format!("{}\n", module),
    };
    write_output(cli.output.as_ref(), &rendered);
}

fn write_output(path: Option<&PathBuf>, text: &str) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("flowc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }
}
