//! A small driver for exercising a `ForwardingModule` from the command
//! line: subcommands mirror the five control-plane commands plus `init`,
//! feeding synthetic 8-byte packet heads through `process_batch` the way
//! a surrounding pipeline runtime's dispatch loop would.

use clap::{Parser, Subcommand};
use l2fwd::{Command as TableCommand, ForwardingModule, GateId, TableConfig};

#[derive(Parser)]
#[command(name = "l2fwd-demo", about = "Drive an l2fwd ForwardingModule from the command line")]
struct Cli {
    #[arg(long, default_value_t = l2fwd::DEFAULT_SIZE)]
    size: usize,
    #[arg(long, default_value_t = l2fwd::DEFAULT_BUCKET)]
    bucket: usize,
    #[arg(long, default_value_t = 16)]
    max_gates: u16,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Insert `mac=gate` entries.
    Add {
        #[arg(value_parser = parse_mac_gate)]
        entries: Vec<(String, u16)>,
    },
    /// Remove entries by MAC.
    Delete { macs: Vec<String> },
    /// Look up gates for the given MACs, aborting on the first miss.
    Lookup { macs: Vec<String> },
    /// Replace the module's default gate.
    SetDefaultGate { gate: u16 },
    /// Synthesize `count` sequential entries starting at `base`.
    Populate {
        base: String,
        count: usize,
        gate_count: u16,
    },
    /// Feed synthetic packet heads through `process_batch` and print the
    /// resulting gates.
    Classify { macs: Vec<String> },
}

fn parse_mac_gate(s: &str) -> Result<(String, u16), String> {
    let (mac, gate) = s.split_once('=').ok_or_else(|| format!("expected mac=gate, got `{s}`"))?;
    let gate: u16 = gate.parse().map_err(|_| format!("invalid gate `{gate}`"))?;
    Ok((mac.to_string(), gate))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let module = match ForwardingModule::init(
        TableConfig { size: cli.size, bucket: cli.bucket },
        cli.max_gates,
    ) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("init failed: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.action {
        Action::Add { entries } => module.dispatch(TableCommand::Add(entries)),
        Action::Delete { macs } => module.dispatch(TableCommand::Delete(macs)),
        Action::Lookup { macs } => module.dispatch(TableCommand::Lookup(macs)),
        Action::SetDefaultGate { gate } => module.dispatch(TableCommand::SetDefaultGate(gate)),
        Action::Populate { base, count, gate_count } => {
            module.dispatch(TableCommand::Populate { base, count, gate_count })
        }
        Action::Classify { macs } => {
            let heads: Vec<[u8; 8]> = macs
                .iter()
                .map(|s| {
                    let mac = l2fwd::MacAddress::parse(s).unwrap_or_else(|e| {
                        eprintln!("{e}");
                        std::process::exit(1);
                    });
                    let mut head = [0u8; 8];
                    head[..6].copy_from_slice(&mac.to_wire_bytes());
                    head
                })
                .collect();
            let mut ogates = vec![GateId::new(0); heads.len()];
            module.process_batch(&heads, &mut ogates);
            for (mac, gate) in macs.iter().zip(ogates) {
                println!("{mac} -> {gate}");
            }
            return;
        }
    };

    match result {
        Ok(reply) => println!("{reply:?}"),
        Err(e) => {
            eprintln!("command failed: {e}");
            std::process::exit(1);
        }
    }
}
