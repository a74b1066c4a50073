// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register console for bringing up a Slotbridge link by hand: constructs a
//! card from a manifest and lets you poke its four registers from stdin
//! while the listener thread feeds received bytes in the background.

use anyhow::{anyhow, Context};
use clap::Parser;
use slotbridge_config::{CardConfig, TraceOptions};
use slotbridge_core::{
    Card, SlotDevice, INPUT_BYTE_REG, INPUT_FLAGS_REG, OUTPUT_BYTE_REG, OUTPUT_FLAGS_REG,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn parse_byte(s: &str) -> Result<u8, String> {
    let trimmed = s.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);
    u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid byte '{}': {}", s, e))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Slotbridge card console", long_about = None)]
struct Cli {
    /// Path to a YAML card manifest
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Firmware ROM image (overrides the manifest)
    #[arg(long)]
    rom: Option<PathBuf>,

    /// Local UDP receive port (overrides the manifest; 0 = ephemeral)
    #[arg(long)]
    listen_port: Option<u16>,

    /// Peer endpoint as host:port (overrides the manifest)
    #[arg(long)]
    peer: Option<String>,

    /// Enable trace-level logging and all card trace channels
    #[arg(short, long)]
    trace: bool,
}

fn build_config(cli: &Cli) -> anyhow::Result<CardConfig> {
    let mut config = match &cli.config {
        Some(path) => CardConfig::from_file(path)?,
        None => CardConfig::default(),
    };
    if let Some(rom) = &cli.rom {
        config.rom = Some(rom.clone());
    }
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(peer) = &cli.peer {
        let (host, port) = peer
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("peer must be host:port, got '{}'", peer))?;
        config.peer_host = host.to_string();
        config.peer_port = port
            .parse()
            .with_context(|| format!("Invalid peer port '{}'", port))?;
    }
    if cli.trace {
        config.trace = TraceOptions {
            io: true,
            firmware: true,
            handshake: true,
        };
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let card = match Card::new(&config) {
        Ok(card) => card,
        Err(e) => {
            error!("Failed to open card socket: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    run_console(card)
}

fn run_console(mut card: Card) -> ExitCode {
    info!("Commands: rs | rd | wd <hex> | wf <hex> | reset | status | quit");
    info!("Note: rd blocks until the peer sends a byte");

    let stdin = std::io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["rs"] => println!("{:#04x}", card.io_read(INPUT_FLAGS_REG)),
            ["rd"] => println!("{:#04x}", card.io_read(INPUT_BYTE_REG)),
            ["wd", value] => match parse_byte(value) {
                Ok(byte) => card.io_write(OUTPUT_BYTE_REG, byte),
                Err(e) => println!("{}", e),
            },
            ["wf", value] => match parse_byte(value) {
                Ok(byte) => card.io_write(OUTPUT_FLAGS_REG, byte),
                Err(e) => println!("{}", e),
            },
            ["reset"] => card.reset(),
            ["status"] => match serde_json::to_string_pretty(&card.snapshot()) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to render status: {}", e),
            },
            ["quit"] | ["exit"] | ["q"] => break,
            _ => println!("unknown command '{}'", line.trim()),
        }
        prompt();
    }
    ExitCode::from(EXIT_OK)
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
