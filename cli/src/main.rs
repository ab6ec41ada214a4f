// fts — BLE file transfer simulator
//
// Runs files through two file transfer services joined by an in-memory link
// and manages the simulator configuration.

mod config;
mod sim;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use fts_core::transport::ble::{fragments, max_packet_length_for_mtu};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fts")]
#[command(about = "FTS — BLE file transfer service simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Tracing filter (overrides config, ignored when RUST_LOG is set)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file through the loopback link
    Send {
        file: PathBuf,
        /// ATT MTU of the link
        #[arg(short, long)]
        mtu: Option<u16>,
        /// Largest fragment the sender may emit
        #[arg(short, long)]
        fragment_cap: Option<u32>,
        /// Packets the radio buffers before applying backpressure
        #[arg(short, long)]
        slots: Option<usize>,
        /// Drop the data subscription for one round after N fragments
        #[arg(long)]
        pause_after: Option<u64>,
    },
    /// Show how a file would be fragmented
    Plan {
        file: PathBuf,
        #[arg(short, long)]
        mtu: Option<u16>,
        #[arg(short, long)]
        fragment_cap: Option<u32>,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let default_filter = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    match cli.command {
        Commands::Send {
            file,
            mtu,
            fragment_cap,
            slots,
            pause_after,
        } => {
            let options = sim::SimOptions {
                att_mtu: mtu.unwrap_or(config.att_mtu),
                fragment_cap: fragment_cap.unwrap_or(config.fragment_cap),
                tx_buffer_slots: slots.unwrap_or(config.tx_buffer_slots),
                max_command_len: config.max_command_len,
                pause_after,
            };
            cmd_send(file, options)
        }
        Commands::Plan {
            file,
            mtu,
            fragment_cap,
        } => cmd_plan(
            file,
            mtu.unwrap_or(config.att_mtu),
            fragment_cap.unwrap_or(config.fragment_cap),
        ),
        Commands::Config { action } => cmd_config(config, action),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if data.is_empty() {
        anyhow::bail!("{} is empty", path.display());
    }
    Ok(data)
}

fn cmd_send(path: PathBuf, options: sim::SimOptions) -> Result<()> {
    let data = read_file(&path)?;

    println!("{}", "FTS — Loopback transfer".bold());
    println!("  File:         {}", path.display().to_string().bright_cyan());
    println!("  Size:         {} bytes", data.len());
    println!("  ATT MTU:      {}", options.att_mtu);
    println!("  Fragment cap: {}", options.fragment_cap);
    println!();

    let report = sim::run(&data, &options)?;

    println!("  {} Packet length:  {}", "•".bright_green(), report.max_data_len);
    println!("  {} Bytes sent:     {}", "•".bright_green(), report.bytes);
    println!("  {} Fragments sent: {}", "•".bright_green(), report.sender.fragments_sent);
    println!("  {} Rounds:         {}", "•".bright_green(), report.rounds);
    if report.paused_rounds > 0 {
        println!("  {} Paused rounds:  {}", "•".bright_yellow(), report.paused_rounds);
    }
    println!("  {} Bytes received: {}", "•".bright_green(), report.receiver.bytes_received);
    println!();

    if report.verified() {
        println!("{} Transfer verified ({})", "✓".green(), report.received_digest.dimmed());
        Ok(())
    } else {
        println!("{} Digest mismatch", "✗".red());
        println!("  sent:     {}", report.sent_digest);
        println!("  received: {}", report.received_digest);
        anyhow::bail!("Transfer corrupted")
    }
}

fn cmd_plan(path: PathBuf, att_mtu: u16, fragment_cap: u32) -> Result<()> {
    let data = read_file(&path)?;
    let max_packet = max_packet_length_for_mtu(att_mtu);
    let cap = fragment_cap.min(u32::from(max_packet)) as usize;
    if cap == 0 {
        anyhow::bail!("MTU {} leaves no room for payload", att_mtu);
    }

    let plan = fragments(&data, cap);
    let count = plan.len();
    let tail = plan.last().map_or(0, <[u8]>::len);

    println!("{}", "Fragment plan".bold());
    println!("  {:<16} {}", "file".bright_cyan(), path.display());
    println!("  {:<16} {}", "bytes".bright_cyan(), data.len());
    println!("  {:<16} {}", "packet length".bright_cyan(), max_packet);
    println!("  {:<16} {}", "fragment size".bright_cyan(), cap);
    println!("  {:<16} {}", "fragments".bright_cyan(), count);
    println!("  {:<16} {}", "last fragment".bright_cyan(), tail);
    println!("  {:<16} {}", "blake3".bright_cyan(), hex::encode(blake3::hash(&data).as_bytes()));

    Ok(())
}

fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_defaults_to_text() {
        let cli = Cli::try_parse_from(["fts", "plan", "file.bin"]).expect("Parse");
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_log_format_json_is_global() {
        let cli = Cli::try_parse_from(["fts", "send", "file.bin", "--log-format", "json"])
            .expect("Parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Send { .. }));

        assert!(Cli::try_parse_from(["fts", "--log-format", "xml", "plan", "file.bin"]).is_err());
    }
}
