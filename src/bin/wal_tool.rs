//! beetlewal inspection tool
//!
//! Dumps, verifies, repairs and checkpoints WAL files offline.

use std::path::PathBuf;
use std::process::ExitCode;

use beetlewal::{MalformedPolicy, WalConfig, WalReader, WalRecovery, WalWriter};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

/// beetlewal WAL tool
#[derive(Parser, Debug)]
#[command(name = "beetlewal")]
#[command(about = "Inspect and maintain beetlewal write-ahead logs")]
#[command(version)]
struct Args {
    /// What to do after a malformed fragment sequence
    #[arg(long, value_enum, default_value_t = Policy::Resync)]
    policy: Policy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every logical record
    Dump {
        /// WAL file
        path: PathBuf,

        /// Bytes of each payload to show as hex
        #[arg(short = 'n', long, default_value = "16")]
        preview: usize,
    },

    /// Scan the log and report damage (exit code 1 if any)
    Verify {
        /// WAL file
        path: PathBuf,
    },

    /// Truncate the log after its last intact record
    Repair {
        /// WAL file
        path: PathBuf,
    },

    /// Append one record
    Append {
        /// WAL file
        path: PathBuf,

        /// Record contents
        text: String,
    },

    /// Discard the whole log
    Checkpoint {
        /// WAL file
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Resync,
    Halt,
}

impl From<Policy> for MalformedPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Resync => MalformedPolicy::ResyncAtNextBlock,
            Policy::Halt => MalformedPolicy::Halt,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,beetlewal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> beetlewal::Result<ExitCode> {
    let policy = MalformedPolicy::from(args.policy);

    match args.command {
        Commands::Dump { path, preview } => {
            let config = WalConfig::builder().malformed_policy(policy).build()?;
            let mut reader = WalReader::open_with_config(&path, &config)?;
            let mut index = 0usize;
            let mut records = reader.iter()?;
            while let Some(record) = records.next() {
                match record {
                    Ok(payload) => {
                        let shown = &payload[..payload.len().min(preview)];
                        let hex: String = shown.iter().map(|b| format!("{:02x}", b)).collect();
                        let ellipsis = if payload.len() > preview { "..." } else { "" };
                        println!("{:>6}  {:>10}  {}{}", index, payload.len(), hex, ellipsis);
                        index += 1;
                    }
                    Err(e) => println!("   !!  {}", e),
                }
            }
            println!("end of scan at byte {}", records.cursor());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Verify { path } => {
            let result = WalRecovery::new(policy).verify(&path)?;
            println!("records:   {}", result.records_recovered);
            println!("bytes:     {}", result.bytes_recovered);
            println!("valid_len: {} / {}", result.valid_len, result.file_len);
            if result.malformed_skipped > 0 {
                println!("skipped:   {} malformed sequence(s)", result.malformed_skipped);
            }
            if let Some(e) = &result.corruption {
                match e.offset() {
                    Some(offset) => println!("damage:    at byte {}: {}", offset, e),
                    None => println!("damage:    {}", e),
                }
            }
            Ok(if result.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::Repair { path } => {
            let (_, result) = WalRecovery::new(policy).repair(&path)?;
            if result.was_truncated {
                println!("truncated {} -> {} bytes", result.file_len, result.valid_len);
            } else {
                println!("nothing to repair");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Append { path, text } => {
            let wal = WalWriter::open(&path, WalConfig::default())?;
            wal.write(text.as_bytes())?;
            println!("appended {} bytes, file is {} bytes", text.len(), wal.len()?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Checkpoint { path } => {
            let wal = WalWriter::open(&path, WalConfig::default())?;
            wal.checkpoint()?;
            println!("checkpointed {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}
