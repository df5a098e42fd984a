use clap::{Parser, Subcommand};
use sealchain::consensus::{ChainValidator, FingerprintInput, Ledger};
use sealchain::{metrics, Block, LedgerConfig, TransactionRequest};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sealchain")]
#[command(
    about = "SEALCHAIN - hash-linked record ledger with a proof-of-work admission gate",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to ./sealchain.toml when present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Database path
    #[arg(long, global = true)]
    db: Option<String>,

    /// Proof-of-work difficulty (leading zero hex digits)
    #[arg(long, global = true)]
    difficulty: Option<u32>,

    /// Keep the chain in memory for this run
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a record and seal it into a new block
    Record {
        /// Submitting party (owner, student id, voter, institution)
        #[arg(short, long)]
        actor: String,
        /// Operation tag (register, attendance, transfer, vote, issue, ...)
        #[arg(short = 't', long)]
        action: String,
        /// Payload entries as key=value (value parsed as JSON when possible)
        #[arg(short, long = "field")]
        fields: Vec<String>,
        /// Attach a document; its SHA-256 becomes the record's fingerprint
        #[arg(long, conflicts_with = "fingerprint")]
        file: Option<PathBuf>,
        /// Attach a precomputed hex SHA-256 fingerprint
        #[arg(long)]
        fingerprint: Option<String>,
    },

    /// Seal whatever is pending (an empty block in a fresh process)
    Seal,

    /// Print the chain as JSON
    Chain {
        /// Only blocks holding records from this actor
        #[arg(short, long)]
        actor: Option<String>,
    },

    /// Validate the chain
    Validate {
        /// Report every failing block instead of stopping at the first
        #[arg(long)]
        audit: bool,
    },

    /// Check whether content was recorded before
    Check {
        #[arg(long, conflicts_with = "fingerprint", required_unless_present = "fingerprint")]
        file: Option<PathBuf>,
        #[arg(long)]
        fingerprint: Option<String>,
    },

    /// Show ledger statistics
    Stats {
        /// Also print Prometheus metrics
        #[arg(long)]
        metrics: bool,
    },

    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(default_value = "sealchain.toml")]
        path: PathBuf,
    },

    /// Run an in-memory walkthrough
    Demo,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let in_memory = cli.in_memory || matches!(cli.command, Commands::Demo);
    let config = LedgerConfig::load_with_overrides(cli.config, cli.db, cli.difficulty, in_memory)?;
    metrics::register_metrics();

    if let Commands::InitConfig { path } = &cli.command {
        config.save(path)?;
        println!("✅ Configuration written to {}", path.display());
        return Ok(());
    }

    config.print_effective_config();
    let ledger = Ledger::from_config(config)?;

    match cli.command {
        Commands::Record { actor, action, fields, file, fingerprint } => {
            let mut request = TransactionRequest::new(actor, action);
            for field in &fields {
                let (key, value) = parse_field(field)?;
                request = request.with_field(key, value);
            }
            if let Some(path) = file {
                let content = std::fs::read(path)?;
                request = request.with_fingerprint(sealchain::crypto::fingerprint_bytes(&content));
            } else if let Some(hex) = fingerprint {
                request = request.with_fingerprint(hex);
            }

            let submission = ledger.submit_transaction(request)?;
            if let Some(reason) = &submission.flag_reason {
                println!("⚠️  Flagged: {}", reason);
            }
            let block = ledger.seal()?;
            print_block(&block);
        }

        Commands::Seal => {
            let block = ledger.seal()?;
            print_block(&block);
        }

        Commands::Chain { actor } => {
            let chain = match actor {
                Some(actor) => ledger.blocks_for_actor(&actor),
                None => ledger.export_chain(),
            };
            println!("{}", serde_json::to_string_pretty(&chain)?);
        }

        Commands::Validate { audit } => {
            println!("🔍 Validating chain...");
            if audit {
                let findings = ledger.audit_chain();
                if findings.is_empty() {
                    println!("✅ Chain is VALID");
                }
                for finding in findings {
                    println!("❌ Block {}: {}", finding.index, finding.kind);
                }
            } else {
                let report = ledger.validate_chain();
                match report.finding {
                    None => println!("✅ Chain is VALID ({} blocks)", ledger.stats().chain_length),
                    Some(finding) => println!(
                        "❌ Chain is INVALID at block {}: {}",
                        finding.index, finding.kind
                    ),
                }
            }
        }

        Commands::Check { file, fingerprint } => {
            let content;
            let input = match (&file, &fingerprint) {
                (Some(path), _) => {
                    content = std::fs::read(path)?;
                    FingerprintInput::Bytes(&content)
                }
                (None, Some(hex)) => FingerprintInput::Hex(hex),
                (None, None) => return Err("either --file or --fingerprint is required".into()),
            };
            let check = ledger.check_fingerprint(input)?;
            match check.first_seen {
                Some(first) => println!(
                    "⚠️  Seen before: block {} (actor {}, {})",
                    first.block_index,
                    first.actor,
                    if first.sealed { "sealed" } else { "pending" }
                ),
                None => println!("✅ Not seen before"),
            }
        }

        Commands::Stats { metrics: show_metrics } => {
            let stats = ledger.stats();
            println!("Chain length:          {} blocks", stats.chain_length);
            println!("Total records:         {}", stats.total_transactions);
            println!("Flagged duplicates:    {}", stats.flagged_transactions);
            println!("Pending records:       {}", stats.pending_transactions);
            println!("Distinct fingerprints: {}", stats.distinct_fingerprints);
            println!("Difficulty:            {}", stats.difficulty);
            println!("Tip hash:              {}", stats.last_hash.unwrap_or_default());
            println!("Persisted:             {}", stats.persisted);
            if show_metrics {
                println!("\n{}", metrics::render()?);
            }
        }

        Commands::Demo => run_demo(&ledger)?,

        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Split `key=value`; the value is JSON when it parses, else a plain string
fn parse_field(field: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = field
        .split_once('=')
        .ok_or_else(|| format!("field {:?} is not key=value", field))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_block(block: &Block) {
    println!("✅ Block {} sealed", block.index);
    println!("   Hash:          {}", block.hash);
    println!("   Previous hash: {}", block.previous_hash);
    println!("   Proof:         {} (difficulty {})", block.proof, block.difficulty);
    println!("   Records:       {}", block.transactions.len());
}

fn run_demo(ledger: &Ledger) -> Result<(), Box<dyn Error>> {
    println!("🎬 Running demo...\n");

    let deed = b"%PDF-1.4 title deed for plot L1";
    let deed_hash = sealchain::crypto::fingerprint_bytes(deed);

    println!("📝 Land registry: alice registers L1 with its deed");
    let sub = ledger.submit_transaction(
        TransactionRequest::new("alice", "register")
            .with_field("land_id", "L1")
            .with_field("area", 420)
            .with_fingerprint(deed_hash.clone()),
    )?;
    println!("   Will be added to block {}", sub.predicted_index);
    print_block(&ledger.seal()?);

    println!("\n📝 Attendance: student s-17 marked present");
    ledger.submit_transaction(
        TransactionRequest::new("s-17", "attendance").with_field("name", "Ada"),
    )?;
    print_block(&ledger.seal()?);

    println!("\n📝 Land registry: mallory registers the same deed");
    let dup = ledger.submit_transaction(
        TransactionRequest::new("mallory", "register")
            .with_field("land_id", "L9")
            .with_fingerprint(deed_hash),
    )?;
    println!("   Flagged: {} ({})", dup.flagged, dup.flag_reason.unwrap_or_default());
    print_block(&ledger.seal()?);

    println!("\n🔍 Validating chain...");
    println!("   Valid: {}", ledger.validate_chain().valid);

    println!("\n🧨 Tampering with an exported copy of block 2...");
    let mut copy = ledger.export_chain();
    copy[1].transactions[0].payload.insert("land_id".into(), "L2".into());
    let report = ChainValidator::validate(&copy);
    println!(
        "   Valid: {}, first invalid block: {:?}",
        report.valid, report.first_invalid_index
    );

    println!("\n🎉 Demo complete!");
    Ok(())
}
