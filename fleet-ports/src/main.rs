// External crates
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Internal imports
use fleet_ports::PortAllocator;

#[derive(Parser)]
#[command(name = "fleet-ports")]
#[command(about = "Port range allocation for fleet workspaces")]
#[command(version)]
pub struct Args {
    /// Allocation table document
    #[arg(long, default_value_os_t = default_state_file("port-allocations.json"))]
    table: PathBuf,

    /// Range policy document
    #[arg(long, default_value_os_t = default_state_file("port-policy.json"))]
    policy: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Allocate a port range for a key
    Allocate {
        /// Allocation key (user or workspace id)
        key: String,
        /// Range size (policy default when omitted)
        size: Option<u16>,
    },
    /// Release a key's port range
    Deallocate {
        /// Allocation key
        key: String,
    },
    /// Show a key's allocated range
    Get {
        /// Allocation key
        key: String,
    },
    /// List all allocations
    List,
}

fn default_state_file(name: &str) -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".fleet").join(name)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let allocator = PortAllocator::new(&args.table, &args.policy)?;

    match args.command {
        Command::Allocate { key, size } => {
            let range = allocator.allocate(&key, size)?;
            println!("{}", range);
        }
        Command::Deallocate { key } => {
            if allocator.deallocate(&key)? {
                println!("Released port range for '{}'", key);
            } else {
                eprintln!("No allocation found for '{}'", key);
                std::process::exit(1);
            }
        }
        Command::Get { key } => match allocator.get(&key)? {
            Some(range) => println!("{}", range),
            None => {
                eprintln!("No allocation found for '{}'", key);
                std::process::exit(1);
            }
        },
        Command::List => {
            let allocations = allocator.list()?;
            if allocations.is_empty() {
                println!("No port ranges allocated yet");
            } else {
                for alloc in allocations {
                    println!(
                        "  {}: {} ({} ports, allocated {})",
                        alloc.key,
                        alloc.range(),
                        alloc.range_size,
                        alloc.allocated_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
            }
        }
    }

    Ok(())
}
