use std::path::PathBuf;
use std::sync::Arc;

use busmq_bus::BusAddress;
use busmq_queue::{HexDumpTrace, QueueConfig, DEFAULT_MESSAGE_CAPACITY, DEFAULT_SLOT_COUNT};
use clap::{Args, Subcommand};

use crate::exit::{bus_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod config;
pub mod listen;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a transaction script, then drain and print every queued message.
    Replay(ReplayArgs),
    /// Feed a script from a producer thread while blocking on delivery.
    Listen(ListenArgs),
    /// Print the effective queue configuration.
    Config(ConfigArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    /// True when the command hex-dumps delivered messages.
    pub fn dumps_messages(&self) -> bool {
        match self {
            Command::Replay(args) => args.queue.dump,
            Command::Listen(args) => args.queue.dump,
            Command::Config(_) | Command::Version(_) => false,
        }
    }
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Config(args) => config::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Queue shape and delivery tracing, shared by every command that builds a
/// queue.
#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Own 7-bit bus address (hex).
    #[arg(long, env = "BUSMQ_ADDRESS", default_value = "0x10")]
    pub address: String,
    /// Ring slots (power of two).
    #[arg(long, env = "BUSMQ_SLOTS", default_value_t = DEFAULT_SLOT_COUNT)]
    pub slots: usize,
    /// Bytes per message, header byte included.
    #[arg(long, env = "BUSMQ_MESSAGE_SIZE", default_value_t = DEFAULT_MESSAGE_CAPACITY)]
    pub message_size: usize,
    /// Bus instance number of this endpoint.
    #[arg(long, env = "BUSMQ_BUS_ID", default_value_t = 0)]
    pub bus_id: u32,
    /// Hex-dump delivered messages to the log.
    #[arg(long, env = "BUSMQ_DUMP")]
    pub dump: bool,
    /// Only dump messages from this bus instance.
    #[arg(long, env = "BUSMQ_DUMP_BUS_ID", default_value_t = 0)]
    pub dump_bus_id: u32,
}

impl QueueArgs {
    pub fn to_config(&self) -> CliResult<QueueConfig> {
        let own_address: BusAddress = self
            .address
            .parse()
            .map_err(|err| bus_error("invalid --address", err))?;
        Ok(QueueConfig {
            own_address,
            slot_count: self.slots,
            message_capacity: self.message_size,
            bus_id: self.bus_id,
        })
    }

    pub fn trace_hook(&self) -> Option<Arc<HexDumpTrace>> {
        self.dump
            .then(|| Arc::new(HexDumpTrace::new(true, self.dump_bus_id)))
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Transaction script to apply.
    pub script: PathBuf,
    #[command(flatten)]
    pub queue: QueueArgs,
    /// Destination buffer size per read. Default: the message size.
    #[arg(long)]
    pub read_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Transaction script the producer thread replays.
    pub script: PathBuf,
    #[command(flatten)]
    pub queue: QueueArgs,
    /// Delay between transactions (e.g. 100ms, 1s).
    #[arg(long, default_value = "0ms")]
    pub interval: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub queue: QueueArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds. Zero is allowed.
pub fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if millis {
        Ok(std::time::Duration::from_millis(value))
    } else {
        Ok(std::time::Duration::from_secs(value))
    }
}
