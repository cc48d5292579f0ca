use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use busmq_queue::{FramingStats, QueueConfig, QueueStats};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput {
    seq: u64,
    address: String,
    size: usize,
    payload: String,
    timestamp: String,
}

/// Print one delivered message. Byte 0 is the write header, so the target
/// address is recovered from it.
pub fn print_message(seq: u64, message: &[u8], format: OutputFormat) {
    let address = message
        .first()
        .map(|header| format!("0x{:02x}", header >> 1))
        .unwrap_or_default();
    let payload = message.get(1..).unwrap_or_default();

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                seq,
                address,
                size: message.len(),
                payload: hex(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "ADDRESS", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    seq.to_string(),
                    address,
                    message.len().to_string(),
                    hex(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} address={} size={} payload={}",
                seq,
                address,
                message.len(),
                hex(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(message);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[derive(Serialize)]
struct ConfigOutput {
    address: String,
    header_byte: String,
    slot_count: usize,
    message_capacity: usize,
    storage_size: usize,
    bus_id: u32,
}

pub fn print_config(config: &QueueConfig, format: OutputFormat) {
    let out = ConfigOutput {
        address: config.own_address.to_string(),
        header_byte: format!("0x{:02x}", config.own_address.header_byte()),
        slot_count: config.slot_count,
        message_capacity: config.message_capacity,
        storage_size: config.storage_size(),
        bus_id: config.bus_id,
    };

    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SETTING", "VALUE"]);
            for (name, value) in [
                ("address", out.address),
                ("header_byte", out.header_byte),
                ("slot_count", out.slot_count.to_string()),
                ("message_capacity", out.message_capacity.to_string()),
                ("storage_size", out.storage_size.to_string()),
                ("bus_id", out.bus_id.to_string()),
            ] {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "address={} header={} slots={} message_capacity={} storage={} bus_id={}",
                out.address,
                out.header_byte,
                out.slot_count,
                out.message_capacity,
                out.storage_size,
                out.bus_id
            );
        }
    }
}

/// Log the end-of-run counters.
pub fn log_summary(framing: &FramingStats, queue: &QueueStats) {
    tracing::debug!(
        transactions = framing.transactions,
        committed = framing.committed,
        truncated = framing.truncated,
        runts = framing.runts,
        nacked_bytes = framing.nacked_bytes,
        read_requests = framing.read_requests,
        "framing summary"
    );
    tracing::debug!(
        evicted = queue.evicted,
        delivered = queue.delivered,
        overflowed = queue.overflowed,
        notifications = queue.notifications,
        pending = queue.pending,
        "queue summary"
    );
}

pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
