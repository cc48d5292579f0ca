//! Line-oriented transaction scripts.
//!
//! ```text
//! # comment
//! write 0x42 10 20 ff
//! read  0x42 2
//! ```
//!
//! Addresses and data bytes are hexadecimal (`0x` optional); read counts are
//! decimal.

use std::path::Path;

use crate::address::{parse_hex_u16, BusAddress};
use crate::controller::Transaction;
use crate::error::{BusError, Result};

/// Parse a whole script.
pub fn parse_script(input: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        transactions.push(parse_line(line, content)?);
    }
    Ok(transactions)
}

/// Read and parse a script file.
pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| BusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&text)
}

fn parse_line(line: usize, content: &str) -> Result<Transaction> {
    let mut tokens = content.split_whitespace();
    let verb = tokens.next().unwrap_or_default();
    let address = match tokens.next() {
        Some(token) => parse_address(line, token)?,
        None => return Err(parse_error(line, "missing address")),
    };

    match verb.to_ascii_lowercase().as_str() {
        "write" | "w" => {
            let bytes = tokens
                .map(|token| parse_byte(line, token))
                .collect::<Result<Vec<u8>>>()?;
            Ok(Transaction::Write { address, bytes })
        }
        "read" | "r" => {
            let count = tokens
                .next()
                .ok_or_else(|| parse_error(line, "missing read count"))?;
            let len = count
                .parse::<usize>()
                .map_err(|_| parse_error(line, format!("invalid read count: {count}")))?;
            if tokens.next().is_some() {
                return Err(parse_error(line, "unexpected tokens after read count"));
            }
            Ok(Transaction::Read { address, len })
        }
        other => Err(parse_error(line, format!("unknown transaction kind: {other}"))),
    }
}

fn parse_address(line: usize, token: &str) -> Result<BusAddress> {
    let raw = parse_hex_u16(token)
        .ok_or_else(|| parse_error(line, format!("invalid address: {token}")))?;
    BusAddress::new(raw).map_err(|err| parse_error(line, err.to_string()))
}

fn parse_byte(line: usize, token: &str) -> Result<u8> {
    parse_hex_u16(token)
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| parse_error(line, format!("invalid byte: {token}")))
}

fn parse_error(line: usize, message: impl Into<String>) -> BusError {
    BusError::Parse {
        line,
        message: message.into(),
    }
}
