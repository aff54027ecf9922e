use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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

/// Where a message came from and its position in the session.
#[derive(Debug, Clone, Copy)]
pub struct MessageMeta<'a> {
    pub peer: &'a str,
    pub seq: u64,
    pub width: usize,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    seq: u64,
    peer: &'a str,
    header_width: usize,
    size: usize,
    utf8: bool,
    payload: String,
    timestamp: String,
}

pub fn print_message(payload: &[u8], meta: MessageMeta<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", message_json(payload, meta)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    meta.seq.to_string(),
                    payload.len().to_string(),
                    meta.peer.to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{} size={} peer={} payload={}",
                meta.seq,
                payload.len(),
                meta.peer,
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

fn message_json(payload: &[u8], meta: MessageMeta<'_>) -> String {
    let out = MessageOutput {
        seq: meta.seq,
        peer: meta.peer,
        header_width: meta.width,
        size: payload.len(),
        utf8: std::str::from_utf8(payload).is_ok(),
        payload: payload_preview(payload),
        timestamp: now_unix_seconds(),
    };
    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
