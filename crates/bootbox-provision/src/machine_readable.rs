//! Parser for Vagrant's `--machine-readable` output.
//!
//! Each record is one line: `timestamp,target,type,data...`. Commas inside
//! data fields are written as `%!(VAGRANT_COMMA)` and newlines as a literal
//! `\n`, so splitting on `,` is safe.

use crate::backend::MachineRecord;

const COMMA_ESCAPE: &str = "%!(VAGRANT_COMMA)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: u64,
    pub target: String,
    pub kind: String,
    pub data: Vec<String>,
}

impl Record {
    pub fn field(&self, index: usize) -> &str {
        self.data.get(index).map_or("", String::as_str)
    }
}

/// Parse one output line. Returns `None` for lines that are not
/// machine-readable records (plain text the tool printed anyway).
pub fn parse_line(line: &str) -> Option<Record> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.split(',');
    let timestamp = parts.next()?.parse::<u64>().ok()?;
    let target = parts.next()?;
    let kind = parts.next()?;
    if kind.is_empty() {
        return None;
    }
    Some(Record {
        timestamp,
        target: unescape(target),
        kind: kind.to_owned(),
        data: parts.map(unescape).collect(),
    })
}

pub fn unescape(field: &str) -> String {
    field
        .replace(COMMA_ESCAPE, ",")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
}

/// Collect machine states from `vagrant status --machine-readable` output,
/// keeping the order in which machines first appear.
pub fn parse_status(output: &str) -> Vec<MachineRecord> {
    let mut machines: Vec<MachineRecord> = Vec::new();
    for record in output.lines().filter_map(parse_line) {
        if record.kind != "state" || record.target.is_empty() {
            continue;
        }
        if machines.iter().any(|m| m.name == record.target) {
            continue;
        }
        let created = record.field(0) != "not_created";
        machines.push(MachineRecord::new(record.target, created));
    }
    machines
}
