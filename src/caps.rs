use crate::{CapKind, Error};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One row of the capability translation table: the long variable name, the
/// terminfo capability name, the optional two-letter termcap name, and the
/// capability kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapRow {
    pub variable: String,
    pub terminfo: String,
    pub termcap: Option<String>,
    pub kind: CapKind,
    /// Source line in the table file, for diagnostics.
    pub line: usize,
}

/// The capability translation table, indexed three ways.
#[derive(Debug, Clone, Default)]
pub struct CapTable {
    rows: Vec<CapRow>,
    terminfo: HashMap<String, usize>,
    termcap: HashMap<String, usize>,
    variable: HashMap<String, usize>,
}

impl CapTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse the table. Malformed rows are skipped with a warning; parsing
    /// itself never fails.
    pub fn parse(text: &str) -> Self {
        let mut rows: Vec<CapRow> = Vec::new();
        let mut capaliases: Vec<(String, String, usize)> = Vec::new();
        let mut infoaliases: Vec<(String, String, usize)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut cols = trimmed.split_whitespace();
            let first = match cols.next() {
                Some(c) => c,
                None => continue,
            };
            if first == "capalias" || first == "infoalias" {
                let (alias, name) = match (cols.next(), cols.next()) {
                    (Some(a), Some(n)) => (a.to_string(), n.to_string()),
                    _ => {
                        log::warn!("caps line {}: incomplete {} row", line, first);
                        continue;
                    }
                };
                if first == "capalias" {
                    capaliases.push((alias, name, line));
                } else {
                    infoaliases.push((alias, name, line));
                }
                continue;
            }

            let (terminfo, kind_text, termcap) = match (cols.next(), cols.next(), cols.next()) {
                (Some(t), Some(k), Some(c)) => (t, k, c),
                _ => {
                    log::warn!("caps line {}: too few columns", line);
                    continue;
                }
            };
            let kind = match kind_text {
                "bool" => CapKind::Boolean,
                "num" => CapKind::Numeric,
                "str" => CapKind::String,
                other => {
                    log::warn!("caps line {}: unknown capability type \"{}\"", line, other);
                    continue;
                }
            };
            rows.push(CapRow {
                variable: first.to_string(),
                terminfo: terminfo.to_string(),
                termcap: (termcap != "-").then(|| termcap.to_string()),
                kind,
                line,
            });
        }

        let mut table = CapTable {
            rows,
            ..Default::default()
        };
        for (i, row) in table.rows.iter().enumerate() {
            table.terminfo.entry(row.terminfo.clone()).or_insert(i);
            if let Some(tc) = &row.termcap {
                table.termcap.entry(tc.clone()).or_insert(i);
            }
            table.variable.entry(row.variable.clone()).or_insert(i);
        }
        for (alias, name, line) in capaliases {
            match table.termcap.get(&name).copied() {
                Some(i) => {
                    table.termcap.entry(alias).or_insert(i);
                }
                None => log::warn!("caps line {}: capalias target \"{}\" unknown", line, name),
            }
        }
        for (alias, name, line) in infoaliases {
            match table.terminfo.get(&name).copied() {
                Some(i) => {
                    table.terminfo.entry(alias).or_insert(i);
                }
                None => log::warn!("caps line {}: infoalias target \"{}\" unknown", line, name),
            }
        }
        table
    }

    pub fn by_terminfo(&self, name: &str) -> Option<&CapRow> {
        self.terminfo.get(name).map(|&i| &self.rows[i])
    }

    pub fn by_termcap(&self, name: &str) -> Option<&CapRow> {
        self.termcap.get(name).map(|&i| &self.rows[i])
    }

    pub fn by_variable(&self, name: &str) -> Option<&CapRow> {
        self.variable.get(name).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[CapRow] {
        &self.rows
    }
}
