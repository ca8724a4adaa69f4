//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use basement_core::{Document, DocumentCollection, Value, ViewResult};
use serde_json::json;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single document
    pub fn print_document(&self, doc: &Document) {
        match self.format {
            OutputFormat::Human => {
                println!("Key:     {}", doc.key());
                if let Some(cas) = doc.cas() {
                    println!("CAS:     {}", cas);
                }
                if let Some(payload) = doc.payload() {
                    println!("Payload: {}", payload.to_canonical_json());
                }
            }
            OutputFormat::Json => {
                println!("{:#}", document_json(doc));
            }
            OutputFormat::Quiet => {
                println!("{}", doc.to_json());
            }
        }
    }

    /// Print a list of documents
    pub fn print_documents(&self, docs: &DocumentCollection) {
        match self.format {
            OutputFormat::Human => {
                if docs.is_empty() {
                    println!("No documents found.");
                    return;
                }
                for doc in docs {
                    println!(
                        "{} | {} | {}",
                        doc.key(),
                        doc.cas().map(|c| c.to_string()).unwrap_or_default(),
                        truncate(&doc.to_json(), 60)
                    );
                }
                println!("\n{} document(s)", docs.len());
            }
            OutputFormat::Json => {
                let docs: Vec<_> = docs.iter().map(document_json).collect();
                println!("{:#}", serde_json::Value::Array(docs));
            }
            OutputFormat::Quiet => {
                for doc in docs {
                    println!("{}", doc.key());
                }
            }
        }
    }

    /// Print a view result
    pub fn print_view(&self, result: &ViewResult) {
        match self.format {
            OutputFormat::Human => {
                if result.is_empty() {
                    println!("No rows.");
                    return;
                }
                for (row, key) in result.rows().iter().zip(result.keys()) {
                    let value = row.value().map(Value::to_canonical_json).unwrap_or_default();
                    if result.is_reduced() {
                        println!("{} | {}", key.to_canonical_json(), value);
                    } else {
                        println!("{} | {} | {}", key.to_canonical_json(), row.key(), value);
                    }
                }
                match result.total_rows() {
                    Some(total) => println!("\n{} row(s) of {}", result.len(), total),
                    None => println!("\n{} row(s)", result.len()),
                }
            }
            OutputFormat::Json => {
                let rows: Vec<_> = result
                    .rows()
                    .iter()
                    .zip(result.keys())
                    .map(|(row, key)| {
                        let mut row_json = document_json(row);
                        row_json["emitted_key"] = key.clone().into();
                        row_json
                    })
                    .collect();
                println!(
                    "{:#}",
                    json!({
                        "reduced": result.is_reduced(),
                        "total_rows": result.total_rows(),
                        "rows": rows
                    })
                );
            }
            OutputFormat::Quiet => {
                for row in result.rows() {
                    match row.value() {
                        Some(value) if result.is_reduced() => {
                            println!("{}", value.to_canonical_json())
                        }
                        _ => println!("{}", row.key()),
                    }
                }
            }
        }
    }

    /// Print a raw stored value
    pub fn print_raw(&self, raw: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "raw": raw })),
            OutputFormat::Human | OutputFormat::Quiet => println!("{}", raw),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// JSON form of a document: key, cas, payload and (for view rows) value
pub fn document_json(doc: &Document) -> serde_json::Value {
    let mut obj = json!({ "key": doc.key() });
    if let Some(cas) = doc.cas() {
        obj["cas"] = cas.get().into();
    }
    if let Some(payload) = doc.payload() {
        obj["payload"] = payload.clone().into();
    }
    if let Some(value) = doc.value() {
        obj["value"] = value.clone().into();
    }
    obj
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
