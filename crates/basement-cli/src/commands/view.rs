//! View command handler

use anyhow::{Context, Result};
use clap::Args;

use basement_core::{Client, Value, ViewQuery};

use crate::output::Output;

/// Arguments of `basement view`
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Design document name
    pub design: String,
    /// View name
    pub view: String,
    /// Only rows with this key (JSON)
    #[arg(long)]
    pub key: Option<String>,
    /// Only rows with one of these keys (JSON list)
    #[arg(long)]
    pub keys: Option<String>,
    /// First key of the range (JSON)
    #[arg(long)]
    pub start_key: Option<String>,
    /// Last key of the range (JSON)
    #[arg(long)]
    pub end_key: Option<String>,
    /// Leave out rows matching the end key
    #[arg(long)]
    pub exclusive_end: bool,
    /// Maximum number of rows
    #[arg(long)]
    pub limit: Option<i64>,
    /// Rows to skip
    #[arg(long)]
    pub skip: Option<i64>,
    /// Reverse the row order
    #[arg(long)]
    pub descending: bool,
    /// Run the view's reduce function
    #[arg(long)]
    pub reduce: bool,
    /// Group reduced rows by key
    #[arg(long)]
    pub group: bool,
    /// Group reduced rows by the first N elements of list keys
    #[arg(long)]
    pub group_level: Option<i64>,
    /// Include the emitting documents
    #[arg(long)]
    pub include_docs: bool,
    /// Stale mode: false, ok or update_after
    #[arg(long)]
    pub stale: Option<String>,
}

impl ViewArgs {
    /// Build the view query these arguments describe
    pub fn to_query(&self) -> Result<ViewQuery> {
        let mut query = ViewQuery::new();

        if let Some(key) = &self.key {
            query.key(parse_json("key", key)?);
        }
        if let Some(keys) = &self.keys {
            query.keys(parse_json("keys", keys)?);
        }
        if let Some(start) = &self.start_key {
            query.start_key(parse_json("start-key", start)?);
        }
        if let Some(end) = &self.end_key {
            query.end_key(parse_json("end-key", end)?);
        }
        if self.exclusive_end {
            query.inclusive_end(false);
        }
        if let Some(limit) = self.limit {
            query.limit(limit)?;
        }
        if let Some(skip) = self.skip {
            query.skip(skip)?;
        }
        if let Some(level) = self.group_level {
            query.group_level(level)?;
        }
        if let Some(stale) = &self.stale {
            query.stale(stale.as_str())?;
        }
        query
            .descending(self.descending)
            .reduce(self.reduce)
            .group(self.group)
            .include_docs(self.include_docs);

        Ok(query)
    }
}

fn parse_json(name: &str, text: &str) -> Result<Value> {
    Value::from_json_str(text).with_context(|| format!("--{} must be JSON, got: {}", name, text))
}

/// Query a view and print the rows
pub fn query(client: &Client, args: &ViewArgs, output: &Output) -> Result<()> {
    let query = args.to_query()?;
    let result = client.find_by_view(&args.design, &args.view, query)?;
    output.print_view(&result);
    Ok(())
}
