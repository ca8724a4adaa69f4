//! Document command handlers

use anyhow::{bail, Context, Result};

use basement_core::{generate_key, Cas, Client, FindOptions, SaveOptions, Value};

use crate::output::Output;

/// Arguments of `basement save`
#[derive(Debug, Clone)]
pub struct SaveArgs {
    pub key: String,
    pub payload: String,
    pub string: bool,
    pub add: bool,
    pub replace: bool,
    pub cas: Option<u64>,
    pub expire: u32,
    pub transcoder: Option<String>,
}

impl SaveArgs {
    /// Payload as a value: parsed JSON, or the raw text with `--string`
    pub fn payload(&self) -> Result<Value> {
        if self.string {
            return Ok(Value::String(self.payload.clone()));
        }
        Value::from_json_str(&self.payload)
            .with_context(|| format!("Payload is not valid JSON: {}", self.payload))
    }

    pub fn options(&self) -> SaveOptions {
        let mut options = if self.add {
            SaveOptions::add()
        } else if self.replace {
            SaveOptions::replace()
        } else {
            SaveOptions::default()
        };
        options.expiration = self.expire;
        // CAS 0 means no constraint
        options.cas = self.cas.filter(|&cas| cas != 0).map(Cas::new);
        options.transcoder = self.transcoder.clone();
        options
    }
}

/// Save a payload under a key
pub fn save(client: &mut Client, args: SaveArgs, output: &Output) -> Result<()> {
    let payload = args.payload()?;
    let options = args.options();

    match client.save((args.key.as_str(), payload), &options)? {
        Some(cas) => {
            output.success(&format!("Saved {} (cas {})", args.key, cas));
            Ok(())
        }
        None => bail!(
            "Store rejected the {} of '{}' (key exists, key missing or CAS mismatch)",
            options.operation().as_str(),
            args.key
        ),
    }
}

/// Fetch one or more documents
pub fn get(
    client: &Client,
    keys: Vec<String>,
    raw: bool,
    transcoder: Option<String>,
    output: &Output,
) -> Result<()> {
    if raw {
        let [key] = keys.as_slice() else {
            bail!("--raw takes exactly one key");
        };
        let value = client
            .find_by_key(key.as_str(), FindOptions::raw())?
            .into_raw()
            .ok_or_else(|| anyhow::anyhow!("Key not found: {}", key))?;
        output.print_raw(&value);
        return Ok(());
    }

    let mut options = FindOptions::default();
    options.transcoder = transcoder;

    if keys.len() == 1 {
        let key = &keys[0];
        let doc = client
            .find_by_key(key.as_str(), options)?
            .into_document()
            .ok_or_else(|| anyhow::anyhow!("Key not found: {}", key))?;
        output.print_document(&doc);
    } else {
        let docs = client
            .find_by_key(keys, options)?
            .into_collection()
            .unwrap_or_default();
        output.print_documents(&docs);
    }
    Ok(())
}

/// Delete a key
pub fn delete(client: &mut Client, key: &str, output: &Output) -> Result<()> {
    if client.delete(key)? {
        output.success(&format!("Deleted {}", key));
    } else {
        output.message(&format!("Key not found: {}", key));
    }
    Ok(())
}

/// Print a fresh key
pub fn keygen(prefix: &str, output: &Output) -> Result<()> {
    let key = generate_key(prefix);
    match output.format {
        crate::output::OutputFormat::Json => {
            println!("{}", serde_json::json!({ "key": key }))
        }
        _ => println!("{}", key),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basement_core::{Config, StoreOperation};

    fn args(payload: &str) -> SaveArgs {
        SaveArgs {
            key: "k".to_string(),
            payload: payload.to_string(),
            string: false,
            add: false,
            replace: false,
            cas: None,
            expire: 0,
            transcoder: None,
        }
    }

    #[test]
    fn test_payload_parsing() {
        assert_eq!(
            args(r#"{"a":1}"#).payload().unwrap(),
            Value::from_pairs([("a", 1)])
        );
        assert!(args("not json").payload().is_err());

        let text = SaveArgs {
            string: true,
            ..args("not json")
        };
        assert_eq!(text.payload().unwrap(), Value::from("not json"));
    }

    #[test]
    fn test_save_options() {
        assert_eq!(args("1").options().operation(), StoreOperation::Set);

        let add = SaveArgs {
            add: true,
            ..args("1")
        };
        assert_eq!(add.options().operation(), StoreOperation::Add);

        let replace = SaveArgs {
            replace: true,
            cas: Some(9),
            expire: 60,
            transcoder: Some("serialize".to_string()),
            ..args("1")
        };
        let options = replace.options();
        assert_eq!(options.operation(), StoreOperation::Replace);
        assert_eq!(options.cas, Some(Cas::new(9)));
        assert_eq!(options.expiration, 60);
        assert_eq!(options.transcoder.as_deref(), Some("serialize"));

        let zero = SaveArgs {
            cas: Some(0),
            ..args("1")
        };
        assert_eq!(zero.options().cas, None);
    }

    #[test]
    fn test_save_get_delete() {
        let mut client = Client::new(Config::default()).unwrap();
        let output = Output::new(crate::output::OutputFormat::Quiet);

        save(&mut client, args(r#"{"a":1}"#), &output).unwrap();
        get(&client, vec!["k".to_string()], false, None, &output).unwrap();
        get(&client, vec!["k".to_string()], true, None, &output).unwrap();

        let add = SaveArgs {
            add: true,
            ..args("2")
        };
        assert!(save(&mut client, add, &output).is_err());

        delete(&mut client, "k", &output).unwrap();
        assert!(get(&client, vec!["k".to_string()], false, None, &output).is_err());
    }
}
