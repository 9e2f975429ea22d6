use schemars::schema_for;

use crate::config::Config;

/// JSON Schema of the config file, pretty-printed.
pub fn config_schema() -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&schema_for!(Config))?)
}

pub fn run_schema() -> anyhow::Result<()> {
    println!("{}", config_schema()?);
    Ok(())
}
