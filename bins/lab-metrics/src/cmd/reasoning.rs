use serde_json::{Map, Value};

use lab_bridge::Archiver;

use crate::config::ReasoningArgs;
use crate::error::CliError;

pub fn run(args: ReasoningArgs) -> Result<(), CliError> {
    let best = parse_best(&args.best)?;
    let config = args.common.effective()?;
    let archiver = Archiver::new(&config)?;
    let resp = archiver
        .store_reasoning(&args.sweep_type, &args.model, &best, &args.csv, args.gpu_type.as_deref())
        .ok_or(CliError::Unavailable("memory API"))?;
    println!("{resp}");
    Ok(())
}

fn parse_best(raw: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::BestJson(format!("got {other}"))),
        Err(e) => Err(CliError::BestJson(e.to_string())),
    }
}
