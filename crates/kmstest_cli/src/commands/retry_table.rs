//! Retry-table command - Show or query the retryable error table.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use kmstest_terraform::RetryableErrors;

use crate::ExitCodes;

#[derive(Args)]
pub struct RetryTableArgs {
    /// Classify this error text instead of printing the table
    #[arg(short, long = "match", value_name = "TEXT")]
    pub matches: Option<String>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: RetryTableArgs) -> Result<u8> {
    let table = RetryableErrors::aws_defaults();

    if let Some(text) = args.matches {
        let classified = table.classify(&text);
        if args.json {
            let value = match &classified {
                Some(m) => json!({ "retryable": true, "pattern": m.pattern, "reason": m.reason }),
                None => json!({ "retryable": false }),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            match &classified {
                Some(m) => println!("🔁 retryable: {} (matched {:?})", m.reason, m.pattern),
                None => println!("⛔ not retryable"),
            }
        }
        // Non-retryable text is a normal answer, not an error
        return Ok(ExitCodes::SUCCESS);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(ExitCodes::SUCCESS);
    }

    let width = table.iter().map(|(p, _)| p.len()).max().unwrap_or(0);
    for (pattern, reason) in table.iter() {
        println!("{:width$}  {}", pattern, reason, width = width);
    }
    println!("\n{} retryable patterns", table.len());

    Ok(ExitCodes::SUCCESS)
}
