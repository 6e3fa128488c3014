//! Plan-summary command - Summarize saved `terraform plan` output.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use kmstest_terraform::PlanOutput;

use crate::ExitCodes;

#[derive(Args)]
pub struct PlanSummaryArgs {
    /// Plan output file (reads stdin when omitted or `-`)
    pub file: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: PlanSummaryArgs) -> Result<u8> {
    let text = match args.file.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan output {:?}", path))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read plan output from stdin")?;
            buf
        }
    };
    debug!("Parsing {} bytes of plan output", text.len());

    let plan = PlanOutput::parse(&text);

    if args.json {
        let value = serde_json::json!({
            "summary": plan.summary,
            "no_changes": plan.has_no_changes(),
            "changes": plan.changes,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(ExitCodes::SUCCESS);
    }

    println!("{}", render(&plan));
    Ok(ExitCodes::SUCCESS)
}

fn render(plan: &PlanOutput) -> String {
    let mut out = match plan.summary {
        Some(summary) if plan.has_no_changes() => format!("📋 No changes ({})", summary),
        Some(summary) => format!("📋 Plan: {}", summary),
        None => "⚠️  No plan summary found".to_string(),
    };
    for change in &plan.changes {
        out.push_str(&format!("\n  {:<8} {}", change.action.as_str(), change.address));
    }
    out
}
