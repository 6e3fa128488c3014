//! Name-prefix command - Generate unique resource name prefixes.

use anyhow::{bail, Result};
use clap::Args;

use kmstest_terraform::generate_name_prefix;

use crate::ExitCodes;

#[derive(Args)]
pub struct NamePrefixArgs {
    /// Short label the prefix starts with (e.g. comp, def)
    pub label: String,

    /// Number of prefixes to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,
}

pub fn execute(args: NamePrefixArgs) -> Result<u8> {
    if args.label.is_empty() {
        bail!("label must not be empty");
    }

    for prefix in prefixes(&args.label, args.count) {
        println!("{}", prefix);
    }

    Ok(ExitCodes::SUCCESS)
}

fn prefixes(label: &str, count: usize) -> Vec<String> {
    (0..count).map(|_| generate_name_prefix(label)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_share_label_and_differ() {
        let generated = prefixes("def", 5);

        assert_eq!(generated.len(), 5);
        assert!(generated.iter().all(|p| p.starts_with("def-") && p.len() == 14));
        let mut unique = generated.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
    }
}
