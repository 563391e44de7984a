//! Normalization preview command

use anyhow::Result;
use ledgermatch_core::normalize::normalize;

/// Print the matching key for each raw description
pub fn cmd_normalize(texts: &[String]) -> Result<()> {
    for text in texts {
        let key = normalize(text);
        if key.is_empty() {
            println!("  \"{}\" → (empty)", text);
        } else {
            println!("  \"{}\" → \"{}\"", text, key);
        }
    }
    Ok(())
}
