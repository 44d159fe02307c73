//! Command implementations for ecudiag

pub mod config;
pub mod dtc;
pub mod export;
pub mod flash;
pub mod monitor;
pub mod patch;
pub mod ports;
pub mod settings;
pub mod version;

pub use config::config;
pub use dtc::{clear_dtc, dtc};
pub use export::export_log;
pub use flash::flash;
pub use monitor::monitor;
pub use patch::patch;
pub use ports::ports;
pub use settings::{set_fan_temp, set_fuel_warning, set_max_rpm};
pub use version::version;

use std::io::{self, BufRead, Write};

use anyhow::Result;

/// Ask a yes/no question on the terminal; anything but "y"/"yes" is a no
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }
}
