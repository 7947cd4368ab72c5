// SPDX-License-Identifier: MIT

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Prints a single value either as pretty JSON or via the given text
/// renderer, matching every command's `--format` flag.
pub fn render<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Relative-time rendering for `started_at_ms`/`ended_at_ms` fields
/// (spec.md §3 job snapshot fields).
pub fn format_time_ago(epoch_ms: Option<u64>) -> String {
    let Some(epoch_ms) = epoch_ms else { return "-".to_string() };
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let elapsed_secs = now_ms.saturating_sub(epoch_ms) / 1000;
    format_elapsed(elapsed_secs)
}

fn format_elapsed(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_timestamp_renders_as_dash() {
        assert_eq!(format_time_ago(None), "-");
    }

    #[test]
    fn elapsed_buckets_pick_the_coarsest_unit_that_fits() {
        assert_eq!(format_elapsed(5), "5s");
        assert_eq!(format_elapsed(120), "2m");
        assert_eq!(format_elapsed(7200), "2h");
        assert_eq!(format_elapsed(172_800), "2d");
    }
}
