use std::path::PathBuf;

use clap::Parser;
use derive_getters::Getters;

#[derive(Parser, Debug, Getters)]
#[command(name = "noise-maker")]
#[command(about = "Append fake combined-format access logs to a file", long_about = None)]
pub struct CliArgs {
    #[arg(long, default_value = "access.log")]
    log_file: PathBuf,

    /// Lines per second.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    rate: u64,

    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Stop after this many lines.
    #[arg(long)]
    count: Option<u64>,

    /// Share of lines written deliberately broken, between 0 and 1.
    #[arg(long, default_value_t = 0.0, value_parser = parse_ratio)]
    malformed_ratio: f64,
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{s} is not between 0 and 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asserting::prelude::*;

    #[test]
    fn ratio_must_be_a_finite_share() {
        assert_that!(parse_ratio("0")).is_equal_to(Ok(0.0));
        assert_that!(parse_ratio("0.25")).is_equal_to(Ok(0.25));
        assert_that!(parse_ratio("1")).is_equal_to(Ok(1.0));
        for bad in ["NaN", "inf", "-0.1", "1.5", "abc"] {
            assert_that!(parse_ratio(bad)).is_err();
        }
    }

    #[test]
    fn cli_rejects_nan_ratio() {
        let result = CliArgs::try_parse_from(["noise-maker", "--malformed-ratio", "NaN"]);
        assert_that!(result.is_err()).is_true();
        let args = CliArgs::try_parse_from(["noise-maker", "--malformed-ratio", "0.5"]).unwrap();
        assert_that!(*args.malformed_ratio()).is_equal_to(0.5);
    }
}
