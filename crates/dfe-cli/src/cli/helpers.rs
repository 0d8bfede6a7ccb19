use super::CliError;
use anyhow::Context;
use dfe_core::domain::DfeError;
use serde::Serialize;

pub(super) fn compute_error(error: impl Into<DfeError>) -> CliError {
    CliError::Compute(error.into())
}

/// Parses `--params` values such as `0.2,-1.5,1e3`. An empty string is an
/// empty list.
pub(super) fn parse_params(raw: &str) -> Result<Vec<f64>, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            let value = token.parse::<f64>().map_err(|_| {
                CliError::Usage(format!(
                    "--params entry {} ('{}') is not a number",
                    index + 1,
                    token
                ))
            })?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(CliError::Usage(format!(
                    "--params entry {} must be finite, got {}",
                    index + 1,
                    token
                )))
            }
        })
        .collect()
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to render command output as JSON")?;
    println!("{rendered}");
    Ok(())
}
