pub mod describe;
pub mod filters;
pub mod listing;
pub mod rules;

use crate::cli::utils::output_engine_error;
use crate::cli::OutputFormat;
use crate::error::EngineError;

/// Report an engine failure before handing it to the binary
pub(crate) fn engine_result<T>(output_format: &OutputFormat, result: Result<T, EngineError>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(error) => {
            output_engine_error(output_format, &error)?;
            Err(error.into())
        }
    }
}
