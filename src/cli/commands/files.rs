use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_fields};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::files::resolve_file_url;

#[derive(Subcommand)]
pub enum FilesCommands {
    #[command(about = "Resolve a stored file reference to a fetchable URL")]
    Url {
        /// Absolute URL or storage path, e.g. /uploads/2024/scan.pdf
        reference: String,
    },
}

pub async fn handle(cmd: FilesCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        FilesCommands::Url { reference } => match resolve_file_url(&config().backend, &reference) {
            Some(url) => {
                output_fields(&output_format, json!({ "reference": reference, "url": url }))
            }
            None => {
                output_error(
                    &output_format,
                    "Not a resolvable file reference",
                    Some("INVALID_REFERENCE"),
                )?;
                anyhow::bail!("cannot resolve '{}'", reference);
            }
        },
    }
}
