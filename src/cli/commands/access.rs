use clap::Subcommand;
use serde_json::json;

use crate::access::{self, Role};
use crate::cli::utils::output_fields;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AccessCommands {
    #[command(about = "Check whether ROLE may see PATH")]
    Check {
        /// Raw role string, e.g. "ROLE_DOCTOR" or "간호사"
        role: String,
        path: String,
    },

    #[command(about = "Show the landing page for ROLE")]
    Home { role: String },

    #[command(about = "List the menu modules visible to ROLE")]
    Modules { role: String },
}

pub async fn handle(cmd: AccessCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AccessCommands::Check { role, path } => {
            let allowed = access::can_access_path(&role, &path);
            output_fields(
                &output_format,
                json!({
                    "role": Role::normalize(&role),
                    "path": path,
                    "allowed": allowed,
                }),
            )
        }
        AccessCommands::Home { role } => output_fields(
            &output_format,
            json!({
                "role": Role::normalize(&role),
                "home": access::default_path_for_role(&role),
            }),
        ),
        AccessCommands::Modules { role } => {
            let modules: Vec<&str> = access::visible_modules(&role)
                .into_iter()
                .map(|m| m.as_str())
                .collect();
            output_fields(
                &output_format,
                json!({
                    "role": Role::normalize(&role),
                    "modules": modules.join(","),
                }),
            )
        }
    }
}
