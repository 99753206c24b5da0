use clap::Subcommand;
use serde_json::json;

use crate::cli::config::session_store;
use crate::cli::utils::output_fields;
use crate::cli::OutputFormat;
use crate::gate::{self, routes, GateDecision, GateRequest};

#[derive(Subcommand)]
pub enum GateCommands {
    #[command(about = "Show what the gate does with a navigation to PATH")]
    Check {
        /// Request path, e.g. /patients/12
        path: String,

        /// Access token cookie value to assume
        #[arg(long)]
        token: Option<String>,

        /// Assume the force-password-change cookie is set
        #[arg(long)]
        force_password_change: bool,

        /// Use the cookies of the stored CLI session
        #[arg(long, conflicts_with = "token")]
        session: bool,
    },
}

pub async fn handle(cmd: GateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        GateCommands::Check {
            path,
            token,
            force_password_change,
            session,
        } => {
            let mut request = if session {
                let header = session_store()?.cookie_header();
                GateRequest::from_cookie_header(path.clone(), Some(header.as_str()))
            } else {
                GateRequest::new(path.clone())
            };

            if let Some(token) = token {
                request = request.with_access_token(token);
            }
            if force_password_change {
                request = request.with_force_password_change(gate::FORCE_FLAG_ON);
            }

            let decision = gate::decide(&request);
            let class = format!("{:?}", routes::classify(&path)).to_lowercase();

            let fields = match &decision {
                GateDecision::Pass => json!({
                    "path": path,
                    "class": class,
                    "authenticated": request.is_authenticated(),
                    "decision": "pass",
                }),
                GateDecision::Redirect(redirect) => json!({
                    "path": path,
                    "class": class,
                    "authenticated": request.is_authenticated(),
                    "decision": "redirect",
                    "location": redirect.location(),
                }),
            };
            output_fields(&output_format, fields)
        }
    }
}
