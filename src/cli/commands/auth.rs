use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;

use crate::access::Role;
use crate::cli::config::{
    get_config_dir, record_force_password_change, session_store, session_store_in,
};
use crate::cli::utils::{output_error, output_fields, output_success};
use crate::cli::OutputFormat;
use crate::client::HisApi;
use crate::config::config;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in against the backend and persist the session")]
    Login {
        /// Account name
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    #[command(about = "Clear the stored session")]
    Logout,

    #[command(about = "Show the stored session")]
    Status,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { username, password } => {
            login(&username, password, &output_format).await
        }
        AuthCommands::Logout => {
            session_store()?.clear_session();
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => status(&output_format),
    }
}

async fn login(
    username: &str,
    password: Option<String>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };

    let dir = get_config_dir()?;
    let store = session_store_in(&dir);
    let api = HisApi::from_config(config(), Arc::new(store.clone()))?;

    let result = match api.auth.login(username, &password).await {
        Ok(result) => result,
        Err(e) => {
            output_error(output_format, &e.message(), Some("LOGIN_FAILED"))?;
            anyhow::bail!("login failed");
        }
    };

    store.save_session(&result.access_token, &result.user)?;
    record_force_password_change(&dir, result.force_password_change)?;

    let role = result.user.normalized_role();
    tracing::info!("Signed in as {} ({})", result.user.username, role);

    output_success(
        output_format,
        &format!("Signed in as {} ({})", result.user.display_name, role),
        Some(json!({
            "user": result.user,
            "role": role,
            "home": role.default_path(),
            "modules": role.visible_modules(),
            "force_password_change": result.force_password_change,
        })),
    )?;

    if result.force_password_change && matches!(output_format, OutputFormat::Text) {
        println!("Password change required before continuing");
    }
    Ok(())
}

fn status(output_format: &OutputFormat) -> anyhow::Result<()> {
    let store = session_store()?;

    let Some(session) = store.get_session() else {
        return output_fields(
            output_format,
            json!({
                "signed_in": false,
                "edge_cookie": store.edge_token().is_some(),
            }),
        );
    };

    let role: Role = session.user.normalized_role();
    output_fields(
        output_format,
        json!({
            "signed_in": true,
            "username": session.user.username,
            "display_name": session.user.display_name,
            "role": role,
            "home": role.default_path(),
            "edge_cookie": store.edge_token().is_some(),
            "consistent": store.is_consistent(),
        }),
    )
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();

    if password.is_empty() {
        anyhow::bail!("password is required");
    }
    Ok(password)
}
