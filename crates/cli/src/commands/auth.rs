//! Account commands.
//!
//! Sessions are not kept between runs: pass `--email`/`--password` (or the
//! matching environment variables) to any command that needs one.

use amicale_core::remote::SignUpMetadata;
use amicale_storefront::services::auth::GateState;
use amicale_storefront::state::AppState;
use clap::Subcommand;
use secrecy::SecretString;

use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Check the credentials given with --email/--password
    SignIn,
    /// Create an account
    SignUp {
        /// Email of the new account
        #[arg(long)]
        new_email: String,
        /// Password of the new account (at least 8 characters)
        #[arg(long, env = "AMICALE_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// End the session
    SignOut,
    /// Show the current identity and role
    Whoami,
    /// Change the password of the signed-in account
    Password {
        #[arg(long, env = "AMICALE_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

pub async fn run(state: &AppState, command: AuthCommand) -> Result<(), CliError> {
    let gate = state.gate();
    match command {
        AuthCommand::SignIn => {
            let principal = gate
                .principal()
                .ok_or_else(|| CliError::Usage("pass --email and --password to sign in".to_owned()))?;
            output::line(format_args!("Signed in as {} ({})", principal.email, gate.role()));
        }
        AuthCommand::SignUp {
            new_email,
            new_password,
            first_name,
            last_name,
            phone,
            address,
        } => {
            let metadata = SignUpMetadata {
                first_name,
                last_name,
                phone,
                address,
            };
            let user_id = gate
                .sign_up(&new_email, &SecretString::from(new_password), &metadata)
                .await?;
            output::line(format_args!("Account {user_id} created; sign in to continue"));
        }
        AuthCommand::SignOut => {
            gate.sign_out().await?;
            output::line("Signed out");
        }
        AuthCommand::Whoami => match gate.state() {
            GateState::Authenticated {
                principal,
                profile,
                role,
            } => {
                let name = profile.map_or_else(|| principal.email.to_string(), |p| p.display_name());
                output::line(format_args!("{name} <{}>  role: {role}", principal.email));
            }
            GateState::Unauthenticated | GateState::Loading => output::line("Not signed in"),
        },
        AuthCommand::Password { new_password } => {
            gate.update_password(&SecretString::from(new_password)).await?;
            output::line("Password changed");
        }
    }
    Ok(())
}
