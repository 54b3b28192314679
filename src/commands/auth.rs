//! Login, logout and status.

use clap::Args;

use super::report_load;
use crate::config::Config;
use crate::session::Session;

#[derive(Args)]
pub struct LoginCommand {
    /// Shared trip password
    password: String,
}

impl LoginCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let mut auth = session.auth();
        report_load("login settings", auth.load_auth_config().await)?;

        auth.login(&self.password)?;
        let days = auth.remaining_time().num_days();
        println!("Logged in for {} days.", days);
        Ok(())
    }
}

#[derive(Args)]
pub struct LogoutCommand {}

impl LogoutCommand {
    pub fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        session.auth().logout();
        println!("Logged out.");
        Ok(())
    }
}

#[derive(Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub fn run(&self, session: &Session, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let auth = session.auth();
        let shopping = session.shopping();

        println!("Status");
        println!("======\n");

        if auth.is_login_valid() {
            let remaining = auth.remaining_time();
            println!(
                "Login: valid for {}d {}h",
                remaining.num_days(),
                remaining.num_hours() % 24
            );
            if let Some(at) = auth.logged_in_at() {
                println!("  since: {}", at.format("%Y-%m-%d %H:%M UTC"));
            }
        } else {
            println!("Login: not logged in");
        }
        println!();

        println!(
            "Write endpoint: {}",
            config.write_url.value.as_deref().unwrap_or("(not configured)")
        );
        println!("Pending writes: {}", shopping.pending_writes());
        Ok(())
    }
}
