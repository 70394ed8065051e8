//! Runs an interactive login against the broker named on the command line (or the configured
//! default), then prints a redacted summary of the issued tokens.
//!
//! ```sh
//! BROKER_AUTH_SECRET_KEY=$(openssl rand -base64 32) \
//! BROKER_AUTH_FYERS_CREDENTIALS='{"app_id":"...","secret_id":"...","redirect_uri":"https://..."}' \
//! cargo run --example broker_login -- fyers
//! ```

// crates.io
use color_eyre::{Result, eyre::eyre};
use tokio::io::{self, AsyncBufReadExt, BufReader};
// self
use broker_auth::{
	broker::{CompletionInput, LoginInitiation},
	config::AuthConfig,
	service::AuthService,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = AuthConfig::from_env()?;
	let service = AuthService::from_config(&config)?;
	let broker = std::env::args().nth(1).unwrap_or_else(|| service.default_broker().to_string());
	let LoginInitiation { login_url, mut session, challenge, message } =
		service.initiate_login(&broker, None).await?;

	println!("{message}");

	let mut lines = BufReader::new(io::stdin()).lines();
	let input = if let Some(login_url) = login_url {
		println!("Sign in at {login_url}.");
		println!("Paste the full redirect URL:");

		let redirect = lines.next_line().await?.ok_or_else(|| eyre!("stdin closed"))?;

		CompletionInput::from_redirect_url(redirect.trim())?
	} else if session.awaits_otp() {
		println!("{}:", challenge.as_deref().unwrap_or("Enter the one-time code"));

		let otp = lines.next_line().await?.ok_or_else(|| eyre!("stdin closed"))?;

		CompletionInput::otp(otp.trim())
	} else {
		CompletionInput::default()
	};
	let result = service.complete_login(&broker, &mut session, input).await?;

	println!("Logged in to {broker} at {}.", result.issued_at);
	println!("Access token: {:?}.", result.access_token);
	println!("Refresh token issued: {}.", result.refresh_token.is_some());

	Ok(())
}
