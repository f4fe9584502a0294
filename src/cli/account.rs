use anyhow::{Result, anyhow};
use std::io::{self, Write};

use crate::backend::BackendClient;
use crate::core::AppConfig;

fn read_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow!("A password is required"));
    }
    Ok(password)
}

pub async fn login(config: &AppConfig, email: &str) -> Result<()> {
    let password = read_password()?;
    let resp = BackendClient::from_config(config)
        .login(email, &password)
        .await?;

    println!("\nSigned in. Export the token to chat:\n");
    println!("export HNCHAT_TOKEN={}", resp.access_token);
    if let Some(refresh_token) = resp.refresh_token {
        println!("\nRefresh token: {}", refresh_token);
    }
    Ok(())
}

pub async fn signup(config: &AppConfig, email: &str) -> Result<()> {
    let password = read_password()?;
    let resp = BackendClient::from_config(config)
        .signup(email, &password)
        .await?;

    if resp.session.is_some() {
        println!("Account created. Run `hnchat login --email {}` to get a token.", email);
    } else {
        println!("Account created. Confirm your email address, then run `hnchat login`.");
    }
    tracing::debug!("Created user {}", resp.user);
    Ok(())
}
