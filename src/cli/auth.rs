//! Auth command - test and manage authentication

use crate::cli::style::{Stylize, check, hyperlink_url};
use anstream::println;
use stb::auth::get_api_key;
use stb::backend::create_backend;
use stb::config::{API_KEY_VAR, FileConfig, Settings};
use stb::error::Result;

/// `stb auth` sub-actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    /// Resolve the key and ask the service who it belongs to
    Test,
    /// Show how to configure a key
    Setup,
}

/// Run the auth test command
pub async fn run_auth_test(settings: &Settings) -> Result<()> {
    println!(
        "Testing authentication against {} ({})...",
        settings.environment.accent(),
        hyperlink_url(settings.environment.base_url())
    );
    let api_key = get_api_key(settings)?;
    let backend = create_backend(settings, &api_key);
    let user = backend.current_user().await?;

    println!("{} Authenticated as: {}", check(), user.email.emphasis());
    println!("  {} {}", "User ID:".muted(), user.user_id);
    println!("  {} {}", "Key source:".muted(), api_key.source);
    Ok(())
}

/// Run the auth setup command (show instructions)
pub fn run_auth_setup() {
    let config_path = FileConfig::default_path().map_or_else(
        || "<config dir>/stb/config.toml".to_string(),
        |p| p.display().to_string(),
    );

    println!("{}", "stb Authentication Setup".emphasis());
    println!("========================");
    println!();
    println!("Option 1: Environment variable");
    println!("  export {API_KEY_VAR}=<your key>");
    println!();
    println!("Option 2: Config file");
    println!("  {config_path}");
    println!("    [auth]");
    println!("    api_key = \"<your key>\"");
    println!();
    println!("The environment variable takes precedence over the config file.");
}

/// Wrapper for auth commands
pub async fn run_auth(settings: &Settings, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Test => run_auth_test(settings).await,
        AuthAction::Setup => {
            run_auth_setup();
            Ok(())
        }
    }
}
