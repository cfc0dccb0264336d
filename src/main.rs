//! office365-oauth2 - Office 365 sign-in from the terminal
//!
//! A minimal host for the Office 365 strategy: prints the authorization URL,
//! completes the flow from the pasted callback URL, and shows the profile.

mod config;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use office365_oauth2::auth::office365::{AUTHORIZATION_URL, TOKEN_URL};
use office365_oauth2::{
    api, AuthRequest, AuthenticateOptions, Office365Options, Office365Strategy, Outcome, Profile,
    Strategy, TokenParams, Verdict, Verify,
};

use config::Config;

#[derive(Parser)]
#[command(name = "office365-oauth2")]
#[command(about = "Sign in to Office 365 / Azure AD with the authorization code flow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the application registration to the config file
    Init {
        /// Application (client) ID from the Azure portal
        #[arg(long)]
        client_id: String,

        /// Client secret
        #[arg(long)]
        client_secret: String,

        /// Redirect URI registered for the application
        #[arg(long)]
        callback_url: String,

        #[arg(long, default_value = AUTHORIZATION_URL)]
        authorization_url: String,

        #[arg(long, default_value = TOKEN_URL)]
        token_url: String,

        /// Requested scope (repeatable)
        #[arg(long, default_value = "User.Read")]
        scope: Vec<String>,

        /// Default Azure AD resource
        #[arg(long)]
        resource: Option<String>,
    },

    /// Print the authorization URL to open in a browser
    Authorize {
        /// Resource for this request (overrides the configured default)
        #[arg(long)]
        resource: Option<String>,

        /// Azure AD prompt behaviour: login, consent, select_account
        #[arg(long)]
        prompt: Option<String>,

        /// Pre-fill the sign-in name
        #[arg(long)]
        login_hint: Option<String>,

        /// Use a fixed state instead of a random one
        #[arg(long)]
        state: Option<String>,
    },

    /// Complete sign-in from the URL the browser was redirected to
    Callback {
        /// Full redirect URL including the query string
        url: String,

        /// State printed by `authorize`; checked against the callback
        #[arg(long)]
        state: Option<String>,
    },

    /// Show the profile for an access token
    Whoami {
        /// Bearer access token for Microsoft Graph
        #[arg(short, long)]
        token: String,
    },

    /// Show config file location and current settings
    Config,
}

/// User produced by the CLI's verify callback
#[derive(Debug)]
struct SignedIn {
    access_token: String,
    has_refresh_token: bool,
    params: TokenParams,
    profile: Option<Profile>,
}

struct AcceptAny;

#[async_trait]
impl Verify for AcceptAny {
    type User = SignedIn;

    async fn verify(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        params: &TokenParams,
        profile: Option<Profile>,
    ) -> anyhow::Result<Verdict<SignedIn>> {
        Ok(Verdict::Verified(SignedIn {
            access_token: access_token.to_string(),
            has_refresh_token: refresh_token.is_some(),
            params: params.clone(),
            profile,
        }))
    }
}

fn load_strategy() -> Result<Office365Strategy<AcceptAny>> {
    let config = Config::load()?;
    Office365Strategy::new(config.strategy, AcceptAny)
        .context("Invalid configuration. Run 'office365-oauth2 init' first.")
}

fn print_profile(profile: &Profile) -> Result<()> {
    let field = |name: &str| {
        profile
            .json
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("(none)")
            .to_string()
    };

    println!();
    println!("Provider:     {}", profile.provider);
    println!("Display Name: {}", field("displayName"));
    println!("Mail:         {}", field("mail"));
    println!("UPN:          {}", field("userPrincipalName"));
    println!("ID:           {}", field("id"));
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&profile.json).context("Failed to format profile")?
    );
    Ok(())
}

async fn authorize(options: AuthenticateOptions) -> Result<()> {
    let strategy = load_strategy()?;
    match strategy.authenticate(&AuthRequest::new(), options).await? {
        Outcome::Redirect { url, state } => {
            println!();
            println!("To sign in, visit: {}", url);
            println!("State:             {}", state);
            println!();
            println!("Then run: office365-oauth2 callback '<redirect url>' --state {}", state);
            Ok(())
        }
        _ => bail!("Expected a redirect for a request without a callback query"),
    }
}

async fn callback(url: &str, expected_state: Option<&str>) -> Result<()> {
    let url = url::Url::parse(url).context("Callback URL is not a valid URL")?;
    let request = AuthRequest::from_url(&url);

    if let Some(expected) = expected_state {
        if request.param("state") != Some(expected) {
            bail!("State mismatch: the callback does not belong to this sign-in");
        }
    }

    let strategy = load_strategy()?;
    match strategy
        .authenticate(&request, AuthenticateOptions::default())
        .await?
    {
        Outcome::Success { user } => {
            println!("Login successful.");
            println!("Access token: {}", user.access_token);
            println!("Token type:   {}", user.params.token_type);
            if let Some(expires_in) = user.params.expires_in {
                println!("Expires in:   {}s", expires_in.as_secs());
            }
            println!(
                "Refresh tok:  {}",
                if user.has_refresh_token { "present" } else { "none" }
            );
            if let Some(ref profile) = user.profile {
                print_profile(profile)?;
            }
            Ok(())
        }
        Outcome::Fail { message } => {
            bail!("Login failed: {}", message.as_deref().unwrap_or("(no reason given)"))
        }
        Outcome::Redirect { .. } => {
            bail!("Callback URL carries neither 'code' nor 'error'")
        }
    }
}

async fn whoami(token: &str) -> Result<()> {
    let config = Config::load()?;
    let url = config
        .strategy
        .profile_url
        .unwrap_or_else(|| api::ME_URL.to_string());

    let json = api::fetch_profile(&reqwest::Client::new(), &url, token).await?;
    print_profile(&Profile::new(office365_oauth2::STRATEGY_NAME, json))
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let opts = &config.strategy.oauth2;
    let or_none = |s: &str| if s.is_empty() { "(none)".to_string() } else { s.to_string() };

    println!("Config file:  {}", Config::config_path()?.display());
    println!("Client ID:    {}", or_none(&opts.client_id));
    println!("Secret:       {}", config.masked_secret());
    println!(
        "Callback:     {}",
        opts.callback_url.as_deref().unwrap_or("(none)")
    );
    println!("Authorize:    {}", or_none(&opts.authorization_url));
    println!("Token:        {}", or_none(&opts.token_url));
    println!("Scope:        {}", opts.scope.join(" "));
    println!(
        "Resource:     {}",
        config.strategy.resource.as_deref().unwrap_or("(none)")
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Init {
            client_id,
            client_secret,
            callback_url,
            authorization_url,
            token_url,
            scope,
            resource,
        } => {
            let mut strategy = Office365Options::common(&client_id, &client_secret, &callback_url);
            strategy.oauth2.authorization_url = authorization_url;
            strategy.oauth2.token_url = token_url;
            strategy.oauth2.scope = scope;
            strategy.resource = resource;

            // Fail early on bad URLs or empty values
            Office365Strategy::new(strategy.clone(), AcceptAny)?;

            let mut config = Config::load()?;
            config.strategy = strategy;
            config.save()?;
            println!("Saved {}", Config::config_path()?.display());
        }
        Commands::Authorize {
            resource,
            prompt,
            login_hint,
            state,
        } => {
            tracing::info!("Building authorization URL...");
            let mut options = AuthenticateOptions {
                resource,
                state,
                ..Default::default()
            };
            if let Some(prompt) = prompt {
                options.extra.insert("prompt".to_string(), prompt);
            }
            if let Some(hint) = login_hint {
                options.extra.insert("login_hint".to_string(), hint);
            }
            authorize(options).await?;
        }
        Commands::Callback { url, state } => {
            tracing::info!("Completing sign-in...");
            callback(&url, state.as_deref()).await?;
        }
        Commands::Whoami { token } => {
            whoami(&token).await?;
        }
        Commands::Config => {
            show_config()?;
        }
    }

    Ok(())
}
