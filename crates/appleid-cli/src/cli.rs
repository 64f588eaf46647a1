//! CLI argument parsing

use std::path::PathBuf;

use appleid_auth::{ResponseMode, TokenTypeHint};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "appleid",
    version,
    about = "Sign in with Apple from the command line",
    long_about = "Inspect Apple's signing keys, verify identity tokens, build authorization URLs,\n\
                  mint client secrets and call Apple's token endpoint.\n\n\
                  Settings are read from --config, then APPLEID_* environment variables,\n\
                  then command-line flags."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Apple endpoint base URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Expected identity token issuer
    #[arg(long, global = true)]
    pub issuer: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print Apple's current public signing keys
    Keys {
        /// Do not store the fetched keys in the cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Verify an identity token and print its claims
    Verify(VerifyArgs),

    /// Build an authorization URL
    AuthorizeUrl(AuthorizeUrlArgs),

    /// Mint a client secret
    ClientSecret(ClientSecretArgs),

    /// Exchange an authorization code for tokens
    Exchange {
        /// Authorization code from the redirect
        code: String,

        #[command(flatten)]
        credentials: Credentials,

        /// Redirect URI used in the authorization request
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Obtain a new access token with a refresh token
    Refresh {
        /// Refresh token
        refresh_token: String,

        #[command(flatten)]
        credentials: Credentials,
    },

    /// Revoke an access or refresh token
    Revoke {
        /// Token to revoke
        token: String,

        #[command(flatten)]
        credentials: Credentials,

        /// Kind of token (access_token or refresh_token)
        #[arg(long, default_value = "refresh_token")]
        hint: TokenTypeHint,
    },
}

/// Identity token verification arguments
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// The identity token (JWT)
    pub id_token: String,

    /// Accepted audience (client ID), repeatable
    #[arg(long = "audience", short = 'a')]
    pub audience: Vec<String>,

    /// Expected nonce
    #[arg(long)]
    pub nonce: Option<String>,

    /// Expected subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Clock skew tolerance in seconds
    #[arg(long)]
    pub leeway: Option<u64>,

    /// Fetch unknown keys without storing them in the key cache
    #[arg(long)]
    pub no_cache: bool,
}

/// Authorization URL arguments
#[derive(Args, Debug)]
pub struct AuthorizeUrlArgs {
    /// Services ID or bundle ID
    #[arg(long, env = "APPLEID_CLIENT_ID")]
    pub client_id: String,

    /// Redirect URI registered with Apple
    #[arg(long)]
    pub redirect_uri: String,

    /// Additional scopes, e.g. "name email"
    #[arg(long)]
    pub scope: Option<String>,

    /// State value echoed back by Apple
    #[arg(long)]
    pub state: Option<String>,

    /// Response mode (query, fragment or form_post)
    #[arg(long)]
    pub response_mode: Option<ResponseMode>,
}

/// Client secret arguments
#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("private_key")
        .required(true)
        .args(["private_key_path", "private_key_env"])
))]
pub struct ClientSecretArgs {
    /// Services ID or bundle ID
    #[arg(long, env = "APPLEID_CLIENT_ID")]
    pub client_id: String,

    /// Developer team ID
    #[arg(long, env = "APPLEID_TEAM_ID")]
    pub team_id: String,

    /// Private key ID
    #[arg(long, env = "APPLEID_KEY_ID")]
    pub key_id: String,

    /// Path to the .p8 private key
    #[arg(long)]
    pub private_key_path: Option<PathBuf>,

    /// Name of an environment variable holding the PEM private key
    #[arg(long)]
    pub private_key_env: Option<String>,

    /// Lifetime in seconds
    #[arg(long)]
    pub expires_after: Option<u64>,
}

/// Client credentials for the token endpoint
#[derive(Args, Debug)]
pub struct Credentials {
    /// Services ID or bundle ID
    #[arg(long, env = "APPLEID_CLIENT_ID")]
    pub client_id: String,

    /// Client secret (see `appleid client-secret`)
    #[arg(long, env = "APPLEID_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}
