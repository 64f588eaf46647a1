//! Command implementations

use std::time::Duration;

use appleid_auth::{
    AppleIdClient, AuthorizationUrlOptions, ClientSecretOptions, TokenRequestOptions,
    VerifyOptions,
};
use secrecy::SecretString;
use tracing::debug;

use crate::cli::{AuthorizeUrlArgs, ClientSecretArgs, Commands, Credentials, VerifyArgs};
use crate::error::{CliError, CliResult};
use crate::output::Formatter;

/// Execute a parsed command
///
/// # Errors
///
/// Propagates library errors and argument errors.
pub async fn execute(command: Commands, client: &AppleIdClient, out: Formatter) -> CliResult<()> {
    match command {
        Commands::Keys { no_cache } => {
            let pems = client.apple_public_keys(no_cache).await?;
            debug!(key_count = pems.len(), "Fetched Apple public keys");
            out.display_keys(&pems)
        }
        Commands::Verify(args) => {
            let claims = client
                .verify_id_token(&args.id_token, &verify_options(&args))
                .await?;
            out.display(&claims)
        }
        Commands::AuthorizeUrl(args) => {
            let url = client.authorization_url(&authorization_options(args))?;
            out.display_value("url", url.as_str())
        }
        Commands::ClientSecret(args) => {
            let secret = client.client_secret(&client_secret_options(args)?)?;
            out.display_value("client_secret", &secret)
        }
        Commands::Exchange {
            code,
            credentials,
            redirect_uri,
        } => {
            let mut options = token_options(credentials);
            options.redirect_uri = redirect_uri;
            let response = client.exchange_code(&code, &options).await?;
            out.display(&response)
        }
        Commands::Refresh {
            refresh_token,
            credentials,
        } => {
            let response = client
                .refresh_token(&refresh_token, &token_options(credentials))
                .await?;
            out.display(&response)
        }
        Commands::Revoke {
            token,
            credentials,
            hint,
        } => {
            client
                .revoke_token(&token, hint, &token_options(credentials))
                .await?;
            out.display_value("revoked", hint.as_str())
        }
    }
}

fn verify_options(args: &VerifyArgs) -> VerifyOptions {
    let mut options = VerifyOptions::new();
    if !args.audience.is_empty() {
        options = options.with_audience(args.audience.iter().cloned());
    }
    if let Some(nonce) = &args.nonce {
        options = options.with_nonce(nonce.clone());
    }
    if let Some(subject) = &args.subject {
        options = options.with_subject(subject.clone());
    }
    if let Some(leeway) = args.leeway {
        options = options.with_leeway(Duration::from_secs(leeway));
    }
    if args.no_cache {
        options = options.without_caching();
    }
    options
}

fn authorization_options(args: AuthorizeUrlArgs) -> AuthorizationUrlOptions {
    AuthorizationUrlOptions {
        client_id: args.client_id,
        redirect_uri: args.redirect_uri,
        scope: args.scope,
        state: args.state,
        response_mode: args.response_mode,
    }
}

fn client_secret_options(args: ClientSecretArgs) -> CliResult<ClientSecretOptions> {
    let private_key = match &args.private_key_env {
        Some(var) => {
            let pem = std::env::var(var).map_err(|_| {
                CliError::InvalidArguments(format!("environment variable {var} is not set"))
            })?;
            Some(SecretString::new(pem))
        }
        None => None,
    };

    Ok(ClientSecretOptions {
        client_id: args.client_id,
        team_id: args.team_id,
        key_id: args.key_id,
        private_key,
        private_key_path: args.private_key_path,
        expires_after: args.expires_after.map(Duration::from_secs),
    })
}

fn token_options(credentials: Credentials) -> TokenRequestOptions {
    TokenRequestOptions::new(credentials.client_id, credentials.client_secret)
}
