//! Layered configuration: file, then `APPLEID_*` environment, then flags

use appleid_auth::AppleIdConfig;
use config::{Config, Environment, File};

use crate::cli::GlobalArgs;
use crate::error::CliResult;

/// Environment variable prefix (`APPLEID_ENDPOINT`, `APPLEID_HTTP_TIMEOUT_SECS`, ...)
pub const ENV_PREFIX: &str = "APPLEID";

/// Resolve the client configuration
///
/// # Errors
///
/// Returns a config error when the file is missing or unreadable, or when a
/// value has the wrong type.
pub fn load(args: &GlobalArgs) -> CliResult<AppleIdConfig> {
    load_with_env(args, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
}

fn load_with_env(args: &GlobalArgs, env: Environment) -> CliResult<AppleIdConfig> {
    let mut builder = Config::builder();

    if let Some(path) = &args.config {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }
    builder = builder.add_source(env);

    if let Some(endpoint) = &args.endpoint {
        builder = builder.set_override("endpoint", endpoint.as_str())?;
    }
    if let Some(issuer) = &args.issuer {
        builder = builder.set_override("issuer", issuer.as_str())?;
    }
    if let Some(timeout) = args.timeout {
        builder = builder.set_override("http_timeout_secs", timeout)?;
    }

    let config: AppleIdConfig = builder.build()?.try_deserialize()?;
    tracing::debug!(
        endpoint = %config.endpoint,
        issuer = %config.issuer,
        http_timeout_secs = config.http_timeout_secs,
        "Loaded configuration"
    );
    Ok(config)
}
