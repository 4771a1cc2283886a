use crate::cli::{
    actions::{Action, server::Args},
    commands::{self, gate, handoff, provider},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

fn strings(matches: &clap::ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect())
        .unwrap_or_default()
}

fn string(matches: &clap::ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let provider_url = string(matches, provider::ARG_PROVIDER_URL)?;
    Url::parse(&provider_url).context("invalid PLACEGATE_PROVIDER_URL")?;

    let provider_anon_key = SecretString::from(string(matches, provider::ARG_PROVIDER_ANON_KEY)?);
    let provider_timeout = Duration::from_secs(
        matches
            .get_one::<u64>(provider::ARG_PROVIDER_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(crate::identity::gotrue::DEFAULT_TIMEOUT_SECONDS),
    );

    let app_origin = string(matches, handoff::ARG_APP_ORIGIN)?;
    Url::parse(&app_origin).context("invalid PLACEGATE_APP_ORIGIN")?;

    Ok(Action::Server(Args {
        port,
        provider_url,
        provider_anon_key,
        provider_timeout,
        protected_prefixes: strings(matches, gate::ARG_PROTECTED_PREFIX),
        protected_routes: strings(matches, gate::ARG_PROTECTED_ROUTE),
        login_route: string(matches, gate::ARG_LOGIN_ROUTE)?,
        access_cookie: string(matches, gate::ARG_ACCESS_COOKIE)?,
        refresh_cookie: string(matches, gate::ARG_REFRESH_COOKIE)?,
        cookie_secure: matches
            .get_one::<bool>(gate::ARG_COOKIE_SECURE)
            .copied()
            .unwrap_or(true),
        app_origin,
        reset_password_route: string(matches, handoff::ARG_RESET_PASSWORD_ROUTE)?,
        callback_route: string(matches, handoff::ARG_CALLBACK_ROUTE)?,
    }))
}
