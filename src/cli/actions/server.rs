use crate::{
    api,
    auth::{AuthState, CookieConfig, GateConfig, HandoffConfig},
    cli::telemetry,
    identity::GoTrueClient,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub provider_url: String,
    pub provider_anon_key: SecretString,
    pub provider_timeout: Duration,
    pub protected_prefixes: Vec<String>,
    pub protected_routes: Vec<String>,
    pub login_route: String,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub cookie_secure: bool,
    pub app_origin: String,
    pub reset_password_route: String,
    pub callback_route: String,
}

impl Args {
    fn auth_state(self) -> Result<AuthState> {
        let provider = GoTrueClient::new(
            &self.provider_url,
            self.provider_anon_key,
            self.provider_timeout,
        )
        .context("Failed to build identity provider client")?;

        Ok(AuthState::new(Arc::new(provider))
            .with_gate(
                GateConfig::new()
                    .with_protected_prefixes(self.protected_prefixes)
                    .with_protected_routes(self.protected_routes)
                    .with_login_route(self.login_route),
            )
            .with_cookies(
                CookieConfig::new()
                    .with_access_name(self.access_cookie)
                    .with_refresh_name(self.refresh_cookie)
                    .with_secure(self.cookie_secure),
            )
            .with_handoff(
                HandoffConfig::new()
                    .with_app_origin(self.app_origin)
                    .with_reset_password_route(self.reset_password_route)
                    .with_callback_route(self.callback_route),
            ))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the provider client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let port = args.port;
    let state = Arc::new(args.auth_state()?);

    let result = api::new(port, state).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("provider_url", args.provider_url.clone()),
        (
            "provider_timeout",
            format!("{}s", args.provider_timeout.as_secs()),
        ),
        ("protected_prefixes", args.protected_prefixes.join(",")),
        ("protected_routes", args.protected_routes.join(",")),
        ("login_route", args.login_route.clone()),
        ("access_cookie", args.access_cookie.clone()),
        ("refresh_cookie", args.refresh_cookie.clone()),
        ("cookie_secure", args.cookie_secure.to_string()),
        ("app_origin", args.app_origin.clone()),
        ("callback_route", args.callback_route.clone()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            provider_url: "https://project.supabase.co".to_string(),
            provider_anon_key: SecretString::from("anon".to_string()),
            provider_timeout: Duration::from_secs(5),
            protected_prefixes: vec!["/me".to_string()],
            protected_routes: vec!["/lists/new".to_string()],
            login_route: "/signin".to_string(),
            access_cookie: "access".to_string(),
            refresh_cookie: "refresh".to_string(),
            cookie_secure: false,
            app_origin: "https://places.test".to_string(),
            reset_password_route: "/reset".to_string(),
            callback_route: "/cb".to_string(),
        }
    }

    #[test]
    fn auth_state_carries_configuration() -> Result<()> {
        let state = args().auth_state()?;
        assert!(state.gate().is_protected("/me/lists"));
        assert!(state.gate().is_protected("/lists/new"));
        assert!(!state.gate().is_protected("/account"));
        assert_eq!(state.gate().login_route(), "/signin");
        assert_eq!(state.cookies().access_name(), "access");
        assert!(!state.cookies().secure());
        assert_eq!(state.handoff().app_origin(), "https://places.test");
        assert_eq!(state.handoff().callback_route(), "/cb");
        Ok(())
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("unknown"), "unknown");
    }
}
