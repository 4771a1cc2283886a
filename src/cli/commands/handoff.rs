use crate::auth::handoff::{
    DEFAULT_APP_ORIGIN, DEFAULT_CALLBACK_ROUTE, DEFAULT_RESET_PASSWORD_ROUTE,
};
use clap::{Arg, Command};

pub const ARG_APP_ORIGIN: &str = "app-origin";
pub const ARG_RESET_PASSWORD_ROUTE: &str = "reset-password-route";
pub const ARG_CALLBACK_ROUTE: &str = "callback-route";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_APP_ORIGIN)
                .long(ARG_APP_ORIGIN)
                .help("Public origin of the web app, used for the OAuth callback and CORS")
                .env("PLACEGATE_APP_ORIGIN")
                .default_value(DEFAULT_APP_ORIGIN),
        )
        .arg(
            Arg::new(ARG_RESET_PASSWORD_ROUTE)
                .long(ARG_RESET_PASSWORD_ROUTE)
                .help("Page that completes password recovery")
                .env("PLACEGATE_RESET_PASSWORD_ROUTE")
                .default_value(DEFAULT_RESET_PASSWORD_ROUTE),
        )
        .arg(
            Arg::new(ARG_CALLBACK_ROUTE)
                .long(ARG_CALLBACK_ROUTE)
                .help("Server route that exchanges authorization codes")
                .env("PLACEGATE_CALLBACK_ROUTE")
                .default_value(DEFAULT_CALLBACK_ROUTE),
        )
}
