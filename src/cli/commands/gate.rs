use crate::auth::{
    cookies::{DEFAULT_ACCESS_COOKIE, DEFAULT_REFRESH_COOKIE},
    gate::{DEFAULT_LOGIN_ROUTE, DEFAULT_PROTECTED_PREFIXES, DEFAULT_PROTECTED_ROUTES},
};
use clap::{Arg, ArgAction, Command};

pub const ARG_PROTECTED_PREFIX: &str = "protected-prefix";
pub const ARG_PROTECTED_ROUTE: &str = "protected-route";
pub const ARG_LOGIN_ROUTE: &str = "login-route";
pub const ARG_ACCESS_COOKIE: &str = "access-cookie";
pub const ARG_REFRESH_COOKIE: &str = "refresh-cookie";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROTECTED_PREFIX)
                .long(ARG_PROTECTED_PREFIX)
                .help("Path prefixes that require a session (comma separated)")
                .env("PLACEGATE_PROTECTED_PREFIXES")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .default_values(DEFAULT_PROTECTED_PREFIXES.iter().copied()),
        )
        .arg(
            Arg::new(ARG_PROTECTED_ROUTE)
                .long(ARG_PROTECTED_ROUTE)
                .help("Exact paths that require a session (comma separated)")
                .env("PLACEGATE_PROTECTED_ROUTES")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .default_values(DEFAULT_PROTECTED_ROUTES.iter().copied()),
        )
        .arg(
            Arg::new(ARG_LOGIN_ROUTE)
                .long(ARG_LOGIN_ROUTE)
                .help("Where unauthenticated requests are sent")
                .env("PLACEGATE_LOGIN_ROUTE")
                .default_value(DEFAULT_LOGIN_ROUTE),
        )
        .arg(
            Arg::new(ARG_ACCESS_COOKIE)
                .long(ARG_ACCESS_COOKIE)
                .help("Name of the access-token cookie")
                .env("PLACEGATE_ACCESS_COOKIE")
                .default_value(DEFAULT_ACCESS_COOKIE),
        )
        .arg(
            Arg::new(ARG_REFRESH_COOKIE)
                .long(ARG_REFRESH_COOKIE)
                .help("Name of the refresh-token cookie")
                .env("PLACEGATE_REFRESH_COOKIE")
                .default_value(DEFAULT_REFRESH_COOKIE),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark session cookies Secure (disable only for plain-http development)")
                .env("PLACEGATE_COOKIE_SECURE")
                .action(ArgAction::Set)
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
}
