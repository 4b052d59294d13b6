use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("blogga")
        .about("Multi-tenant blog platform backend")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("BLOGGA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Postgres connection string")
                .env("BLOGGA_DSN")
                .required_unless_present("memory-store"),
        )
        .arg(
            Arg::new("memory-store")
                .long("memory-store")
                .help("Run against in-memory stores instead of Postgres (dev only)")
                .env("BLOGGA_MEMORY_STORE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("HMAC secret for signing tokens, at least 32 bytes")
                .env("BLOGGA_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("frontend-url")
                .long("frontend-url")
                .help("Frontend base URL, used for CORS and verification links")
                .default_value("http://localhost:3000")
                .env("BLOGGA_FRONTEND_URL"),
        )
        .arg(
            Arg::new("access-token-ttl")
                .long("access-token-ttl")
                .help("Access token lifetime in seconds")
                .default_value("86400")
                .env("BLOGGA_ACCESS_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("verify-token-ttl")
                .long("verify-token-ttl")
                .help("Verification token lifetime in seconds")
                .default_value("600")
                .env("BLOGGA_VERIFY_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("session-ttl")
                .long("session-ttl")
                .help("Rolling session inactivity window in seconds")
                .default_value("86400")
                .env("BLOGGA_SESSION_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("BLOGGA_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
