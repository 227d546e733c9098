//! Command-line interface for the overseer demo server.
//!
//! Uses lexopt to keep the binary small.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::Backend;

/// Command-line arguments. Unset options fall through to the environment,
/// the config file and then the defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Session backend.
    pub backend: Option<Backend>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Send session cookies without the `Secure` attribute.
    pub insecure_cookies: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                let host = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("host", value))?;
                result.host = Some(host);
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                let port = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("port", value))?;
                result.port = Some(port);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("backend") => {
                let value: String = parser.value()?.parse()?;
                let backend = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("backend", value))?;
                result.backend = Some(backend);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("insecure-cookies") => {
                result.insecure_cookies = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"overseer {version}
HTTP session management demo server

USAGE:
    overseer [OPTIONS]

OPTIONS:
    -H, --host <ADDR>       Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 3000]
    -c, --config <FILE>     Path to configuration file (JSON)
    -b, --backend <NAME>    Session backend: cookie, memory, disk, redis [default: memory]
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --insecure-cookies  Omit the Secure cookie attribute (plain HTTP development)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    OVERSEER_HOST           Host address (overrides config)
    OVERSEER_PORT           Port number (overrides config)
    OVERSEER_BACKEND        Session backend (overrides config)
    OVERSEER_SECRET_KEY     Base64 cookie encryption key, 16 or 32 bytes
    OVERSEER_DISK_DIR       Session directory for the disk backend
    OVERSEER_REDIS_URL      Redis URL for the redis backend
    OVERSEER_LOG_LEVEL      Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # In-memory sessions on localhost:3000
    overseer

    # Encrypted cookie sessions over plain HTTP
    overseer -b cookie --insecure-cookies

    # Sessions on disk, listening on all interfaces
    OVERSEER_DISK_DIR=/var/lib/overseer overseer -b disk -H 0.0.0.0 -p 8080

    # Start with config file
    overseer -c /etc/overseer/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("overseer {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("overseer")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert_eq!(result.host, None);
        assert_eq!(result.port, None);
        assert_eq!(result.backend, None);
        assert!(!result.insecure_cookies);
    }

    #[test]
    fn test_host_port() {
        let result = parse_args_from(args(&["-H", "0.0.0.0", "-p", "8080"])).unwrap();
        assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
        assert_eq!(result.port, Some(8080));
    }

    #[test]
    fn test_long_options() {
        let result =
            parse_args_from(args(&["--host", "192.168.1.1", "--port", "9000"])).unwrap();
        assert_eq!(result.host.unwrap().to_string(), "192.168.1.1");
        assert_eq!(result.port, Some(9000));
    }

    #[test]
    fn test_backend() {
        let result = parse_args_from(args(&["-b", "disk"])).unwrap();
        assert_eq!(result.backend, Some(Backend::Disk));

        let result = parse_args_from(args(&["--backend", "cookie"])).unwrap();
        assert_eq!(result.backend, Some(Backend::Cookie));
    }

    #[test]
    fn test_invalid_backend() {
        let err = parse_args_from(args(&["-b", "postgres"])).unwrap_err();
        assert!(err.to_string().contains("backend"));
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/config.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
    }

    #[test]
    fn test_insecure_cookies() {
        let result = parse_args_from(args(&["--insecure-cookies"])).unwrap();
        assert!(result.insecure_cookies);
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);

        let result = parse_args_from(args(&["--version"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_port() {
        let result = parse_args_from(args(&["-p", "invalid"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_host() {
        let result = parse_args_from(args(&["-H", "not-an-ip"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unexpected_positional() {
        let result = parse_args_from(args(&["serve"]));
        assert!(matches!(result, Err(ArgsError::UnexpectedArgument(_))));
    }

    #[test]
    fn test_combined_options() {
        let result = parse_args_from(args(&[
            "-H",
            "0.0.0.0",
            "-p",
            "8080",
            "-b",
            "redis",
            "-l",
            "debug",
            "--insecure-cookies",
        ]))
        .unwrap();

        assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
        assert_eq!(result.port, Some(8080));
        assert_eq!(result.backend, Some(Backend::Redis));
        assert_eq!(result.log_level, Some("debug".to_string()));
        assert!(result.insecure_cookies);
    }
}
