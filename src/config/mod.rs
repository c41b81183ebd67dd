use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::game::GameSettings;

pub const DEFAULT_ROOM_CAPACITY: usize = 20;
pub const DEFAULT_JOIN_CODE_DIGITS: u32 = 6;
pub const DEFAULT_END_GRACE_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub game: GameSettings,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where quizzes come from and where final results go
pub struct BackendConfig {
    pub quiz_api_url: Option<String>,
    pub quiz_file: Option<String>,
    pub results_api_url: Option<String>,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut join_code_digits = parse_var("JOIN_CODE_DIGITS", DEFAULT_JOIN_CODE_DIGITS);
        if !(4..=9).contains(&join_code_digits) {
            tracing::warn!(
                digits = join_code_digits,
                "JOIN_CODE_DIGITS must be between 4 and 9, using default"
            );
            join_code_digits = DEFAULT_JOIN_CODE_DIGITS;
        }

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 8080),
            },
            backend: BackendConfig {
                quiz_api_url: non_empty_var("QUIZ_API_URL"),
                quiz_file: non_empty_var("QUIZ_FILE"),
                results_api_url: non_empty_var("RESULTS_API_URL"),
                http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            },
            game: GameSettings {
                room_capacity: parse_var("ROOM_CAPACITY", DEFAULT_ROOM_CAPACITY),
                join_code_digits,
                end_grace: Duration::from_secs(parse_var("END_GRACE_SECS", DEFAULT_END_GRACE_SECS)),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = key, value = %raw, default = %default, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
