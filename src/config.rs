//! Configuration for the disciple server
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};

/// Disciple server - presence registry and admin control plane for worker fleets
#[derive(Parser, Debug, Clone)]
#[command(name = "disciple-server")]
#[command(about = "Tracks connected disciples and serves the admin command protocol")]
pub struct Args {
    /// Port for disciple connections
    #[arg(long, env = "DISCIPLE_PORT")]
    pub port: u16,

    /// Port for admin connections (admin listener disabled when unset)
    #[arg(long, env = "ADMIN_PORT")]
    pub admin_port: Option<u16>,

    /// Interface to bind both listeners on
    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://127.0.0.1:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "disciple")]
    pub mongodb_db: String,

    /// Keep records in process memory instead of MongoDB (lost on restart)
    #[arg(long, env = "MEMORY_STORE", default_value = "false")]
    pub memory_store: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Address of the disciple listener
    pub fn disciple_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Address of the admin listener, if enabled
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_port.map(|port| SocketAddr::new(self.host, port))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("DISCIPLE_PORT must be non-zero".to_string());
        }

        match self.admin_port {
            Some(0) => return Err("ADMIN_PORT must be non-zero".to_string()),
            Some(port) if port == self.port => {
                return Err("ADMIN_PORT must differ from DISCIPLE_PORT".to_string())
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("disciple-server").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--port", "3000"]);
        assert_eq!(args.disciple_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(args.admin_addr(), None);
        assert_eq!(args.mongodb_db, "disciple");
        assert!(!args.memory_store);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_admin_port_must_differ() {
        let args = parse(&["--port", "3000", "--admin-port", "3000"]);
        assert!(args.validate().is_err());

        let args = parse(&["--port", "3000", "--admin-port", "3001", "--host", "127.0.0.1"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.admin_addr().unwrap().to_string(), "127.0.0.1:3001");
    }

    #[test]
    fn test_zero_port_rejected() {
        assert!(parse(&["--port", "0"]).validate().is_err());
        assert!(parse(&["--port", "1", "--admin-port", "0"]).validate().is_err());
    }
}
