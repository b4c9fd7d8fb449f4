//! Session configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::protocol::tables;

/// Port table an override is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortTable {
    Udp,
    Tcp,
}

impl PortTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            PortTable::Udp => tables::UDP_PORT,
            PortTable::Tcp => tables::TCP_PORT,
        }
    }
}

/// Extra port registration for a named decoder, e.g. RADIUS on 3799.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortOverride {
    pub table: PortTable,
    pub port: u16,
    /// Handle name of the decoder to register.
    pub decoder: String,
}

impl fmt::Display for PortOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.table.table_name(), self.port, self.decoder)
    }
}

/// Parses `<TABLE>=<PORT>:<DECODER>`, where the table is `udp`, `tcp`,
/// `udp.port` or `tcp.port`.
impl FromStr for PortOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Config(format!("invalid decode-as '{s}', expected TABLE=PORT:DECODER"));

        let (table, rest) = s.split_once('=').ok_or_else(invalid)?;
        let (port, decoder) = rest.split_once(':').ok_or_else(invalid)?;
        let table = match table.trim() {
            "udp" | "udp.port" => PortTable::Udp,
            "tcp" | "tcp.port" => PortTable::Tcp,
            other => return Err(Error::Config(format!("unknown port table '{other}'"))),
        };
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("invalid port '{port}': {e}")))?;
        let decoder = decoder.trim();
        if decoder.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            table,
            port,
            decoder: decoder.to_string(),
        })
    }
}

/// Configuration for a dissection session, fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Put fragmented payloads back together before decoding them.
    pub reassemble: bool,
    /// Run request/response matching.
    pub correlate_transactions: bool,
    /// Correlation window (microseconds) replacing every protocol's own.
    pub match_window_us: Option<i64>,
    pub port_overrides: Vec<PortOverride>,
    /// Maximum nesting of decoder invocations.
    pub max_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reassemble: true,
            correlate_transactions: true,
            match_window_us: None,
            port_overrides: Vec::new(),
            max_depth: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_override() {
        let o: PortOverride = "udp=3799:radius".parse().unwrap();
        assert_eq!(o.table, PortTable::Udp);
        assert_eq!(o.port, 3799);
        assert_eq!(o.decoder, "radius");
        assert_eq!(o.to_string(), "udp.port=3799:radius");

        let o: PortOverride = "tcp.port=4949:tacplus".parse().unwrap();
        assert_eq!(o.table, PortTable::Tcp);
    }

    #[test]
    fn test_parse_port_override_errors() {
        assert!("udp:3799".parse::<PortOverride>().is_err());
        assert!("sctp=3799:radius".parse::<PortOverride>().is_err());
        assert!("udp=99999:radius".parse::<PortOverride>().is_err());
        assert!("udp=3799:".parse::<PortOverride>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.reassemble);
        assert!(config.correlate_transactions);
        assert_eq!(config.match_window_us, None);
        assert_eq!(config.max_depth, 32);
    }
}
