//! Session server address parsing.

use sessiond_core::SessionError;

/// Port assumed when the configured address is a bare host.
pub const DEFAULT_PORT: u16 = 80;

/// Parse a `host:port` or bare `host` address.
///
/// A bare host defaults to port 80. The port must be numeric and in range;
/// anything else fails fast so a bad configuration is caught at startup.
///
/// # Errors
/// Returns `InvalidAddress` for an empty host or a non-numeric port.
pub fn parse_address(input: &str) -> Result<(String, u16), SessionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SessionError::InvalidAddress("empty address".to_string()));
    }

    match input.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(SessionError::InvalidAddress(format!(
                    "missing host in {input:?}"
                )));
            }
            let port = port.parse::<u16>().map_err(|_| {
                SessionError::InvalidAddress(format!("invalid port in {input:?}"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((input.to_string(), DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_port() {
        assert_eq!(parse_address("host:8080").unwrap(), ("host".to_string(), 8080));
    }

    #[test]
    fn bare_host_defaults_to_port_80() {
        assert_eq!(parse_address("host").unwrap(), ("host".to_string(), 80));
    }

    #[test]
    fn non_numeric_port_is_invalid() {
        let err = parse_address("host:notaport").unwrap_err();
        assert!(matches!(err, SessionError::InvalidAddress(_)));
    }

    #[test]
    fn out_of_range_port_is_invalid() {
        assert!(parse_address("host:70000").is_err());
        assert!(parse_address("host:-1").is_err());
    }

    #[test]
    fn empty_pieces_are_invalid() {
        assert!(parse_address("").is_err());
        assert!(parse_address("  ").is_err());
        assert!(parse_address(":8080").is_err());
        assert!(parse_address("host:").is_err());
    }
}
