use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::config::Config;
use crate::client::consts::WS_PATH;
use crate::error::SessionError;
use crate::identity::SessionIdentity;

/// Socket base for this client: the configured override, or the page origin
/// with its scheme switched to the WebSocket equivalent.
pub fn endpoint_base(config: &Config) -> Result<String, SessionError> {
    if let Some(ws_url) = config.ws_url() {
        return Ok(ws_url.trim_end_matches('/').to_string());
    }
    let origin = config.origin().trim_end_matches('/');
    let (scheme, authority) = origin
        .split_once("://")
        .ok_or_else(|| SessionError::InvalidEndpoint(format!("origin has no scheme: {}", origin)))?;
    let ws_scheme = match scheme {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(SessionError::InvalidEndpoint(format!(
                "unsupported origin scheme: {}",
                other
            )))
        }
    };
    if authority.is_empty() {
        return Err(SessionError::InvalidEndpoint(format!("origin has no host: {}", origin)));
    }
    Ok(format!("{}://{}{}", ws_scheme, authority, WS_PATH))
}

pub fn endpoint(config: &Config, identity: &SessionIdentity) -> Result<String, SessionError> {
    Ok(format!("{}/{}", endpoint_base(config)?, identity))
}

pub fn build_request(config: &Config, identity: &SessionIdentity) -> Result<Request, SessionError> {
    endpoint(config, identity)?
        .into_client_request()
        .map_err(|e| SessionError::InvalidEndpoint(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_origin_upgrades_to_wss() {
        let config = Config::builder().with_origin("https://coach.example").build();
        assert_eq!(endpoint_base(&config).unwrap(), "wss://coach.example/ws");

        let config = Config::builder().with_origin("http://localhost:5173/").build();
        assert_eq!(endpoint_base(&config).unwrap(), "ws://localhost:5173/ws");
    }

    #[test]
    fn test_override_wins() {
        let config = Config::builder()
            .with_origin("https://coach.example")
            .with_ws_url("ws://127.0.0.1:8000/ws/")
            .build();
        assert_eq!(endpoint_base(&config).unwrap(), "ws://127.0.0.1:8000/ws");
    }

    #[test]
    fn test_endpoint_ends_with_identity() {
        let identity = SessionIdentity::generate();
        let config = Config::new();
        let url = endpoint(&config, &identity).unwrap();
        assert_eq!(url, format!("ws://localhost:8000/ws/{}", identity));

        let request = build_request(&config, &identity).unwrap();
        assert_eq!(request.uri().path(), format!("/ws/{}", identity));
    }

    #[test]
    fn test_bad_origins() {
        for origin in ["localhost:8000", "ftp://files.example", "https://"] {
            let config = Config::builder().with_origin(origin).build();
            assert!(
                matches!(endpoint_base(&config), Err(SessionError::InvalidEndpoint(_))),
                "{} should be rejected",
                origin
            );
        }
    }
}
