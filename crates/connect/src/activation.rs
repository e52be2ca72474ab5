//! Out-of-band activation of the wallet daemon.
//!
//! The wallet registers a URL scheme; opening
//! `<scheme>://websocket_connection/<port>` asks it to start listening on
//! that port. Nothing comes back on this path.

use tracing::debug;

/// Errors from launching an activation link.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("failed to open {link}: {source}")]
    Open {
        link: String,
        #[source]
        source: std::io::Error,
    },
}

/// Delivers an activation link to the wallet.
pub trait Activator: Send + Sync {
    fn activate(&self, link: &str) -> Result<(), ActivationError>;
}

/// Hands the link to the desktop's URL handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemActivator;

impl Activator for SystemActivator {
    fn activate(&self, link: &str) -> Result<(), ActivationError> {
        debug!(link, "opening activation link");
        open::that_detached(link).map_err(|source| ActivationError::Open {
            link: link.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_names_link() {
        let err = ActivationError::Open {
            link: "simpleos://websocket_connection/5000".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no handler"),
        };
        assert_eq!(
            err.to_string(),
            "failed to open simpleos://websocket_connection/5000: no handler"
        );
    }
}
