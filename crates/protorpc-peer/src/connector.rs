use protorpc_transport::{Endpoint, RpcListener};

use crate::client::{Client, ClientConfig};
use crate::error::Result;

/// Connect to an RPC server.
///
/// `network` is one of `tcp`, `tcp4`, `tcp6` or `unix`.
pub fn dial(network: &str, address: &str) -> Result<Client> {
    dial_with_config(network, address, ClientConfig::default())
}

/// Connect with explicit configuration.
pub fn dial_with_config(network: &str, address: &str, config: ClientConfig) -> Result<Client> {
    let endpoint = Endpoint::new(network, address)?;
    Client::connect_with_config(&endpoint, config)
}

/// Bind a listener for [`crate::Server::accept`].
pub fn listen(network: &str, address: &str) -> Result<RpcListener> {
    let endpoint = Endpoint::new(network, address)?;
    Ok(RpcListener::bind(&endpoint)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;

    #[test]
    fn unknown_network_rejected() {
        let err = dial("udp", "127.0.0.1:1").unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let listener = listen("tcp", "127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = dial("tcp", &addr.to_string()).unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
