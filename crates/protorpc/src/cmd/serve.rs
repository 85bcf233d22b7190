use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use protorpc::arith;
use protorpc_peer::{Server, ServerConfig};
use protorpc_transport::{Endpoint, RpcListener};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{rpc_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_listening, ListeningOutput, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = ServerConfig::default();
    if let Some(max) = args.max_payload {
        config.frame.max_payload_size = max;
    }
    let server = Server::with_config(config);
    arith::register(&server).map_err(|err| rpc_error("register failed", err))?;
    let server = Arc::new(server);

    let listener =
        RpcListener::bind(&args.endpoint).map_err(|err| transport_error("bind failed", err))?;
    let endpoint = listener.endpoint().unwrap_or_else(|| args.endpoint.clone());

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), endpoint.clone())?;

    print_listening(
        &ListeningOutput {
            event: "listening",
            endpoint: endpoint.to_string(),
            methods: server.methods(),
        },
        format,
    );

    server.accept_while(&listener, &running);

    info!(%endpoint, "shutting down");
    Ok(SUCCESS)
}

/// Stop accepting on Ctrl-C. The handler dials the listener once so the
/// blocked `accept` returns and sees the cleared flag.
fn install_ctrlc_handler(running: Arc<AtomicBool>, endpoint: Endpoint) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = protorpc_transport::connect(&endpoint);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
