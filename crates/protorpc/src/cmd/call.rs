use std::time::Instant;

use protorpc::arith;
use protorpc_frame::FrameConfig;
use protorpc_peer::{Client, ClientConfig, RpcError};
use serde_json::json;
use tracing::debug;

use crate::cmd::{parse_timeout, CallArgs};
use crate::exit::{rpc_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_call, CallOutput, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let config = ClientConfig {
        frame: FrameConfig {
            write_timeout: Some(timeout),
            ..FrameConfig::default()
        },
        call_timeout: Some(timeout),
    };
    let client = Client::connect_with_config(&args.endpoint, config)
        .map_err(|err| rpc_error("connect failed", err))?;

    let request = arith::Args {
        a: args.a,
        b: args.b,
    };
    let started = Instant::now();
    let outcome = match args.method.as_str() {
        arith::DIVIDE => client
            .call::<_, arith::Quotient>(&args.method, &request)
            .map(|q| json!({ "quo": q.quo, "rem": q.rem })),
        // Anything else is sent as-is; the server decides whether it exists.
        _ => client
            .call::<_, arith::Reply>(&args.method, &request)
            .map(|r| json!({ "val": r.val })),
    };
    let elapsed_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    debug!(method = %args.method, elapsed_ms, "call finished");

    let mut out = CallOutput {
        method: args.method.clone(),
        endpoint: args.endpoint.to_string(),
        elapsed_ms,
        result: None,
        error: None,
    };

    let code = match outcome {
        Ok(result) => {
            out.result = Some(result);
            SUCCESS
        }
        Err(RpcError::Remote(message)) => {
            out.error = Some(message);
            FAILURE
        }
        Err(err) => return Err(rpc_error("call failed", err)),
    };

    print_call(&out, format);
    Ok(code)
}
