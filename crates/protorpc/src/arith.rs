//! The `Arith` demo service.
//!
//! `Arith.Multiply` returns `a * b`. `Arith.Divide` returns quotient and
//! remainder, or fails with `"divide by zero"`.

use protorpc_peer::{Result, Server};

pub const MULTIPLY: &str = "Arith.Multiply";
pub const DIVIDE: &str = "Arith.Divide";

#[derive(Clone, PartialEq, prost::Message)]
pub struct Args {
    #[prost(int32, tag = "1")]
    pub a: i32,
    #[prost(int32, tag = "2")]
    pub b: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Reply {
    #[prost(int32, tag = "1")]
    pub val: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Quotient {
    #[prost(int32, tag = "1")]
    pub quo: i32,
    #[prost(int32, tag = "2")]
    pub rem: i32,
}

pub fn multiply(args: Args) -> std::result::Result<Reply, String> {
    args.a
        .checked_mul(args.b)
        .map(|val| Reply { val })
        .ok_or_else(|| "integer overflow".to_string())
}

pub fn divide(args: Args) -> std::result::Result<Quotient, String> {
    if args.b == 0 {
        return Err("divide by zero".to_string());
    }
    match (args.a.checked_div(args.b), args.a.checked_rem(args.b)) {
        (Some(quo), Some(rem)) => Ok(Quotient { quo, rem }),
        _ => Err("integer overflow".to_string()),
    }
}

/// Register the `Arith` methods on `server`.
pub fn register(server: &Server) -> Result<()> {
    server.register(MULTIPLY, multiply)?;
    server.register(DIVIDE, divide)?;
    Ok(())
}
