//! HTTP transport for the gateway's tool-call RPC.

pub mod http_gateway_client;

pub use http_gateway_client::{ClientOptions, HttpGatewayClient, HttpInvokerFactory};
