//! Client library and register-polled RPC server for the YERC high-speed
//! Ethernet robot protocol.
//!
//! The controller exposes numbered variable registers and a binary
//! request/response protocol over UDP: robot commands on one port, file
//! transfers on another. <Client> issues typed commands; <RpcServer> turns a
//! block of byte registers into callable services that the controller
//! requests by writing `1` into the matching register.
pub mod client;
pub mod commands;
pub mod constants;
pub mod error;
pub mod frame;
pub mod position;
pub mod rpc_server;
pub mod status;

// Convenience exports
pub use client::{ Client, ClientConfig };
pub use commands::{ AnyCommand, AnyResponse, Command };
pub use error::{ Error, ErrorKind, Result };
pub use position::Position;
pub use rpc_server::RpcServer;
pub use status::Status;
