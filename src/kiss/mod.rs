//! # KISS / AX.25 Module
//!
//! Packet-radio ingestion from a KISS TCP server.
//!
//! This module handles:
//! - Splitting the byte stream on KISS delimiters, across read boundaries
//! - Decoding fixed-layout AX.25 headers (source, destination, info field)
//! - Keeping the TCP connection alive with a fixed reconnect backoff
//! - Publishing the latest decoded frame or connection failure

pub mod protocol;
pub mod assembler;
pub mod decoder;
pub mod listener;
