#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(clippy::too_many_arguments)]

//! # Roomkeeper
//!
//! A multi-room inventory-allocating game server with an in-room broadcast
//! chat. Clients connect over TCP, submit a named request claiming items and
//! quantities out of a finite, server-wide inventory, and are either admitted
//! to a forming room or rejected. Once a room fills to capacity the server
//! seals it, broadcasts a start signal, and relays chat between members
//! until everyone has disconnected.

/// Admission handshake: read a request, debit the ledger, reserve a room slot.
pub mod admission;

/// Per-room chat fan-out: ingest from members, broadcast to the rest.
pub mod broadcast;

/// CLI argument parsing, inventory file loading, settings validation.
pub mod config;

/// Shared inventory ledger with atomic multi-item debit.
pub mod inventory;

/// TCP accept loop that feeds new connections to the room supervisor.
pub mod listener;

/// Structured logging configuration.
pub mod logging;

/// Wire protocol: fixed-width frames, request/reply codec.
pub mod protocol;

/// Room state machine (Forming/Sealing/Running/Drained).
pub mod room;

/// Top-level server orchestration tying the above together.
pub mod server;

/// Owns the current forming room and opens the next one when it seals.
pub mod supervisor;
