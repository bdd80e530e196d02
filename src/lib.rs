//! Single-page chat application backed by SQLite and a language-model responder.

// Strict rustc hygiene
#![deny(warnings)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(dead_code)]
#![deny(non_camel_case_types)]
#![deny(unused_imports)]
#![deny(unused_variables)]
#![deny(unused_must_use)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
// Clippy
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![deny(overflowing_literals)]

/// Identifiers, sender tags, errors and configuration.
pub mod domain;
/// Conversation contexts, prompt rendering and responders.
pub mod llm;
/// HTTP surface for the single page.
#[allow(clippy::unused_async)]
pub mod server;
/// Session state machine and its rendered view.
pub mod session;
/// Startup for the server binary.
pub mod start_chatdesk;
/// Conversation and message persistence.
pub mod storage;
