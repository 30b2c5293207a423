//! # rnetconn - Network Device Connection Fallback
//!
//! `rnetconn` connects an operator to a named network device by trying the
//! device's remote-access protocols in their configured order until one
//! succeeds, then hands the live session to an interactive consumer.
//!
//! ## Features
//!
//! - **Protocol Fallback**: `ssh-modern`, `ssh-legacy` and `telnet`, tried strictly one after another
//! - **Security Postures**: strict host key checking and current algorithms for modern SSH,
//!   unverified hosts and deprecated algorithms for decades-old firmware
//! - **Failure Classification**: every failed attempt is recorded as unreachable, timeout,
//!   authentication failure, protocol error or unsupported
//! - **Inventory**: hostname lookup backed by a JSON file
//! - **Async/Await**: Built on Tokio; each attempt races a per-attempt timeout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rnetconn::inventory::Inventory;
//! use rnetconn::orchestrator::{ConnectionOrchestrator, ConnectionOutcome};
//! use rnetconn::profile::ConnectOptions;
//! use rnetconn::session::{PassThrough, SessionHandoff};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = Inventory::default_path().ok_or("no home directory")?;
//!     let inventory = Inventory::load_or_init(&path)?;
//!
//!     let orchestrator = ConnectionOrchestrator::new();
//!     let outcome = orchestrator
//!         .connect_host(&inventory, "example-router", &ConnectOptions::default())
//!         .await?;
//!
//!     let headline = outcome.dominant_failure();
//!     match outcome {
//!         ConnectionOutcome::Connected { session, protocol, .. } => {
//!             println!("connected using {protocol}");
//!             let terminal = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
//!             PassThrough::new(terminal).take(session).await?;
//!         }
//!         ConnectionOutcome::Exhausted { attempts } => {
//!             for attempt in attempts {
//!                 println!("{}: {:?}", attempt.protocol, attempt.outcome);
//!             }
//!             println!("headline: {headline:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`orchestrator::ConnectionOrchestrator`] - Runs the fallback sequence
//! - [`protocol`] - Protocol tokens and the `ssh` alias expansion
//! - [`session`] - SSH and Telnet handlers, sessions and handoff
//! - [`inventory::Inventory`] - Device inventory
//! - [`error::ConnectError`] - Configuration errors; [`error::ConnectionFailure`] - per-attempt failures
//! - [`config`] - Defaults and SSH algorithm tables

pub mod config;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod profile;
pub mod protocol;
pub mod session;
