//! # n8nkit
//!
//! Blocking adapter between the `declarative` reconciliation engine and the
//! n8n public REST API.
//!
//! This crate provides:
//! - The resource kinds n8n exposes ([`kinds`])
//! - Request routing for each kind ([`routes`])
//! - [`N8nClient`], an implementation of [`declarative::RemoteOperations`]
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{AttributeRecord, Engine, OperationContext};
//! use n8nkit::{ClientConfig, N8nClient, kinds};
//!
//! let client = N8nClient::new(ClientConfig::new("https://n8n.example.com", "api-key"))
//!     .expect("valid config");
//! let engine = Engine::new(&client);
//!
//! let plan = AttributeRecord::new().with("name", "Infra");
//! let state = engine
//!     .create(&OperationContext::new(), &kinds::PROJECT, &plan)
//!     .expect("project created");
//! println!("{:?}", state.get("id"));
//! ```
//!
//! ## Retry Logic
//!
//! Listing and deleting are retried with exponential backoff on network
//! errors, HTTP 429 and 5xx. Creates and updates are sent exactly once.
//! Configure retry behavior with [`RetryConfig`].

#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod kinds;
pub mod retry;
pub mod routes;
pub mod types;

pub use client::N8nClient;
pub use error::{Error, ErrorCategory, Result};
pub use retry::{LogCallback, RetryCallback, with_retry};
pub use types::{ClientConfig, RetryConfig};
