//! Ollama inference client
//!
//! Implements [`locallab_core::InferenceClient`] against a local Ollama
//! server. Each call is a single non-streaming `/api/generate` request; the
//! timing counters Ollama reports are converted into the run metrics stored
//! with every experiment run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use locallab_core::{GenerationRequest, InferenceClient};
//! use locallab_ollama::{OllamaClient, OllamaConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OllamaConfig::new("http://localhost:11434")
//!         .with_timeout(Duration::from_secs(120));
//!     let client = OllamaClient::new(config)?;
//!
//!     let response = client
//!         .generate(GenerationRequest::new("llama3", "Why is the sky blue?"))
//!         .await?;
//!     println!("{} ({} ms)", response.text, response.duration_ms);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::OllamaClient;
pub use config::{OllamaConfig, OllamaConfigBuilder};
pub use error::{OllamaError, OllamaResult};
pub use types::{GenerateOptions, GenerateRequest, GenerateResponse, ModelInfo, TagsResponse};
