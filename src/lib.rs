//! # Grounded Chat
//!
//! A retrieval-augmented chat endpoint. Each request embeds the user's
//! message, finds similar chunks in a managed vector store, and asks a
//! hosted chat model to answer with those chunks as context.
//!
//! ## Architecture
//!
//! ```text
//!  POST /api/chat
//!        │
//!        ▼
//! ┌────────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//! │  validate  │──▶│   embed   │──▶│ retrieve  │──▶│ assemble  │
//! └────────────┘   │ (OpenAI)  │   │(Supabase) │   │  context  │
//!                  └───────────┘   └───────────┘   └─────┬─────┘
//!                                                        ▼
//!                                  { reply } ◀──  ┌───────────┐
//!                                                 │ generate  │
//!                                                 │ (OpenAI)  │
//!                                                 └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Request, reply, and retrieved-chunk types |
//! | [`error`] | Upstream and pipeline error types |
//! | [`retry`] | Bounded exponential backoff for outbound calls |
//! | [`embedding`] | Embedder trait and OpenAI client |
//! | [`retrieval`] | Retriever trait and Supabase RPC client |
//! | [`context`] | Context assembly and truncation |
//! | [`generation`] | Generator trait and OpenAI chat client |
//! | [`pipeline`] | The request pipeline |
//! | [`server`] | HTTP server |

pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod retry;
pub mod server;
