//! QR Archive Service
//!
//! A small web service that turns submitted text into QR-code images. Each
//! submission is encoded to a monochrome PNG, uploaded to an S3-compatible
//! object store under a timestamped key, and recorded in MongoDB; a history
//! page lists previously generated codes, newest first.
//!
//! ## Features
//!
//! - **Deterministic Encoding**: level-L QR symbols rendered to PNG, same
//!   input always yields the same image
//! - **Keyed Object Storage**: `qr_codes/{timestamp}_{suffix}.png` keys,
//!   distinct even within the same second
//! - **Append-Only History**: MongoDB records sorted by creation time, with
//!   a connectivity probe that degrades the page instead of failing it
//! - **Image Proxy**: stored images stream back through the service, so the
//!   bucket never needs a public ACL (a public base URL is optional)
//!
//! ## Architecture
//!
//! ```text
//! Browser                   Service                    Backends
//! ┌──────────────┐         ┌──────────────┐          ┌──────────────┐
//! │ POST /generar│────────▶│ QR Encoder   │          │ S3 Bucket    │
//! └──────────────┘         └──────┬───────┘          │   qr_codes/  │
//!                                 │                  └──────▲───────┘
//!                                 ▼                         │
//!                          ┌──────────────┐                 │
//!                          │ Object Store │─────────────────┘
//!                          │ Client       │
//!                          └──────┬───────┘          ┌──────────────┐
//!                                 ▼                  │ MongoDB      │
//!                          ┌──────────────┐          │   qr_codes   │
//!                          │ Metadata     │─────────▶└──────────────┘
//!                          │ Store        │
//!                          └──────┬───────┘
//! ┌──────────────┐                ▼
//! │ GET /        │◀────── history page (minijinja)
//! │ GET /get_qr/*│◀────── image proxy
//! └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http_api;
pub mod metadata_store;
pub mod object_store;
pub mod qr;

pub use config::Config;
pub use error::AppError;
pub use http_api::AppState;
pub use metadata_store::{MetadataStore, QrRecord};
pub use object_store::ObjectStore;
