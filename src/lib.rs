//! # Nodesea Core Library
//!
//! This crate contains the runtime-acquisition engine behind the `nodesea`
//! tool: given a version specifier and a target platform it resolves a
//! concrete Node.js release, downloads the archive, verifies it against the
//! published `SHASUMS256.txt`, caches it, and extracts a ready-to-run `node`
//! binary for single-executable-application packaging.
//!
//! The engine tolerates partial downloads, checksum mismatches and transient
//! network failures via a bounded retry loop, and handles local `file://`
//! tarballs without touching the network.
//!
//! ## Modules Overview
//! - [`resolver`] – Classifying specifiers and resolving them to releases
//! - [`cache`] – Deterministic on-disk addressing of archives and binaries
//! - [`verify`] – Concurrent checksum verification against the manifest
//! - [`fetch`] – The streaming download/extract pipeline
//! - [`acquire`] – The engine entry point and retry controller
//! - [`config`] – The caller-facing `sea/config.json` boundary
//! - [`steps`] – Human-readable stage narration
//! - [`error`] – The engine's error kinds and retry classification

pub mod acquire;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod steps;
pub mod verify;

pub use acquire::*;
pub use cache::*;
pub use config::*;
pub use error::*;
pub use fetch::*;
pub use resolver::*;
pub use steps::*;
pub use verify::*;
