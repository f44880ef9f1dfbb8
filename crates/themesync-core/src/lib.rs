//! themesync Core - Domain types and ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `AssetKey`, `ThemeId`, `Checksum`, `AssetParam`, `AssetResult`
//! - **Port definitions** - Traits for adapters: `IThemeStore`, `ILocalFileIndex`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains plain value types with validation.
//! Ports define trait interfaces that adapter crates implement.
//! The synchronization engine in `themesync-sync` drives the ports.

pub mod config;
pub mod domain;
pub mod ports;
