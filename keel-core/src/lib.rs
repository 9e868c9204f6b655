//! Keel Core
//!
//! Domain types for the Keel CI control plane.
//!
//! This crate contains the entities the storage engine persists
//! (Build, Pipeline, Secret, Service). Persistence logic lives in
//! `keel-store`.

pub mod domain;
