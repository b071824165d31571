#![doc = "waver-core: core logic library for waver."]

//! This crate holds everything needed to turn a source repository into a
//! generated tutorial stored in an object-store bucket: provider resolution,
//! the staged generation pipeline and the bulk uploader that persists its
//! output.
//!
//! # Usage
//! Build a [`process::GenerationService`] from [`config::WaverSettings`] and an
//! [`contract::ObjectStore`] and call [`process::GenerationService::generate`]
//! with a repository location.

pub mod config;
pub mod contract;
pub mod path_util;
pub mod pipeline;
pub mod process;
pub mod provider;
pub mod store;
pub mod tutorial;
pub mod upload;
