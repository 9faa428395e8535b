//! GCP API interaction module
//!
//! This module provides the core functionality for talking to Google
//! Cloud Platform APIs during an audit run.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client and per-service URL builders
//! - [`http`] - HTTP utilities for REST API calls
//! - [`projects`] - Project discovery and service-enablement lookup

pub mod auth;
pub mod client;
pub mod http;
pub mod projects;
