//! The `taskvault` library crate.
//!
//! A multi-tenant task-management REST service: users register, authenticate
//! with signed bearer tokens, and perform CRUD operations on tasks they own.
//! This crate holds the domain models, authentication machinery, routing
//! configuration, and error handling; the binary (`main.rs`) wires them into
//! a running server.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
