//! Terminal chat playground for the Amazon Bedrock Converse API.
//!
//! The conversation lives in memory; credentials and preferences persist
//! in a local settings file. The remote side is either the Bedrock
//! runtime or a reverse proxy speaking the same Converse contract.

pub mod app;
pub mod bedrock;
pub mod commands;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod sign;
pub mod ui;
