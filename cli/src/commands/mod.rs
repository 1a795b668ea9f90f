// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CLI command implementations

pub mod config;
pub mod demo;

pub use config::ConfigCommand;
pub use demo::DemoArgs;
