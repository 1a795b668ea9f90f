// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Library half of the `ledgerauth` binary, exposed so the command
//! handlers can be driven from integration tests.

pub mod commands;
