// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod document_poller;
pub mod auth_request;
pub mod enduser_responder;

pub use auth_request::{AuthRequest, AuthServices};
pub use enduser_responder::EnduserResponder;
