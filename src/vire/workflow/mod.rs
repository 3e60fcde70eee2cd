// SPDX-License-Identifier: MIT

pub mod branch;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod invoker;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod voting;
