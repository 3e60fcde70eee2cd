// SPDX-License-Identifier: MIT

pub mod analyst;
pub mod evaluation;
pub mod prompt;
pub mod tools;
pub mod workflow;
