// Copyright 2026 Web Explorer Contributors
// SPDX-License-Identifier: MIT

//! Web Explorer runtime: the browser, model, and command line around the
//! exploration core.
//!
//! The collaborators in [`describer`], [`executor`], and [`navigator`]
//! share one [`context::RunContext`]: a single Chromium tab and a single
//! model client for the whole run.

pub mod cli;
pub mod config;
pub mod context;
pub mod cookies;
pub mod describer;
pub mod dom;
pub mod error;
pub mod executor;
pub mod html;
pub mod model;
pub mod navigator;
pub mod prompts;
pub mod renderer;
pub mod session;
pub mod titles;

pub use context::RunContext;
pub use describer::LlmDescriber;
pub use executor::LlmExecutor;
pub use navigator::BrowserNavigator;
