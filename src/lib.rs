//! **imgui-explicit** - Whole-repository rewriter that threads an explicit
//! `ImGuiContext*` through the Dear ImGui API.
//!
//! libclang-driven discovery and call-graph analysis feed a closure
//! solver; the resulting plan becomes byte-exact per-line edits plus an
//! auto-generated implicit-context compatibility layer.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core conversion pipeline - analysis, planning, and emission
pub mod core {
    /// Normalized function/parameter/call-site records and identities
    pub mod model;

    /// Failure taxonomy and exit-code mapping
    pub mod error;

    /// Line-faithful source storage with typed per-line edit merging
    pub mod ledger;

    /// Lexical recovery of extents the parser reports zero-width
    pub mod locator;

    /// Declaration/definition/call indexes and the closure solver
    pub mod database;

    /// Discovery pass over the parsed unit
    pub mod discovery;

    /// Call-graph pass with special-template and log-macro handling
    pub mod callgraph;

    /// Turns closure results into typed ledger edits
    pub mod planner;

    /// Implicit-context compatibility layer generator
    pub mod compat;

    /// Deterministic flush: namespace rewrite, diffs, atomic writes
    pub mod emitter;

    /// Orchestration of the convert subcommand
    pub mod convert;

    /// Generated-commit plumbing: commit, rebase, todo rewriting
    pub mod git;

    pub use convert::run as convert_run;
    pub use git::{rebase_run, rtransform_run};
}

/// Language processing - the libclang frontend and the owned unit model
pub mod parsers {
    /// libclang frontend with the scoped macro shim
    pub mod cpp_parser;

    /// Arena translation-unit model and explicit visitor
    pub mod tu;
}

/// Infrastructure - configuration, repository layout, shared I/O
pub mod infra {
    /// Rewrite exemption sets, imex.toml loading, repository layout
    pub mod config;

    /// Path normalization and atomic writes
    pub mod io;

    pub use config::{Config, RepoLayout, load_config};
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{convert_run, rebase_run, rtransform_run};
pub use infra::{Config, RepoLayout, load_config};
