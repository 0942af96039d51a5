//! One module per `conduit` subcommand (§11 CLI surface).

pub mod create_session;
pub mod delete_session;
pub mod doctor;
pub mod list_models;
pub mod run_turn;
pub mod servers;
