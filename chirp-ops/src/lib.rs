// Library exports for chirp-ops
// Each binary under src/bin is a thin CLI over one of these modules

pub mod assertions;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod env;
pub mod logging;
pub mod probes;
pub mod readiness;
pub mod report;
pub mod seeder;
pub mod store;
