#![doc = "The `pomodoroplus` library crate."]
#![doc = ""]
#![doc = "Domain models, bearer-token authentication, routing configuration and error"]
#![doc = "handling for the PomodoroPlus API. The binary (`main.rs`) builds the"]
#![doc = "`actix-web` application from these pieces."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;

pub use crate::auth::Authenticator;
pub use crate::config::Config;
pub use crate::error::AppError;
