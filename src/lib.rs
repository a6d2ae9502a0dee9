//! # dsdk - session core for a storage-management REST API
//!
//! `dsdk` turns verb calls against versioned endpoints into authenticated
//! HTTP exchanges. A [`Session`] logs in lazily, caches the session token,
//! re-authenticates once per call when the server reports the token as
//! invalidated, and hands back raw response bodies together with typed errors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dsdk::{Params, Session};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct AppInstance {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dsdk::Error> {
//!     let session = Session::builder()
//!         .host("10.0.0.5")
//!         .credentials("admin", "password")
//!         .tenant("/root")
//!         .timeout("30s")
//!         .build()?;
//!
//!     // Flat key=value parameters
//!     let created = session
//!         .post("app_instances", ["name=my-app", "create_mode=normal"])
//!         .await?;
//!     let app: AppInstance = created.data()?;
//!     println!("Created {}", app.name);
//!
//!     // Nested bodies go through a JSON object
//!     session
//!         .put("app_instances/my-app", false, json!({"storage_instances": [{"name": "si-1"}]}))
//!         .await?;
//!
//!     // Query parameters
//!     let listed = session.get("app_instances", &["limit=10", "offset=0"]).await?;
//!     println!("{}", listed.text());
//!
//!     session.delete("app_instances/my-app", Params::empty()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Errors that come from a response keep its raw body:
//!
//! ```no_run
//! use dsdk::{Error, Session};
//!
//! # async fn example(session: Session) {
//! match session.get("system", &[]).await {
//!     Ok(response) => println!("{}", response.text()),
//!     Err(Error::Api { status, detail: Some(detail), .. }) => {
//!         eprintln!("{} {}: {}", status, detail.name, detail.message);
//!     }
//!     Err(Error::Auth { message, .. }) => eprintln!("Login failed: {}", message),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```

pub mod classify;
pub mod config;
mod error;
pub mod logging;
pub mod metadata;
mod params;
pub mod response;
mod session;
pub mod template;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use metadata::{RequestMetadata, Verb};
pub use params::Params;
pub use response::{Envelope, ErrorResponse, LoginResult, Response};
pub use session::{ApiConnection, Session, SessionBuilder, LOGIN_ENDPOINT};
