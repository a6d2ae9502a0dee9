//! Basic example: open a session, log in, and make a few calls.
//!
//! Connection settings come from the environment:
//! `DSDK_HOST`, `DSDK_USERNAME`, `DSDK_PASSWORD`, and optionally
//! `DSDK_PORT`, `DSDK_TENANT` and `DSDK_INSECURE=1` for plain HTTP.
//!
//! Run with: `cargo run --example basic_session`

use dsdk::{Error, Params, Session};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct System {
    name: String,
    #[serde(default)]
    sw_version: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("dsdk=debug,basic_session=info")
        .init();

    let var = |name: &str| env::var(name).unwrap_or_default();

    let mut builder = Session::builder()
        .host(var("DSDK_HOST"))
        .credentials(var("DSDK_USERNAME"), var("DSDK_PASSWORD"))
        .timeout("30s")
        .secure(var("DSDK_INSECURE") != "1");
    if let Ok(port) = env::var("DSDK_PORT") {
        builder = builder.port(port);
    }
    if let Ok(tenant) = env::var("DSDK_TENANT") {
        builder = builder.tenant(tenant);
    }
    let session = builder.build()?;

    println!("=== Login ===");
    session.login().await?;
    println!("Logged in to {} as tenant {}", session.host(), session.tenant());
    println!();

    println!("=== GET Request Example ===");
    let response = session.get("system", &[]).await?;
    let system: System = response.data()?;
    println!("System: {:?}", system);
    println!("Request latency: {:?}", response.latency);
    println!();

    println!("=== POST / DELETE Example ===");
    let created = session
        .post("app_instances", ["name=example-app", "create_mode=normal"])
        .await?;
    println!("Created: {}", created.text());
    session
        .delete("app_instances/example-app", Params::empty())
        .await?;
    println!("Deleted example-app");
    println!();

    println!("=== Accessing Response Metadata ===");
    println!("Raw response length: {} bytes", created.body.len());
    println!("Content-Type: {:?}", created.header("content-type"));
    println!("Re-authenticated: {}", created.was_retried());

    Ok(())
}
