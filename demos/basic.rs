//! # Example: basic
//!
//! Declares a few effects on a registry, registers it in a scope and drives
//! them through the bus.
//!
//! ## Flow
//! ```text
//! register(scope)
//!   ├─► "greet"      take_every   logs every call
//!   ├─► "search"     take_latest  only the last query finishes
//!   └─► "flaky"      take_every   fails once; supervisor publishes "supervise" and restarts
//! put(actions) ──► bus ──► strategies ──► middleware ──► ctx.result
//! shutdown()   ──► cancel ──► wait for every task (grace)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=effectvisor=debug cargo run --example basic
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use effectvisor::{
    Config, Context, CreateOptions, Middleware, SUPERVISE, Scope, TakeLatest, TaskError, Thunks,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

static FLAKY_CALLS: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Runtime config (short grace so the demo exits quickly)
    let cfg = Config {
        grace: Duration::from_secs(2),
        ..Config::default()
    };

    // 2. Registry with a logging middleware in front of the per-effect routes
    let thunks: Thunks = Thunks::builder().with_config(cfg.clone()).build();
    thunks.use_middleware(Middleware::new(|ctx: &mut Context, next| {
        Box::pin(async move {
            info!(effect = %ctx.name, key = %ctx.key, "dispatch");
            next.run(ctx).await?;
            info!(effect = %ctx.name, result = ?ctx.result, "done");
            Ok(())
        })
    }));
    thunks.use_middleware(thunks.routes());

    // 3. Effects
    let greet = thunks.create(
        "greet",
        Middleware::new(|ctx: &mut Context, next| {
            Box::pin(async move {
                ctx.result = Ok(json!(format!("hello {}", ctx.payload)));
                next.run(ctx).await
            })
        }),
    )?;

    let search = thunks.create(
        "search",
        (
            CreateOptions::supervisor(TakeLatest),
            Middleware::new(|ctx: &mut Context, next| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    ctx.result = Ok(json!({ "query": ctx.payload }));
                    next.run(ctx).await
                })
            }),
        ),
    )?;

    let flaky = thunks.create(
        "flaky",
        Middleware::new(|ctx: &mut Context, next| {
            Box::pin(async move {
                if FLAKY_CALLS.fetch_add(1, Ordering::Relaxed) == 0 {
                    return Err(TaskError::fail("first call always fails"));
                }
                next.run(ctx).await
            })
        }),
    )?;

    // 4. Activate
    let scope = Scope::new(cfg);
    let registration = thunks.register_in(&scope);
    let diagnostics = scope.spawn(|s| async move {
        let mut sub = s.bus().subscribe(SUPERVISE);
        while let Some(action) = sub.next().await {
            info!(error = ?action.payload, meta = ?action.meta, "supervisor restarted an effect");
        }
        Ok(())
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // 5. Drive
    scope.put(vec![greet.call("world"), greet.call(json!({"name": "bus"}))]);
    for q in ["r", "ru", "rus", "rust"] {
        scope.put(search.call(q));
    }
    scope.put(flaky.action());
    tokio::time::sleep(Duration::from_millis(200)).await;
    scope.put(flaky.action());

    let direct = greet.run(&scope, json!("direct")).await?;
    info!(result = ?direct.result, "ran without the bus");

    tokio::time::sleep(Duration::from_millis(100)).await;

    // 6. Stop
    scope.shutdown().await?;
    let _ = registration.await;
    let _ = diagnostics.await;
    Ok(())
}
