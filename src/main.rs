mod app;
mod core;

use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::shutdown::build_shutdown_pipeline;
use crate::app::lifecycle::startup::build_start_pipeline;
use actix_web::rt::signal;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[actix_web::main]
async fn main() {
    let startup_pipeline = build_start_pipeline();
    let startup_ctx = StartupContext::new("hbx.yaml".into());

    match startup_pipeline.run(&startup_ctx).await {
        Ok(_) => println!("Startup successful"),
        Err(e) => panic!("Startup failed: {:?}", e),
    }

    let shutdown_pipeline = build_shutdown_pipeline();

    signal::ctrl_c().await.expect("Failed to listen for sigint");

    match shutdown_pipeline.run(&startup_ctx).await {
        Ok(_) => println!("Shutdown successful"),
        Err(e) => panic!("Clean shutdown failed {:?}", e),
    }
}
