pub mod capture;
pub mod config;
pub mod correlation;
pub mod pipeline;
pub mod script;
pub mod statistics;

use std::sync::Arc;

use anyhow::Result;

use self::{capture::Sniffer, config::Config, pipeline::Pipeline, script::ScriptHook};

/// In order to let an integration test start the sniffer without going
/// through the binary, a function is opened to replace the main function
/// and run the whole pipeline directly.
pub async fn startup(config: Arc<Config>) -> Result<()> {
    let sniffer = Sniffer::open(&config)?;
    let hook = ScriptHook::load(config.script.as_deref())?;
    let pipeline = Pipeline::new(&config, sniffer, hook);

    // The supervisor is spawned right before the consumer starts, which
    // is where the duration clock is defined to begin.
    let done = pipeline::supervise(config.duration)?;

    log::info!("capturing on {}", config.source);
    tokio::task::block_in_place(move || pipeline.run(done))
}
