//! `pvwatch watch`: stream record changes until interrupted.

use std::collections::BTreeSet;
use std::time::Duration;

use pvwatch_api::SimClient;
use pvwatch_core::Engine;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: WatchArgs,
    engine: &Engine<SimClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Taken before subscribing so the CONNECTING/CONNECTED transitions are
    // part of the feed.
    let mut updates = engine.updates();
    let names: BTreeSet<&str> = args.pvs.iter().map(String::as_str).collect();

    for pv in &names {
        engine.subscribe(pv).await?;
    }
    info!(pvs = names.len(), "watching");

    let stop = async {
        match args.duration {
            Some(secs) => tokio::time::sleep_until(Instant::now() + Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            () = &mut stop => break,
            msg = updates.recv() => match msg {
                Ok(record) if names.contains(record.name.as_str()) => {
                    let rendered = output::render_record(global.output, &record)?;
                    output::print_output(&rendered, global.quiet);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind; some changes were not printed");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    for pv in &names {
        engine.unsubscribe(pv);
    }
    Ok(())
}
