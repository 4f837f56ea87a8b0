/*
 *  main.rs
 *
 *  ambidash - always-on glance board
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use anyhow::Context;
use chrono::Local;
use env_logger::Env;
use log::{info, warn};
use std::io::Write;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use ambidash::config;
use ambidash::pacer::Pacer;
use ambidash::readout;
use ambidash::{epoch_secs, RefreshOrchestrator};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP.
#[cfg(unix)]
async fn signal_handler() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

/// Offer refreshes every frame; repaint the readout once per clock second.
async fn display_loop(orchestrator: &RefreshOrchestrator, fps: u32) -> anyhow::Result<()> {
    let mut pacer = Pacer::new(fps);
    let snapshot = orchestrator.snapshot();
    let mut last_second = String::new();
    let mut out = std::io::stdout();

    loop {
        if pacer.should_tick() {
            orchestrator.tick(epoch_secs());

            let now = Local::now();
            let (hms, _) = readout::clock_face(&now);
            if hms != last_second {
                let lines = readout::render(&snapshot, &now);
                writeln!(out, "{}", lines.join("  |  "))?;
                out.flush()?;
                last_second = hms;
            }
        }
        tokio::time::sleep(pacer.until_next()).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("{} - always at a glance", env!("CARGO_PKG_NAME"));
    info!("v.{} built {} ({})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    let orchestrator = RefreshOrchestrator::from_config(&cfg)
        .context("building data sources")?;
    if orchestrator.is_empty() {
        warn!("no data sources configured, showing the clock only");
    } else {
        info!("{} data sources configured", orchestrator.len());
    }

    tokio::select! {
        res = signal_handler() => res?,
        res = display_loop(&orchestrator, cfg.fps()) => res?,
    }

    orchestrator.shutdown().await;
    info!("bye");
    Ok(())
}
