use std::{sync::atomic::Ordering, time::Duration};

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{bounded, never, select, tick, Receiver as BlockReceiver};
use iq_slurper::{
    exfil::{ChannelSink, FileSink, SampleBlock},
    monitoring::StatsSnapshot,
    Receiver,
};
use tracing::{info, warn};

mod args;

/// Running power average over the blocks seen since the last report
#[derive(Default)]
struct PowerMeter {
    sum: f64,
    samples: u64,
}

impl PowerMeter {
    fn push(&mut self, block: &SampleBlock) {
        self.sum += block
            .samples
            .iter()
            .map(|s| s.norm_sqr() as f64)
            .sum::<f64>();
        self.samples += block.samples.len() as u64;
    }

    /// Mean power in dBFS, resetting the meter
    fn take_dbfs(&mut self) -> Option<f64> {
        let meter = std::mem::take(self);
        (meter.samples > 0).then(|| 10.0 * (meter.sum / meter.samples as f64).log10())
    }
}

fn report(now: &StatsSnapshot, last: &StatsSnapshot, secs: u64, power: Option<f64>) {
    let delta = now.since(last);
    info!(
        datagrams = now.datagrams,
        samples = now.samples,
        rate = delta.samples / secs,
        timeouts = now.timeouts,
        recv_errors = now.recv_errors,
        dropped_bytes = now.dropped_bytes,
        truncated = now.truncated,
        consumer_panics = now.consumer_panics,
        power_dbfs = %power.map(|p| format!("{:.1}", p)).unwrap_or_default(),
        "Stats"
    );
}

fn main() -> anyhow::Result<()> {
    let args = args::Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args::convert_filter(args.verbose.log_level_filter()))
        .init();

    let transport = args.transport();
    info!(remote = %transport.remote, "Starting I/Q receiver");

    // Either stream to disk or hand blocks to this thread for monitoring
    let (mut receiver, blocks, dropped) = match &args.output {
        Some(dir) => {
            let (sink, path) = FileSink::create_in(dir)
                .with_context(|| format!("creating capture in {}", dir.display()))?;
            info!("Writing capture to {}", path.display());
            (Receiver::new(transport, sink), never(), None)
        }
        None => {
            let (sink, blocks): (ChannelSink, BlockReceiver<SampleBlock>) =
                ChannelSink::new(args.queue);
            let dropped = sink.dropped();
            (Receiver::new(transport, sink), blocks, Some(dropped))
        }
    };

    let (stop_tx, stop_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    receiver.start()?;
    let stats = receiver.stats();
    let ticker = tick(Duration::from_secs(args.stats_secs));
    let mut last = stats.snapshot();
    let mut meter = PowerMeter::default();

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(blocks) -> block => match block {
                Ok(block) => meter.push(&block),
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                let now = stats.snapshot();
                report(&now, &last, args.stats_secs, meter.take_dbfs());
                if now.datagrams == last.datagrams {
                    warn!(
                        "No datagrams from {} in the last {}s",
                        receiver.transport().remote,
                        args.stats_secs
                    );
                }
                last = now;
            },
        }
    }

    info!("Shutting down");
    receiver.stop()?;
    let now = stats.snapshot();
    report(&now, &last, args.stats_secs, meter.take_dbfs());
    if let Some(dropped) = dropped {
        info!(
            "{} blocks dropped by the monitor queue",
            dropped.load(Ordering::Relaxed)
        );
    }
    Ok(())
}
