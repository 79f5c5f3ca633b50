// Actuation monitor: prints every motor actuation and status update
//
// Usage: cargo run --example actuation_monitor
//
// Run alongside the runtime (without --simulate) to check what a motor
// bridge would receive.

use motion_sequencer_runtime::config::{TOPIC_RT_MOTORS, TOPIC_STATE};
use motion_sequencer_runtime::messages::{MotorAction, MotorActuation, SequencerStatus};
use tokio::time::Instant;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let session = zenoh::open(zenoh::Config::default()).await?;
    let motors = session.declare_subscriber(TOPIC_RT_MOTORS).await?;
    let state = session.declare_subscriber(TOPIC_STATE).await?;
    info!("Listening on {} and {}", TOPIC_RT_MOTORS, TOPIC_STATE);

    let start = Instant::now();
    // Time the last drive began, to show how long each motion lasted
    let mut drive_started: Option<Instant> = None;

    loop {
        tokio::select! {
            sample = motors.recv_async() => {
                let sample = sample?;
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<MotorActuation>(&payload) {
                    Ok(actuation) => {
                        let at = start.elapsed().as_millis();
                        match actuation.action {
                            MotorAction::Drive { rotation, power } => {
                                drive_started.get_or_insert_with(Instant::now);
                                info!("[{:>7}ms] {:>5} {:?} @ {}", at, actuation.channel, rotation, power);
                            }
                            MotorAction::Stop => {
                                let ran = drive_started.take().map(|t| t.elapsed().as_millis());
                                info!("[{:>7}ms] {:>5} stop (ran {:?}ms)", at, actuation.channel, ran);
                            }
                            MotorAction::Brake => info!("[{:>7}ms] {:>5} brake", at, actuation.channel),
                        }
                    }
                    Err(e) => warn!("Unparseable actuation: {}", e),
                }
            }
            sample = state.recv_async() => {
                let sample = sample?;
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<SequencerStatus>(&payload) {
                    Ok(status) => info!(
                        "state={:?} queued={} executed={} error={:?}",
                        status.state, status.queued, status.executed, status.last_error
                    ),
                    Err(e) => warn!("Unparseable status: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
