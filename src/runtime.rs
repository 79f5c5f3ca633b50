// Zenoh-facing runtime: one owner task holds the sequencer
// Note: plans arriving while a run is in progress are rejected, not queued behind it;
// the stop topic can interrupt a run at any point.

use tracing::{debug, info, warn};
use zenoh::pubsub::Publisher;
use zenoh::sample::Sample;

use crate::config::{
    Args, TOPIC_CMD_PLAN, TOPIC_CMD_RUN, TOPIC_CMD_STOP, TOPIC_RT_MOTORS, TOPIC_STATE,
};
use crate::error::SequencerError;
use crate::messages::{LoopState, PlanMessage, SequencerStatus};
use crate::motor::{Backend, LoggingActuator, ZenohActuator};
use crate::sequencer::Sequencer;
use crate::timer::{StopSignal, TokioTimer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Parse a plan payload; the error text goes out as the status `last_error`
fn decode_plan(payload: &[u8]) -> Result<PlanMessage, String> {
    serde_json::from_slice::<PlanMessage>(payload).map_err(|e| format!("Unparseable plan: {}", e))
}

fn parse_plan(sample: &Sample) -> Result<PlanMessage, String> {
    decode_plan(&sample.payload().to_bytes())
}

async fn publish_status(publisher: &Publisher<'_>, status: &SequencerStatus) -> Result<(), BoxError> {
    let json = serde_json::to_string(status)?;
    publisher.put(json).await?;
    Ok(())
}

pub async fn run(args: Args) -> Result<(), BoxError> {
    let calibration = args.calibration();
    calibration.validate()?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let plan_sub = session.declare_subscriber(TOPIC_CMD_PLAN).await?;
    let run_sub = session.declare_subscriber(TOPIC_CMD_RUN).await?;
    let stop_sub = session.declare_subscriber(TOPIC_CMD_STOP).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE).await?;

    let backend = if args.simulate {
        warn!("Simulation mode: actuation is logged, not published");
        Backend::Simulated(LoggingActuator)
    } else {
        Backend::Zenoh(ZenohActuator::new(
            session.declare_publisher(TOPIC_RT_MOTORS).await?,
        ))
    };

    let mut sequencer = Sequencer::new(backend, TokioTimer, calibration)?
        .with_pause(args.pause())
        .with_reverse_rule(args.reverse_rule());
    sequencer.initialize().await?;

    let stop = StopSignal::new();

    info!(
        "Runtime started: {}ms pause, calibration {:?}",
        args.pause_ms, calibration
    );
    info!(
        "Subscribed to: {}, {}, {}",
        TOPIC_CMD_PLAN, TOPIC_CMD_RUN, TOPIC_CMD_STOP
    );
    info!("Publishing to: {}, {}", TOPIC_RT_MOTORS, TOPIC_STATE);
    publish_status(&pub_status, &sequencer.status(None)).await?;

    loop {
        // 1. Wait idle for a plan, a trigger, a stop or Ctrl-C
        let start_run = tokio::select! {
            sample = plan_sub.recv_async() => {
                let sample = sample?;
                match parse_plan(&sample) {
                    Ok(plan) => match sequencer.set_queue(plan.steps()) {
                        Ok(_) => {
                            publish_status(&pub_status, &sequencer.status(None)).await?;
                            plan.run()
                        }
                        Err(e) => {
                            warn!("Plan rejected: {}", e);
                            publish_status(&pub_status, &sequencer.status(Some(e.to_string()))).await?;
                            false
                        }
                    },
                    Err(e) => {
                        warn!("{}", e);
                        publish_status(&pub_status, &sequencer.status(Some(e))).await?;
                        false
                    }
                }
            }
            sample = run_sub.recv_async() => {
                sample?;
                true
            }
            sample = stop_sub.recv_async() => {
                sample?;
                info!("Stop requested while idle");
                let remaining = sequencer.emergency_stop().await;
                let cancelled = SequencerError::Cancelled { remaining };
                publish_status(&pub_status, &sequencer.status(Some(cancelled.to_string()))).await?;
                false
            }
            _ = tokio::signal::ctrl_c() => break,
        };

        if !start_run {
            continue;
        }
        if sequencer.is_empty() {
            debug!("Run requested on empty queue");
            continue;
        }

        // 2. Drain the queue; meanwhile only stop requests have any effect
        let mut last_error = None;
        let mut shutdown = false;
        {
            let mut busy = sequencer.status(None);
            busy.state = LoopState::Running;
            publish_status(&pub_status, &busy).await?;

            let run = sequencer.run_queue(&stop);
            tokio::pin!(run);
            let outcome = loop {
                tokio::select! {
                    outcome = &mut run => break outcome,
                    sample = plan_sub.recv_async() => {
                        sample?;
                        warn!("{}", SequencerError::Busy);
                        let mut rejected = busy.clone();
                        rejected.last_error = Some(SequencerError::Busy.to_string());
                        publish_status(&pub_status, &rejected).await?;
                    }
                    sample = run_sub.recv_async() => {
                        sample?;
                        debug!("Run requested while running, ignored");
                    }
                    sample = stop_sub.recv_async() => {
                        sample?;
                        warn!("Emergency stop requested");
                        stop.trigger();
                    }
                    _ = tokio::signal::ctrl_c() => {
                        stop.trigger();
                        shutdown = true;
                    }
                }
            };

            if let Err(e) = outcome {
                last_error = Some(e.to_string());
            }
        }
        stop.reset();
        publish_status(&pub_status, &sequencer.status(last_error)).await?;

        if shutdown {
            break;
        }
    }

    info!("Shutting down, stopping motors");
    if let Err(e) = sequencer.halt().await {
        warn!("Failed to stop motors on shutdown: {}", e);
    }
    publish_status(&pub_status, &sequencer.status(None)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plan_accepts_both_forms() {
        let plan = decode_plan(br#"[{"angle": 90, "distance": 0}]"#).unwrap();
        assert_eq!(plan.steps().len(), 1);
        assert!(!plan.run());

        let plan = decode_plan(br#"{"steps": [{"angle": 0, "distance": 1}], "run": true}"#).unwrap();
        assert!(plan.run());
    }

    #[test]
    fn test_decode_plan_error_is_reportable() {
        let error = decode_plan(b"turn left please").unwrap_err();
        assert!(error.starts_with("Unparseable plan: "), "{}", error);

        // Ends up in the published status as last_error
        let status = SequencerStatus {
            last_error: Some(error.clone()),
            ..SequencerStatus::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["last_error"], error);
    }
}
