// Keyboard plan composer: W/S queue forward/back, A/D queue 90° turns,
// R/F step size, Enter submit + run, Space emergency stop, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use motion_sequencer_runtime::config::{TOPIC_CMD_PLAN, TOPIC_CMD_STOP};
use motion_sequencer_runtime::messages::{PlanMessage, PlannedStep};
use std::time::Duration;
use tracing::info;

const DISTANCES: [f64; 3] = [0.25, 0.5, 1.0]; // length units per step
const TURN_DEG: f64 = 90.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let plan_pub = session.declare_publisher(TOPIC_CMD_PLAN).await?;
    let stop_pub = session.declare_publisher(TOPIC_CMD_STOP).await?;

    info!("Controls: W/S=forward/back, A/D=turn, R/F=step size, Enter=send, Space=stop, Q=quit");
    print_distance(0);

    enable_raw_mode()?;
    let result = run_composer(&plan_pub, &stop_pub).await;
    disable_raw_mode()?;

    result
}

async fn run_composer(
    plan_pub: &zenoh::pubsub::Publisher<'_>,
    stop_pub: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut distance_idx: usize = 0;
    let mut steps: Vec<PlannedStep> = Vec::new();

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let distance = DISTANCES[distance_idx];
        match code {
            KeyCode::Char('w') => push_step(&mut steps, 0.0, distance),
            KeyCode::Char('s') => push_step(&mut steps, 0.0, -distance),
            KeyCode::Char('a') => push_step(&mut steps, TURN_DEG, 0.0),
            KeyCode::Char('d') => push_step(&mut steps, -TURN_DEG, 0.0),

            KeyCode::Char('r') => {
                distance_idx = (distance_idx + 1).min(DISTANCES.len() - 1);
                print_distance(distance_idx);
            }
            KeyCode::Char('f') => {
                distance_idx = distance_idx.saturating_sub(1);
                print_distance(distance_idx);
            }

            KeyCode::Enter if !steps.is_empty() => {
                let plan = PlanMessage::Request {
                    steps: std::mem::take(&mut steps),
                    run: true,
                };
                info!("Sending plan of {} step(s)", plan.steps().len());
                plan_pub.put(serde_json::to_string(&plan)?).await?;
            }

            KeyCode::Char(' ') => {
                info!("Emergency stop");
                steps.clear();
                stop_pub.put("stop").await?;
            }

            KeyCode::Char('q') | KeyCode::Esc => break,

            _ => {}
        }
    }

    Ok(())
}

fn push_step(steps: &mut Vec<PlannedStep>, angle: f64, distance: f64) {
    steps.push(PlannedStep { angle, distance });
    info!("Step {}: turn {}, go {}", steps.len(), angle, distance);
}

fn print_distance(idx: usize) {
    info!("Step size: {}", DISTANCES[idx]);
}
