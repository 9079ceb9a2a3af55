//! genwave-watch - follow generation events for one user.
//!
//! Connects to the relay, logs every event and status change, and keeps a
//! per-job summary until interrupted.

use genwave_client::{ClientHandle, Config, JobTracker, Message};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genwave_client=info,genwave_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        endpoint = %config.ws_url,
        auto_reconnect = config.auto_reconnect,
        "Starting genwave-watch"
    );

    let mut tracker = JobTracker::new();
    let mut client = ClientHandle::spawn(
        config.client_options(),
        move |message: Message| {
            log_message(&message);
            track(&mut tracker, &message);
        },
        |status| tracing::info!(%status, "Connection status changed"),
    )?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted, closing");
    client.close().await;

    Ok(())
}

/// Fold one event into the job summary. Finished jobs are logged once and
/// then forgotten, so the tracker only holds live work.
fn track(tracker: &mut JobTracker, message: &Message) {
    if !tracker.apply(message) {
        return;
    }

    if let Some(state) = message.job_id().and_then(|id| tracker.get(id)) {
        tracing::debug!(
            active = tracker.active(),
            state = %serde_json::to_string(state).unwrap_or_default(),
            "Job updated"
        );
    }

    if message.is_terminal() {
        tracker.clear_finished();
    }
}

fn log_message(message: &Message) {
    let job = message
        .job_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());

    match message {
        Message::GenerationStarted {
            position_in_queue,
            eta,
            ..
        } => tracing::info!(%job, position_in_queue, eta, "Generation started"),
        Message::GenerationProgress {
            progress,
            stage,
            eta,
            ..
        } => tracing::info!(%job, progress, %stage, eta, "Generation progress"),
        Message::GenerationCompleted { audio_url, .. } => {
            tracing::info!(%job, %audio_url, "Generation completed")
        }
        Message::GenerationFailed {
            error,
            retry_available,
            ..
        } => tracing::warn!(%job, %error, retry_available, "Generation failed"),
        Message::QueueUpdated {
            position,
            total_queue_size,
            eta,
            ..
        } => tracing::info!(position, total_queue_size, eta, "Queue updated"),
    }
}
