//! Courtside demo
//!
//! Walks through one week of a recurring round robin against the in-memory
//! store: scheduling, filling up, waitlisting, editing one week, a private
//! event with join requests, and the calendar listing.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=courtside=debug cargo run --bin courtside
//! ```

use courtside::config::DEFAULT_LOG_FILTER;
use courtside::{
    Capacity, Config, EventDefinition, InMemoryOccurrenceRepository, JoinOutcome,
    OccurrenceService, StaticDirectory, UserId, Visibility,
};
use courtside_core::environment::SystemClock;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        recurrence_weeks = config.scheduling.recurrence_weeks,
        waitlist_open = config.scheduling.waitlist_open,
        max_retries = config.retry.max_retries,
        "Configuration loaded"
    );

    let admin = UserId::new();
    let repository = Arc::new(InMemoryOccurrenceRepository::new());
    let service = OccurrenceService::new(
        repository,
        Arc::new(StaticDirectory::new([admin])),
        Arc::new(SystemClock),
    )
    .with_config(&config);

    // ========== Public weekly event ==========

    let weekly = EventDefinition::new(admin, "Tuesday Night Round Robin", "2025-01-07", "18:00", "20:00")
        .with_max_players(4)
        .recurring(true);
    let series = service.schedule_event(admin, weekly).await?;
    let first = series[0];
    println!("Scheduled {} weekly occurrences", series.len());

    let players: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();
    for player in &players {
        let receipt = service.attempt_admit(*player, first).await?;
        println!("  {player}: {:?}", receipt.outcome);
    }

    let departure = service.attempt_leave(players[0], first).await?;
    println!("  {} left, promoted {:?}", players[0], departure.outcome.promoted);

    let promoted = service.set_capacity(admin, first, Capacity::new(6)).await?;
    println!("  capacity raised to 6, promoted {:?}", promoted.outcome);

    let mut moved = service.occurrence(series[1]).await?.definition;
    moved.location = "Community Center, Court 2".to_string();
    moved.date = "2025-01-15".to_string();
    service.edit_occurrence(admin, series[1], moved).await?;
    println!("  week 2 moved to Wednesday 2025-01-15");

    // ========== Private one-off event ==========

    let clinic = EventDefinition::new(admin, "", "2025-01-09", "09:00", "11:00")
        .with_visibility(Visibility::Private);
    let clinic = service.schedule_event(admin, clinic).await?[0];

    let requester = UserId::new();
    if let JoinOutcome::Requested(request) = service.join(requester, clinic).await?.outcome {
        println!("Join request filed at {}", request.requested_at);
    }
    let approved = service.approve(admin, clinic, requester).await?;
    println!("  approved: {:?}", approved.outcome);

    if let Err(error) = service.approve(admin, clinic, requester).await {
        println!("  second approval: {error}");
    }

    // ========== Calendar ==========

    let calendar = service.calendar(None).await?;
    for entry in calendar.iter().take(3) {
        println!("{}", serde_json::to_string(entry)?);
    }

    Ok(())
}
