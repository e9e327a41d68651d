//! A scripted two-team race on one headless session.
//!
//! A "renderer" client connects, two animals join, the session starts on
//! its own, and a short sequence of jumps, collisions and obstacles plays
//! out before the race is finished. Every line the renderer receives is
//! printed.

use std::time::Duration;

use riverrush::prelude::*;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Stand-in for a renderer's hit animation.
struct Splash;

impl Presentation for Splash {
    fn animal_hit(&mut self, animal: AnimalId, team: TeamId) {
        tracing::info!(%animal, %team, "splash");
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

const RENDERER: ClientId = ClientId(1);
const OTTER: AnimalId = AnimalId(1);
const BEAVER: AnimalId = AnimalId(2);

/// Lines a client would send during the race, in order.
const RACE: &[&str] = &[
    "type=AddObstacle;team=0;location=0.4;",
    "type=AddObstacle;team=1;location=0.4;",
    "animal=1;type=JumpCommand;",
    "animal=2;type=AnimalCollided;",
    "animal=1;type=AnimalDropped;",
    "animal=1;type=AnimalCollided;",
];

/// Plays the race and returns everything the renderer received.
async fn play(start_delay: Duration) -> Result<Vec<String>, RiverrushError> {
    let mut sessions = Riverrush::builder()
        .game_config(GameConfig {
            start_delay,
            ..GameConfig::default()
        })
        .build()?;
    let session = sessions.create_session_with(Box::new(Splash));
    let handle = sessions
        .get(session)
        .cloned()
        .ok_or(GameError::SessionNotFound(session))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    sessions.connect(RENDERER, session, tx).await?;
    sessions.route_message(RENDERER, "type=RenderJoin;").await?;

    handle.add_animal(OTTER, None).await?;
    handle.add_animal(BEAVER, None).await?;

    // Wait out the automatic start.
    tokio::time::sleep(start_delay + Duration::from_millis(100)).await;
    let info = handle.get_info().await?;
    tracing::info!(phase = %info.phase, animals = info.animals, "race on");

    for line in RACE {
        sessions.route_message(RENDERER, *line).await?;
    }
    handle.return_to_boat(BEAVER).await?;
    handle.finish().await?;
    sessions.destroy_session(session).await?;

    let mut transcript = Vec::new();
    while let Some(line) = rx.recv().await {
        transcript.push(line);
    }
    Ok(transcript)
}

#[tokio::main]
async fn main() -> Result<(), RiverrushError> {
    riverrush::logging::init();

    for line in play(Duration::from_secs(3)).await? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_race_transcript() {
        let transcript = play(Duration::from_secs(5)).await.unwrap();

        assert_eq!(
            transcript,
            vec![
                "type=GameWaiting;",
                "type=GameWaiting;",
                "animal=1;team=0;type=AnimalAdded;",
                "animal=2;team=1;type=AnimalAdded;",
                "seconds=5;type=GameAboutToStart;",
                "type=GameStarted;",
                "team=0;location=0.4;type=AddObstacle;",
                "team=1;location=0.4;type=AddObstacle;",
                "animal=1;type=PlayerJumped;",
                "animal=2;type=AnimalFellOff;",
                "animal=1;type=AnimalFellOff;",
                "animal=2;type=AnimalReturned;",
                "type=GameFinished;",
            ]
        );
    }
}
