//! End-to-end tests through the facade: a whole match driven by client
//! lines, with the clock paused so the automatic start is deterministic.

use std::time::Duration;

use riverrush::prelude::*;
use riverrush::protocol::JsonCodec;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(line) = rx.try_recv() {
        out.push(line);
    }
    out
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// =========================================================================
// Full match
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_match_over_text_protocol() {
    let mut sessions = Riverrush::builder().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = sessions.connect_or_create(ClientId(1), tx).await.unwrap();
    let handle = sessions.get(session).cloned().unwrap();

    handle.add_animal(AnimalId(1), None).await.unwrap();
    handle.add_animal(AnimalId(2), None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(handle.get_info().await.unwrap().phase, GamePhase::Playing);
    drain(&mut rx);

    sessions
        .route_message(ClientId(1), "animal=1;type=JumpCommand;")
        .await
        .unwrap();
    sessions
        .route_message(ClientId(1), "animal=2;type=AnimalCollided;")
        .await
        .unwrap();
    sessions
        .route_message(ClientId(1), "type=AddObstacle;team=0;location=0.25;")
        .await
        .unwrap();
    settle().await;

    assert_eq!(
        drain(&mut rx),
        vec![
            "animal=1;type=PlayerJumped;",
            "animal=2;type=AnimalFellOff;",
            "team=0;location=0.25;type=AddObstacle;",
        ]
    );

    assert_eq!(
        handle.return_to_boat(AnimalId(2)).await.unwrap(),
        AnimalState::OnBoat
    );
    assert_eq!(handle.finish().await.unwrap(), GamePhase::Finished);
    assert_eq!(
        drain(&mut rx),
        vec!["animal=2;type=AnimalReturned;", "type=GameFinished;"]
    );
}

#[tokio::test]
async fn test_custom_separators_apply_to_sessions() {
    let config = ProtocolConfig {
        pair_separator: "&".into(),
        key_value_separator: ":".into(),
        type_key: "kind".into(),
    };
    let mut sessions = Riverrush::builder().protocol_config(config).build().unwrap();
    let session = sessions.create_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    sessions.connect(ClientId(1), session, tx).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), "kind:GameWaiting&");

    sessions
        .route_message(ClientId(1), "kind:RenderJoin&")
        .await
        .unwrap();
    settle().await;
    assert_eq!(drain(&mut rx), vec!["kind:GameWaiting&"]);
}

#[tokio::test]
async fn test_observer_sees_events_through_handle_dispatcher() {
    let mut sessions = Riverrush::builder().build().unwrap();
    let session = sessions.create_session();
    let handle = sessions.get(session).cloned().unwrap();

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    handle.dispatcher().attach(
        EventType::GameStarted,
        handler(move |event| {
            let _ = seen_tx.send(event.clone());
            Ok(())
        }),
    );

    handle.start().await.unwrap();
    assert_eq!(seen_rx.recv().await.unwrap(), Event::GameStarted);
}

#[tokio::test]
async fn test_json_codec_sessions() {
    let mut sessions = SessionManager::new(JsonCodec, GameConfig::default());
    let session = sessions.create_session();
    let handle = sessions.get(session).cloned().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    sessions.connect(ClientId(1), session, tx).await.unwrap();
    handle.add_animal(AnimalId(5), Some(TeamId(0))).await.unwrap();
    handle.start().await.unwrap();
    drain(&mut rx);

    sessions
        .route_message(ClientId(1), r#"{"type":"JumpCommand","animal":5}"#)
        .await
        .unwrap();
    settle().await;

    let lines = drain(&mut rx);
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(value["type"], "PlayerJumped");
    assert_eq!(value["animal"], 5);
}
