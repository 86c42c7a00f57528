//! End-to-end pipeline tests: scripted STT results in one side, assistant
//! messages and audio out the other, with mock backends everywhere.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use converse::ServerConfig;
use converse::core::llm::{LlmError, Role};
use converse::core::stt::SttError;
use converse::core::{
    FAILSOFT_APOLOGY, InboundFrame, OutboundFrame, OutgoingMessage, SessionBackends, SessionError,
    SessionResult, run_session,
};

use common::{
    MockDocStore, MockLlm, MockStt, MockTts, SttProbe, TtsScript, test_config,
};

struct Harness {
    in_tx: mpsc::Sender<InboundFrame>,
    out_rx: mpsc::Receiver<OutboundFrame>,
    stt: SttProbe,
    llm: MockLlm,
    tts: MockTts,
    docstore: MockDocStore,
    handle: JoinHandle<SessionResult<()>>,
}

fn start_session(config: ServerConfig) -> Harness {
    start_session_with(config, MockStt::new(), MockTts::new())
}

fn start_session_with(config: ServerConfig, stt_pair: (MockStt, SttProbe), tts: MockTts) -> Harness {
    let (stt, probe) = stt_pair;
    let llm = MockLlm::new();
    let docstore = MockDocStore::new();

    let backends = SessionBackends {
        stt: Box::new(stt),
        tts: Arc::new(tts.clone()),
        llm: Arc::new(llm.clone()),
        docstore: Arc::new(docstore.clone()),
    };

    let (in_tx, in_rx) = mpsc::channel(64);
    let (out_tx, mut out_rx_inner) = mpsc::channel(64);
    let (out_fwd_tx, out_rx) = mpsc::channel(64);

    // Relay outbound frames so a slow test can never exert backpressure on
    // the session under test
    tokio::spawn(async move {
        while let Some(frame) = out_rx_inner.recv().await {
            if out_fwd_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let handle = tokio::spawn(async move { run_session(&config, backends, in_rx, out_tx).await });

    Harness {
        in_tx,
        out_rx,
        stt: probe,
        llm,
        tts,
        docstore,
        handle,
    }
}

async fn next_message(out_rx: &mut mpsc::Receiver<OutboundFrame>) -> OutgoingMessage {
    loop {
        match timeout(Duration::from_secs(2), out_rx.recv()).await {
            Ok(Some(OutboundFrame::Message(message))) => return message,
            Ok(Some(OutboundFrame::Audio(_))) => continue,
            Ok(None) => panic!("outbound stream closed unexpectedly"),
            Err(_) => panic!("timed out waiting for an outbound message"),
        }
    }
}

async fn send_text_turn(in_tx: &mpsc::Sender<InboundFrame>, content: &str) {
    let frame = format!(r#"{{"type":"text","content":"{content}"}}"#);
    in_tx
        .send(InboundFrame::Text(frame))
        .await
        .expect("session gone");
}

#[tokio::test]
async fn test_segments_aggregate_into_one_turn() {
    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;

    harness.stt.push_segment("I", false).await;
    harness.stt.push_segment("went to", false).await;
    harness.stt.push_segment("", true).await;

    // Captions for each finalized segment, then the assistant reply
    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::TranscriptFinal {
            content: "I".to_string()
        }
    );
    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::TranscriptFinal {
            content: "went to".to_string()
        }
    );
    let reply = next_message(&mut harness.out_rx).await;
    assert!(matches!(reply, OutgoingMessage::Assistant { .. }));

    let calls = harness.llm.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0].role, Role::System);
    assert_eq!(calls[0][1].role, Role::User);
    assert_eq!(calls[0][1].content, "I went to");

    assert_eq!(harness.tts.spoken(), vec!["Understood.".to_string()]);
}

#[tokio::test]
async fn test_interim_results_become_captions_without_accumulating() {
    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;

    harness
        .stt
        .push_result(converse::core::stt::SttResult::new(
            "hel".to_string(),
            false,
            false,
            0.4,
        ))
        .await;

    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::TranscriptInterim {
            content: "hel".to_string()
        }
    );

    // An interim alone never completes a turn
    harness.stt.push_segment("", true).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.llm.calls().is_empty());
}

#[tokio::test]
async fn test_farewell_finishes_without_model_call() {
    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;

    harness.stt.push_segment("ok, goodbye!", true).await;

    // Caption first, then the finish marker
    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::TranscriptFinal {
            content: "ok, goodbye!".to_string()
        }
    );
    assert_eq!(next_message(&mut harness.out_rx).await, OutgoingMessage::Finish);

    assert!(harness.llm.calls().is_empty());
    assert!(harness.tts.spoken().is_empty());

    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end")
        .expect("session task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_text_frame_bypasses_recognition() {
    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;

    send_text_turn(&harness.in_tx, "What time is it?").await;

    let reply = next_message(&mut harness.out_rx).await;
    assert!(matches!(reply, OutgoingMessage::Assistant { .. }));

    let calls = harness.llm.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][1].content, "What time is it?");
}

#[tokio::test]
async fn test_memory_window_bounds_model_requests() {
    let config = ServerConfig {
        memory_window: 3,
        ..test_config()
    };
    let mut harness = start_session(config);
    harness.stt.wait_connected().await;

    for i in 0..8 {
        send_text_turn(&harness.in_tx, &format!("turn {i}")).await;
        let reply = next_message(&mut harness.out_rx).await;
        assert!(matches!(reply, OutgoingMessage::Assistant { .. }));
    }

    let calls = harness.llm.calls();
    assert_eq!(calls.len(), 8);
    // System prompt plus at most three history messages, newest last
    let last = calls.last().unwrap();
    assert_eq!(last.len(), 4);
    assert_eq!(last[0].role, Role::System);
    assert_eq!(last[3].content, "turn 7");
}

#[tokio::test]
async fn test_attachment_rides_exactly_one_turn() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sess1_notes.txt");
    std::fs::write(&path, b"quarterly numbers").unwrap();

    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;

    let frame = serde_json::json!({"type": "attach", "content": path.to_string_lossy()});
    harness
        .in_tx
        .send(InboundFrame::Text(frame.to_string()))
        .await
        .unwrap();

    // Wait for the upload to resolve and re-enter the pipeline
    for _ in 0..200 {
        if !harness.docstore.uploads().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(harness.docstore.uploads(), vec![("sess1_notes.txt".to_string(), 17)]);
    tokio::time::sleep(Duration::from_millis(50)).await;

    send_text_turn(&harness.in_tx, "summarize the document").await;
    let _ = next_message(&mut harness.out_rx).await;
    send_text_turn(&harness.in_tx, "thanks").await;
    let _ = next_message(&mut harness.out_rx).await;

    let calls = harness.llm.calls();
    assert_eq!(calls.len(), 2);

    let first_user = &calls[0][1];
    assert_eq!(
        first_user.attachment.as_ref().map(|d| d.as_str().to_string()),
        Some("file-sess1_notes.txt".to_string())
    );

    // The reference was consumed; later turns go out bare
    let second_user = calls[1].iter().rfind(|m| m.role == Role::User).unwrap();
    assert!(second_user.attachment.is_none());
}

#[tokio::test]
async fn test_transport_eos_tears_down_and_releases_stt() {
    let harness = start_session(test_config());
    harness.stt.wait_connected().await;

    drop(harness.in_tx);

    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end after transport close")
        .expect("session task panicked");
    assert!(result.is_ok());

    assert_eq!(harness.stt.finish_calls(), 1);
    assert_eq!(harness.stt.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_session_timeout_tears_down_idle_session() {
    let config = ServerConfig {
        session_timeout_secs: 1,
        shutdown_grace_ms: 500,
        ..test_config()
    };
    let harness = start_session(config);
    harness.stt.wait_connected().await;

    // No frames, no results: only the timeout can end this session
    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end at the timeout")
        .expect("session task panicked");
    assert!(result.is_ok());

    assert_eq!(harness.stt.finish_calls(), 1);
    assert_eq!(harness.stt.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_stt_connect_failure_is_fatal() {
    let harness = start_session_with(test_config(), MockStt::failing_connect(), MockTts::new());

    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end")
        .expect("session task panicked");
    assert!(matches!(result, Err(SessionError::Stt(_))));
}

#[tokio::test]
async fn test_stt_stream_fault_ends_session() {
    let harness = start_session(test_config());
    harness.stt.wait_connected().await;

    harness
        .stt
        .push_error(SttError::ProviderError("rate limited".to_string()))
        .await;

    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end")
        .expect("session task panicked");
    assert!(matches!(result, Err(SessionError::Stt(_))));
    assert_eq!(harness.stt.finish_calls(), 1);
    assert_eq!(harness.stt.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_model_failure_is_spoken_failsoft() {
    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;
    harness
        .llm
        .queue_error(LlmError::Provider("upstream 500".to_string()));

    send_text_turn(&harness.in_tx, "hello").await;
    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::Assistant {
            content: FAILSOFT_APOLOGY.to_string()
        }
    );

    // The session keeps going
    send_text_turn(&harness.in_tx, "still there?").await;
    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::Assistant {
            content: "Understood.".to_string()
        }
    );
}

#[tokio::test]
async fn test_model_failure_verbatim_in_debug_mode() {
    let config = ServerConfig {
        debug_errors: true,
        ..test_config()
    };
    let mut harness = start_session(config);
    harness.stt.wait_connected().await;
    harness
        .llm
        .queue_error(LlmError::Provider("upstream 500".to_string()));

    send_text_turn(&harness.in_tx, "hello").await;
    assert_eq!(
        next_message(&mut harness.out_rx).await,
        OutgoingMessage::Assistant {
            content: "Provider error: upstream 500".to_string()
        }
    );
}

#[tokio::test]
async fn test_synthesis_failure_is_fatal_and_releases_stt() {
    let mut harness = start_session_with(
        test_config(),
        MockStt::new(),
        MockTts::with_script(TtsScript::FailSynthesis),
    );
    harness.stt.wait_connected().await;

    send_text_turn(&harness.in_tx, "hello").await;
    // The reply text still goes out before synthesis is attempted
    let reply = next_message(&mut harness.out_rx).await;
    assert!(matches!(reply, OutgoingMessage::Assistant { .. }));

    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end")
        .expect("session task panicked");
    assert!(matches!(result, Err(SessionError::Synthesis(_))));
    assert_eq!(harness.stt.finish_calls(), 1);
    assert_eq!(harness.stt.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_mid_stream_synthesis_failure_is_fatal() {
    let harness = start_session_with(
        test_config(),
        MockStt::new(),
        MockTts::with_script(TtsScript::FailMidStream),
    );
    harness.stt.wait_connected().await;

    send_text_turn(&harness.in_tx, "hello").await;

    let result = timeout(Duration::from_secs(5), harness.handle)
        .await
        .expect("session did not end")
        .expect("session task panicked");
    assert!(matches!(result, Err(SessionError::Synthesis(_))));
}

#[tokio::test]
async fn test_malformed_text_frame_is_dropped() {
    let mut harness = start_session(test_config());
    harness.stt.wait_connected().await;

    harness
        .in_tx
        .send(InboundFrame::Text("{not json".to_string()))
        .await
        .unwrap();

    // Still alive and processing turns afterwards
    send_text_turn(&harness.in_tx, "hello").await;
    let reply = next_message(&mut harness.out_rx).await;
    assert!(matches!(reply, OutgoingMessage::Assistant { .. }));
    assert_eq!(harness.llm.calls().len(), 1);
}

#[tokio::test]
async fn test_audio_frames_reach_the_engine() {
    let harness = start_session(test_config());
    harness.stt.wait_connected().await;

    harness
        .in_tx
        .send(InboundFrame::Audio(bytes::Bytes::from_static(&[0u8; 320])))
        .await
        .unwrap();
    harness
        .in_tx
        .send(InboundFrame::Audio(bytes::Bytes::from_static(&[0u8; 320])))
        .await
        .unwrap();

    for _ in 0..200 {
        if harness.stt.audio_bytes() == 640 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("audio never reached the STT engine");
}
