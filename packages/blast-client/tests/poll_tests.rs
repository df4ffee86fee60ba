mod common;

use blast_client::{
    BlastError, CancellationToken, FormatType, JobState, JobStatus, PollPolicy, RateGate,
    RequestId, SubmissionParams, TransportError,
};
use common::*;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_ready_after_two_pending_checks() {
    let transport = ScriptedTransport::new();
    transport
        .accept(RID)
        .status("WAITING")
        .status("WAITING")
        .status("READY");
    let client = client(&transport);

    let start = Instant::now();
    let outcome = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .expect("job should complete");

    assert_eq!(outcome.request_id.as_str(), RID);
    assert_eq!(outcome.status, JobStatus::Ready);
    assert_eq!(outcome.attempts, 3);
    // initial wait + exactly two inter-poll delays
    assert_eq!(start.elapsed(), secs(30));

    let times = transport.request_times();
    assert_eq!(times.len(), 4);
    assert_eq!(times[1] - times[0], secs(10));
    assert_eq!(times[2] - times[1], secs(10));
    assert_eq!(times[3] - times[2], secs(10));

    let requests = transport.requests();
    assert_eq!(requests[0].param("CMD"), Some("Put"));
    for check in &requests[1..] {
        assert_eq!(check.param("CMD"), Some("Get"));
        assert_eq!(check.param("FORMAT_OBJECT"), Some("SearchInfo"));
        assert_eq!(check.param("RID"), Some(RID));
    }
}

#[tokio::test(start_paused = true)]
async fn test_attempts_exhausted_after_max_checks() {
    let transport = ScriptedTransport::new();
    transport.accept(RID);
    for _ in 0..10 {
        transport.status("WAITING");
    }
    let client = client(&transport);

    let policy = ten_second_policy().with_max_attempts(3);
    let err = client.submit_and_poll(params(), &policy).await.unwrap_err();

    assert!(matches!(err.source, BlastError::AttemptsExhausted { attempts: 3 }));
    assert_eq!(err.attempts, 3);
    assert_eq!(err.state, JobState::Pending);
    assert_eq!(err.last_status, Some(JobStatus::Pending));
    assert_eq!(err.request_id.as_ref().map(|r| r.as_str()), Some(RID));
    // one submission + exactly three status checks
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn test_invalid_params_make_no_transport_calls() {
    let transport = ScriptedTransport::new();
    transport.accept(RID);
    let client = client(&transport);

    let empty_query = SubmissionParams::new("", "nt", blast_client::Program::Blastn);
    let err = client
        .submit_and_poll(empty_query, &ten_second_policy())
        .await
        .unwrap_err();
    assert!(matches!(
        err.source,
        BlastError::InvalidParameter { field: "query", .. }
    ));
    assert!(err.request_id.is_none());
    assert_eq!(err.state, JobState::Submitting);

    let zero_reward = params().with_reward(0);
    let err = client
        .submit_and_poll(zero_reward, &ten_second_policy())
        .await
        .unwrap_err();
    assert!(matches!(
        err.source,
        BlastError::InvalidParameter { field: "reward", .. }
    ));

    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_policy_makes_no_transport_calls() {
    let transport = ScriptedTransport::new();
    let client = client(&transport);

    let policy = PollPolicy::default().with_max_attempts(0);
    let err = client.submit_and_poll(params(), &policy).await.unwrap_err();

    assert!(matches!(
        err.source,
        BlastError::InvalidParameter { field: "max_attempts", .. }
    ));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submission_transport_error_is_not_retried() {
    let transport = ScriptedTransport::new();
    transport
        .fail(TransportError::Timeout(secs(10)))
        .accept(RID);
    let client = client(&transport);

    let err = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        BlastError::Transport(TransportError::Timeout(_))
    ));
    assert!(err.request_id.is_none());
    assert_eq!(err.state, JobState::Submitting);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submission_non_2xx_is_transport_error() {
    let transport = ScriptedTransport::new();
    transport.respond(503, "Service Unavailable");
    let client = client(&transport);

    let err = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .unwrap_err();

    match err.source {
        BlastError::Transport(TransportError::Status { status, .. }) => assert_eq!(status, 503),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_submission_without_rid_marker() {
    let transport = ScriptedTransport::new();
    transport.respond(200, "<html><body>Message ID#24 Error: Query is empty</body></html>");
    let client = client(&transport);

    let err = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .unwrap_err();

    assert!(matches!(err.source, BlastError::IdentifierNotFound { .. }));
    assert!(err.request_id.is_none());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submission_with_truncated_rid_marker() {
    let transport = ScriptedTransport::new();
    transport.respond(200, r#"<input type="hidden" name="RID" value="ABC1"#);
    let client = client(&transport);

    let err = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .unwrap_err();

    assert!(matches!(err.source, BlastError::MalformedResponse { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_status_transport_error_keeps_rid() {
    let transport = ScriptedTransport::new();
    transport
        .accept(RID)
        .status("WAITING")
        .fail(TransportError::Connect("connection reset".into()));
    let client = client(&transport);

    let err = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        BlastError::Transport(TransportError::Connect(_))
    ));
    assert_eq!(err.request_id.as_ref().map(|r| r.as_str()), Some(RID));
    assert_eq!(err.state, JobState::Pending);
    assert_eq!(err.attempts, 2);
    assert!(err.to_string().contains(RID));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_is_terminal_outcome() {
    let transport = ScriptedTransport::new();
    transport.accept(RID).status("WAITING").status("FAILED");
    let client = client(&transport);

    let outcome = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .expect("failed search is still an outcome");

    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.request_id.as_str(), RID);
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_keeps_polling() {
    let transport = ScriptedTransport::new();
    transport
        .accept(RID)
        .status("QUEUED")
        .respond(200, "<html>no marker at all</html>")
        .status("READY");
    let client = client(&transport);

    let outcome = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .expect("unknown statuses should not abort");

    assert_eq!(outcome.status, JobStatus::Ready);
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_counts_toward_attempts() {
    let transport = ScriptedTransport::new();
    transport.accept(RID).status("UNKNOWN").status("UNKNOWN");
    let client = client(&transport);

    let policy = ten_second_policy().with_max_attempts(2);
    let err = client.submit_and_poll(params(), &policy).await.unwrap_err();

    assert!(matches!(err.source, BlastError::AttemptsExhausted { attempts: 2 }));
    assert_eq!(err.last_status, Some(JobStatus::Unknown));
}

#[tokio::test(start_paused = true)]
async fn test_max_wait_exceeded() {
    let transport = ScriptedTransport::new();
    transport.accept(RID);
    for _ in 0..10 {
        transport.status("WAITING");
    }
    let client = client(&transport);

    let policy = ten_second_policy().with_max_wait(secs(25));
    let err = client.submit_and_poll(params(), &policy).await.unwrap_err();

    match err.source {
        BlastError::WaitExceeded { waited } => assert_eq!(waited, secs(20)),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.attempts, 2);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_cycles() {
    let transport = ScriptedTransport::new();
    transport.accept(RID);
    for _ in 0..10 {
        transport.status("WAITING");
    }
    let client = client(&transport);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(secs(15)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = client
        .submit_and_poll_with_cancel(params(), &ten_second_policy(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, BlastError::Cancelled));
    assert_eq!(err.request_id.as_ref().map(|r| r.as_str()), Some(RID));
    assert_eq!(err.attempts, 1);
    assert_eq!(start.elapsed(), secs(15));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_does_not_interrupt_call_in_flight() {
    let transport = ScriptedTransport::with_latency(secs(5));
    transport.accept(RID);
    for _ in 0..10 {
        transport.status("WAITING");
    }
    let client = client(&transport);
    let cancel = CancellationToken::new();

    // Submission runs 0..5s, first check starts at 15s and answers at 20s
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(secs(17)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = client
        .submit_and_poll_with_cancel(params(), &ten_second_policy(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, BlastError::Cancelled));
    assert_eq!(start.elapsed(), secs(20));
    assert_eq!(err.last_status, Some(JobStatus::Pending));
    assert_eq!(transport.call_count(), 2);
    assert_eq!(transport.completed_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_never_submits() {
    let transport = ScriptedTransport::new();
    transport.accept(RID);
    let client = client(&transport);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client
        .submit_and_poll_with_cancel(params(), &ten_second_policy(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, BlastError::Cancelled));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_estimated_wait_delays_first_check() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, submit_page_with_estimate(RID, 40))
        .status("READY");
    let client = client(&transport);

    let outcome = client
        .submit_and_poll(params(), &ten_second_policy())
        .await
        .unwrap();

    let times = transport.request_times();
    assert_eq!(times[1] - times[0], secs(40));
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_polling_existing_rid() {
    let transport = ScriptedTransport::new();
    transport.status("WAITING").status("READY");
    let client = client(&transport);
    let rid = RequestId::new("OLDRID42").unwrap();

    let outcome = client
        .poll(
            rid,
            FormatType::Text,
            &ten_second_policy(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Ready);
    assert!(outcome.submitted_at.is_none());
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.param("CMD") == Some("Get")));
    assert_eq!(requests[0].param("RID"), Some("OLDRID42"));
    assert_eq!(requests[0].param("FORMAT_TYPE"), Some("Text"));
}

#[tokio::test(start_paused = true)]
async fn test_shared_rate_gate_spaces_concurrent_jobs() {
    let gate = RateGate::new(secs(10));
    let first = ScriptedTransport::new();
    first.accept("RID_A").status("WAITING").status("READY");
    let second = ScriptedTransport::new();
    second.accept("RID_B").status("READY");

    let client_a = client(&first).with_rate_gate(gate.clone());
    let client_b = client(&second).with_rate_gate(gate);

    let policy = ten_second_policy();
    let (a, b) = tokio::join!(
        client_a.submit_and_poll(params(), &policy),
        client_b.submit_and_poll(params(), &policy),
    );
    assert_eq!(a.unwrap().status, JobStatus::Ready);
    assert_eq!(b.unwrap().status, JobStatus::Ready);

    let mut times = first.request_times();
    times.extend(second.request_times());
    times.sort();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= secs(10), "requests closer than the gate allows");
    }
}

#[tokio::test]
async fn test_fetch_results_and_delete() {
    let transport = ScriptedTransport::new();
    transport.respond(200, "BLASTN 2.16.0+\nQuery= test").respond(200, "");
    let client = client(&transport);
    let rid = RequestId::new(RID).unwrap();

    let report = tokio_test::assert_ok!(
        client
            .fetch_results(&rid, FormatType::Text, &Default::default())
            .await
    );
    assert!(report.starts_with(b"BLASTN"));
    tokio_test::assert_ok!(client.delete(&rid).await);

    let requests = transport.requests();
    assert_eq!(requests[0].param("CMD"), Some("Get"));
    assert_eq!(requests[0].param("FORMAT_OBJECT"), None);
    assert_eq!(requests[1].param("CMD"), Some("Delete"));
}

#[test]
fn test_results_reference_needs_no_io() {
    let transport = ScriptedTransport::new();
    let client = client(&transport);
    let rid = RequestId::new(RID).unwrap();

    assert_eq!(
        client.results_reference(&rid).as_str(),
        "https://blast.ncbi.nlm.nih.gov/Blast.cgi?CMD=Get&RID=ABC123"
    );
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_queued_at_rate_gate() {
    let transport = ScriptedTransport::new();
    transport.accept(RID);
    for _ in 0..10 {
        transport.status("WAITING");
    }
    // Submission takes the gate at 0s; the first check queues there from 10s to 100s
    let client = client(&transport).with_rate_gate(RateGate::new(secs(100)));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(secs(50)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = client
        .submit_and_poll_with_cancel(params(), &ten_second_policy(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, BlastError::Cancelled));
    assert_eq!(start.elapsed(), secs(50));
    assert_eq!(err.request_id.as_ref().map(|r| r.as_str()), Some(RID));
    assert_eq!(err.attempts, 0);
    assert_eq!(transport.call_count(), 1, "no status check after cancellation");
}

#[tokio::test(start_paused = true)]
async fn test_huge_interval_with_max_wait_aborts_cleanly() {
    let transport = ScriptedTransport::new();
    transport.accept(RID).status("WAITING").status("WAITING");
    let client = client(&transport);

    let policy = ten_second_policy()
        .with_interval(std::time::Duration::MAX)
        .with_max_interval(std::time::Duration::MAX)
        .with_max_wait(secs(100));
    let err = client.submit_and_poll(params(), &policy).await.unwrap_err();

    match err.source {
        BlastError::WaitExceeded { waited } => assert_eq!(waited, secs(10)),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_without_rate_gate_sends_back_to_back() {
    let transport = ScriptedTransport::new();
    transport.respond(200, "report").respond(200, "");
    let client = client(&transport)
        .with_rate_gate(RateGate::new(secs(100)))
        .without_rate_gate();
    let rid = RequestId::new(RID).unwrap();

    tokio_test::assert_ok!(
        client
            .fetch_results(&rid, FormatType::Text, &Default::default())
            .await
    );
    tokio_test::assert_ok!(client.delete(&rid).await);

    let times = transport.request_times();
    assert_eq!(times[1] - times[0], secs(0));
}
