//! Session orchestration against an in-process backend

use naavi_draft::{DraftDocument, DraftRepository, FormState};
use naavi_model::{AnswerSet, AnswerValue, QuestionId, SchemaRegistry, SectionId};
use naavi_session::{
    BusyOperation, NotificationLevel, NotificationLog, PendingUpload, QuestionnaireProgress,
    QuestionnaireSession, QuestionnaireStatus, SessionConfig, SessionError, SubmitOutcome,
};
use naavi_test_utils::{
    health_check_registry, remote_section, scenario_key, single_question_registry, ApiCall,
    FakeQuestionnaireApi, SINGLE_QUESTION_ID,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    api: Arc<FakeQuestionnaireApi>,
    drafts: DraftRepository,
    log: Arc<NotificationLog>,
}

impl Harness {
    fn new(api: FakeQuestionnaireApi) -> Self {
        Self {
            api: Arc::new(api),
            drafts: DraftRepository::in_memory(),
            log: Arc::new(NotificationLog::new()),
        }
    }

    async fn open(&self, registry: Option<SchemaRegistry>) -> Arc<QuestionnaireSession> {
        self.open_with(registry, SessionConfig::default()).await
    }

    async fn open_with(
        &self,
        registry: Option<SchemaRegistry>,
        config: SessionConfig,
    ) -> Arc<QuestionnaireSession> {
        let mut builder = QuestionnaireSession::builder(scenario_key(), self.api.clone())
            .with_drafts(self.drafts.clone())
            .with_notifier(self.log.clone())
            .with_config(config);
        if let Some(registry) = registry {
            builder = builder.with_registry(Arc::new(registry));
        }
        builder.open().await.unwrap()
    }
}

fn remote_with(sections: Vec<naavi_draft::DraftSection>) -> DraftDocument {
    let mut doc = DraftDocument::new(&scenario_key());
    doc.sections = sections;
    doc
}

#[tokio::test]
async fn test_remote_answers_win_over_persisted_draft() {
    let harness = Harness::new(FakeQuestionnaireApi::with_document(remote_with(vec![
        remote_section("healthcheck", &[("healthCheckPerformed", "no")], &[]),
    ])));
    let persisted = remote_with(vec![remote_section(
        "healthcheck",
        &[("healthCheckPerformed", "yes")],
        &[],
    )]);
    harness.drafts.save_document(&persisted).await.unwrap();

    let session = harness.open(Some(health_check_registry())).await;
    assert_eq!(
        session.answers(SectionId(0)).unwrap().get("healthCheckPerformed"),
        Some(&AnswerValue::text("no"))
    );
    assert!(!session.is_initialized(SectionId(0)));
}

#[tokio::test]
async fn test_live_form_state_wins_over_remote() {
    let harness = Harness::new(FakeQuestionnaireApi::with_document(remote_with(vec![
        remote_section("healthcheck", &[("healthCheckPerformed", "no")], &[]),
    ])));
    let mut form_state = FormState::default();
    form_state.record_section(
        SectionId(0),
        &AnswerSet::new().with("healthCheckPerformed", "yes"),
    );
    harness
        .drafts
        .save_form_state(&scenario_key(), &form_state)
        .await
        .unwrap();

    let session = harness.open(Some(health_check_registry())).await;
    assert_eq!(
        session.answers(SectionId(0)).unwrap().get("healthCheckPerformed"),
        Some(&AnswerValue::text("yes"))
    );
    assert!(session.is_initialized(SectionId(0)));
}

#[tokio::test]
async fn test_failed_fetch_is_reported_and_session_still_opens() {
    let api = FakeQuestionnaireApi::new();
    api.fail_fetch("database unavailable");
    let harness = Harness::new(api);

    let session = harness.open(Some(health_check_registry())).await;
    let toast = harness.log.last().unwrap();
    assert_eq!(toast.level, NotificationLevel::Error);
    assert_eq!(
        toast.text,
        "Failed to load saved questionnaire: server returned 500: database unavailable"
    );
    assert!(session.answers(SectionId(0)).unwrap().is_empty());
}

#[tokio::test]
async fn test_navigation_saves_before_moving_on() {
    let harness = Harness::new(FakeQuestionnaireApi::new());
    let session = harness.open(Some(single_question_registry())).await;
    let navigator = session.navigator();

    session
        .set_answer(SectionId(0), SINGLE_QUESTION_ID, "done")
        .unwrap();
    assert_eq!(navigator.next().await, Some(SectionId(1)));
    assert_eq!(session.active_section(), SectionId(1));

    let saved = harness.api.saved_payloads();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].status, QuestionnaireStatus::InProgress);
    assert_eq!(saved[0].section_names().collect::<Vec<_>>(), vec!["healthcheck"]);
    assert_eq!(
        harness.log.last().unwrap().text,
        "Form data for healthcheck saved successfully!"
    );

    harness.api.fail_save("write failed");
    assert_eq!(navigator.next().await, Some(SectionId(2)));
    assert_eq!(harness.log.last().unwrap().level, NotificationLevel::Error);
    assert!(!session.is_busy(BusyOperation::Saving));
}

#[tokio::test]
async fn test_submit_blocks_until_every_section_is_complete() {
    let harness = Harness::new(FakeQuestionnaireApi::new());
    let session = harness.open(Some(single_question_registry())).await;
    for id in (0..13).filter(|id| *id != 5) {
        session
            .set_answer(SectionId(id), SINGLE_QUESTION_ID, "done")
            .unwrap();
    }

    let navigator = session.navigator();
    let outcome = navigator.submit().await.unwrap();
    let SubmitOutcome::Incomplete(summary) = outcome else {
        panic!("submission should be blocked");
    };
    assert_eq!(summary.first_invalid_section(), Some(SectionId(5)));
    assert_eq!(session.active_section(), SectionId(5));
    assert_eq!(
        session.invalid_fields(),
        vec![QuestionId::from(SINGLE_QUESTION_ID)]
    );
    assert_eq!(
        harness.log.last().unwrap().text,
        "Please fill in all required fields (1 missing across 1 sections)"
    );

    session
        .set_answer(SectionId(5), SINGLE_QUESTION_ID, "done")
        .unwrap();
    assert!(session.invalid_fields().is_empty());

    assert_eq!(navigator.submit().await.unwrap(), SubmitOutcome::Submitted);
    let saved = harness.api.saved_payloads();
    let last = saved.last().unwrap();
    assert_eq!(last.status, QuestionnaireStatus::Submitted);
    assert_eq!(last.latest, Some(true));
    assert_eq!(last.sections.len(), 13);

    assert!(harness.drafts.load_document(&scenario_key()).await.is_none());
    assert!(harness.drafts.load_form_state(&scenario_key()).await.is_none());
    assert!(session.is_closed());
    assert!(matches!(
        session.set_answer(SectionId(0), SINGLE_QUESTION_ID, "again"),
        Err(SessionError::Stale(_))
    ));
    assert_eq!(
        harness.log.last().unwrap().text,
        "Questionnaire submitted successfully!"
    );
}

#[tokio::test]
async fn test_failed_submission_keeps_drafts() {
    let harness = Harness::new(FakeQuestionnaireApi::new());
    let session = harness.open(Some(health_check_registry())).await;
    session
        .set_answer(SectionId(0), "healthCheckPerformed", "yes")
        .unwrap();
    session.flush().await.unwrap();
    harness.api.fail_save("artifactory down");

    assert!(session.navigator().submit().await.is_err());
    assert!(!session.is_closed());
    assert!(harness.drafts.load_document(&scenario_key()).await.is_some());
    assert_eq!(
        harness.log.last().unwrap().text,
        "Error submitting questionnaire: server returned 500: artifactory down"
    );
}

#[tokio::test(start_paused = true)]
async fn test_edits_are_autosaved_and_revalidated_after_quiet_period() {
    let harness = Harness::new(FakeQuestionnaireApi::new());
    let session = harness.open(Some(health_check_registry())).await;

    session
        .set_answer(SectionId(0), "healthCheckPerformed", "no")
        .unwrap();
    session
        .set_answer(SectionId(0), "healthCheckPerformed", "yes")
        .unwrap();
    assert!(session.last_summary().is_none());

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let summary = session.last_summary().unwrap();
    assert_eq!(summary.invalid_section_count(), 0);

    let form_state = harness
        .drafts
        .load_form_state(&scenario_key())
        .await
        .unwrap();
    assert_eq!(
        form_state
            .section_answers(SectionId(0))
            .unwrap()
            .get("healthCheckPerformed"),
        Some(&AnswerValue::text("yes"))
    );
}

#[tokio::test]
async fn test_health_check_section_with_mechanisms_and_upload() {
    let harness = Harness::new(FakeQuestionnaireApi::new());
    let session = harness.open(None).await;
    let s0 = SectionId(0);

    session.set_answer(s0, "healthCheckPerformed", "yes").unwrap();
    session.set_answer(s0, "stepsCount", "10").unwrap();
    session.set_answer(s0, "automatedStepsCount", "4").unwrap();
    assert_eq!(session.toggle_mechanism(s0, "cli").unwrap(), vec!["cli"]);
    assert_eq!(
        session.toggle_mechanism(s0, "other").unwrap(),
        vec!["cli", "other"]
    );
    assert!(session.visibility(s0).unwrap().is_visible("otherMechanism"));
    assert_eq!(session.toggle_mechanism(s0, "other").unwrap(), vec!["cli"]);
    assert!(!session.visibility(s0).unwrap().is_visible("otherMechanism"));

    let result = session.validate_section(s0).unwrap();
    assert_eq!(result.invalid_field_ids, vec![QuestionId::from("uploadMOPs")]);

    let report = session
        .upload_files(
            s0,
            "uploadMOPs",
            vec![PendingUpload::new("hc-mop.pdf", b"procedure".to_vec())],
        )
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(
        harness.log.last().unwrap().text,
        "1 file(s) uploaded successfully"
    );
    assert!(harness
        .api
        .calls()
        .contains(&ApiCall::Upload("healthcheck".into(), "hc-mop.pdf".into())));
    assert!(session.validate_section(s0).unwrap().is_valid);

    let progress = QuestionnaireProgress::compute(session.registry(), &session.document());
    assert_eq!(progress.sections[0].automation.automation_percentage(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_slow_upload_batch_times_out() {
    let api = FakeQuestionnaireApi::new();
    api.delay_uploads(Duration::from_secs(60));
    let harness = Harness::new(api);
    let session = harness
        .open_with(None, SessionConfig::default().with_upload_timeout_secs(5))
        .await;

    let err = session
        .upload_files(
            SectionId(0),
            "uploadMOPs",
            vec![PendingUpload::new("mop.pdf", vec![0u8; 16])],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UploadTimeout(5)));
    assert!(session.files(SectionId(0)).is_empty());
    assert!(!session.is_busy(BusyOperation::Uploading));
    assert_eq!(
        harness.log.last().unwrap().text,
        "Upload is taking longer than expected. Please check your connection and try again."
    );
}

#[tokio::test]
async fn test_all_uploads_failing_reports_error() {
    let api = FakeQuestionnaireApi::new();
    api.fail_upload_of("a-mop.pdf");
    api.fail_upload_of("b-mop.pdf");
    let harness = Harness::new(api);
    let session = harness.open(None).await;

    let report = session
        .upload_files(
            SectionId(0),
            "uploadMOPs",
            vec![
                PendingUpload::new("a-mop.pdf", vec![1]),
                PendingUpload::new("b-mop.pdf", vec![2]),
            ],
        )
        .await
        .unwrap();
    assert!(report.uploaded.is_empty());
    let toast = harness.log.last().unwrap();
    assert_eq!(toast.level, NotificationLevel::Error);
    assert_eq!(toast.text, "Failed to upload 2 files");
    assert_eq!(
        toast.details.as_deref(),
        Some("Failed files: a-mop.pdf, b-mop.pdf")
    );
}

#[tokio::test]
async fn test_remove_restored_file_clears_every_tier() {
    let harness = Harness::new(FakeQuestionnaireApi::with_document(remote_with(vec![
        remote_section(
            "healthcheck",
            &[("healthCheckPerformed", "yes")],
            &["hc-mop.pdf", "run-script.sh"],
        ),
    ])));
    let session = harness.open(None).await;
    let s0 = SectionId(0);

    let files = session.files(s0);
    assert_eq!(files.len(), 2);
    let mop = files.iter().find(|f| f.name == "hc-mop.pdf").unwrap();
    assert_eq!(mop.question_id, QuestionId::from("uploadMOPs"));
    assert_eq!(mop.size_bytes, None);
    let script = files.iter().find(|f| f.name == "run-script.sh").unwrap();
    assert_eq!(script.question_id, QuestionId::from("uploadAutomationDocs"));

    harness.api.fail_delete("locked");
    assert!(session.remove_file(s0, &mop.id).await.is_err());
    assert_eq!(session.files(s0).len(), 2);
    assert_eq!(
        harness.log.last().unwrap().text,
        "Error deleting file: server returned 500: locked"
    );

    let harness_ok = Harness::new(FakeQuestionnaireApi::with_document(remote_with(vec![
        remote_section(
            "healthcheck",
            &[("healthCheckPerformed", "yes")],
            &["hc-mop.pdf"],
        ),
    ])));
    let session = harness_ok.open(None).await;
    let mop = session.files(s0).remove(0);
    session.remove_file(s0, &mop.id).await.unwrap();

    assert!(session.files(s0).is_empty());
    assert!(session
        .validate_section(s0)
        .unwrap()
        .is_invalid("uploadMOPs"));
    assert!(harness_ok
        .api
        .document(&scenario_key())
        .unwrap()
        .files_for("healthcheck")
        .is_empty());
    assert_eq!(
        harness_ok.log.last().unwrap().text,
        "File hc-mop.pdf deleted successfully"
    );
}

#[tokio::test]
async fn test_reset_section_restores_defaults() {
    let harness = Harness::new(FakeQuestionnaireApi::new());
    let session = harness.open(Some(health_check_registry())).await;

    session
        .set_answer(SectionId(0), "healthCheckPerformed", "yes")
        .unwrap();
    session.reset_section(SectionId(0)).unwrap();

    assert!(session.answers(SectionId(0)).unwrap().is_empty());
    assert!(session.is_initialized(SectionId(0)));
    assert!(matches!(
        session.reset_section(SectionId(42)),
        Err(SessionError::UnknownSection(SectionId(42)))
    ));
}

#[tokio::test]
async fn test_draft_directory_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::default().with_draft_dir(dir.path());
    let api = Arc::new(FakeQuestionnaireApi::new());

    let session = QuestionnaireSession::builder(scenario_key(), api.clone())
        .with_registry(Arc::new(health_check_registry()))
        .with_config(config.clone())
        .open()
        .await
        .unwrap();
    session
        .set_answer(SectionId(0), "healthCheckPerformed", "no")
        .unwrap();
    session.flush().await.unwrap();
    session.close();

    let reopened = QuestionnaireSession::builder(scenario_key(), api)
        .with_registry(Arc::new(health_check_registry()))
        .with_config(config)
        .open()
        .await
        .unwrap();
    assert!(reopened.is_initialized(SectionId(0)));
    assert_eq!(
        reopened
            .answers(SectionId(0))
            .unwrap()
            .get("healthCheckPerformed"),
        Some(&AnswerValue::text("no"))
    );
}
