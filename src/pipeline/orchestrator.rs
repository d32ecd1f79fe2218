use super::classify::Classifier;
use super::respond::Responder;
use super::retrieval::Retriever;
use super::sentiment::SentimentEstimator;
use super::types::{
    ActionDispatched, Classification, Classified, ContextRetrieved, Intent, PipelineRun,
    Responded, RetrievedContext, Sentiment, SentimentScored, StageStatus,
};
use super::PipelineError;
use crate::config::DEFAULT_RETRIEVAL_K;
use crate::handlers::{self, HandlerContext};

/// The intake pipeline.
///
/// Runs five fixed stages in order: classify → sentiment → dispatch → retrieve → respond.
/// Each stage consumes the previous stage's record and returns a new one.
///
/// Failure policy:
/// - classifier failure degrades to the general intent
/// - sentiment failure degrades to neutral
/// - retriever failure degrades to an "unavailable" context
/// - storage failures from a handler and responder failures abort the run
pub struct IntakePipeline<'a> {
    classifier: &'a dyn Classifier,
    sentiment: &'a dyn SentimentEstimator,
    retriever: &'a dyn Retriever,
    responder: &'a dyn Responder,
    handlers: HandlerContext<'a>,
    retrieval_k: usize,
}

impl<'a> IntakePipeline<'a> {
    pub fn new(
        classifier: &'a dyn Classifier,
        sentiment: &'a dyn SentimentEstimator,
        retriever: &'a dyn Retriever,
        responder: &'a dyn Responder,
        handlers: HandlerContext<'a>,
    ) -> Self {
        Self {
            classifier,
            sentiment,
            retriever,
            responder,
            handlers,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    /// Run one message through every stage.
    ///
    /// Handler side effects (a booking, an appended note) are committed before the
    /// responder runs, so they persist even when the run returns `PipelineError::Responder`.
    pub fn run(&self, message: &str) -> Result<PipelineRun, PipelineError> {
        let span = tracing::info_span!("intake", chars = message.len());
        let _guard = span.enter();

        let classified = self.classify(message);
        let scored = self.score_sentiment(classified);
        let dispatched = self.dispatch(scored)?;
        let retrieved = self.retrieve(dispatched);
        let responded = self.respond(retrieved)?;

        Ok(responded.into_run())
    }

    fn classify(&self, message: &str) -> Classified {
        tracing::debug!("Stage: classify");
        let (classification, status) = match self.classifier.classify(message) {
            Ok(c) if c.raw.is_some() => {
                (c, StageStatus::Degraded("unparseable classifier output".into()))
            }
            Ok(c) => (c, StageStatus::Completed),
            Err(e) => {
                tracing::warn!(error = %e, "Classifier failed, falling back to general");
                (Classification::fallback(None), StageStatus::Degraded(e.to_string()))
            }
        };
        tracing::info!(
            intent = %classification.intent.kind(),
            confidence = classification.confidence,
            "Classified"
        );

        Classified {
            message: message.to_string(),
            classification,
            status,
        }
    }

    fn score_sentiment(&self, prior: Classified) -> SentimentScored {
        tracing::debug!("Stage: sentiment");
        let (sentiment, status) = match self.sentiment.estimate(&prior.message) {
            Ok(s) if s.raw.is_some() => {
                (s, StageStatus::Degraded("unparseable sentiment output".into()))
            }
            Ok(s) => (s, StageStatus::Completed),
            Err(e) => {
                tracing::warn!(error = %e, "Sentiment estimation failed, assuming neutral");
                (Sentiment::neutral(), StageStatus::Degraded(e.to_string()))
            }
        };
        tracing::info!(sentiment = %sentiment.label, intensity = sentiment.intensity, "Sentiment scored");

        SentimentScored {
            prior,
            sentiment,
            status,
        }
    }

    fn dispatch(&self, prior: SentimentScored) -> Result<ActionDispatched, PipelineError> {
        tracing::debug!("Stage: dispatch");
        let classified = &prior.prior;
        let outcome = handlers::dispatch(
            &self.handlers,
            &classified.classification.intent,
            &classified.message,
        )?;
        tracing::info!(
            action = %outcome.action,
            success = outcome.success,
            reason = outcome.message.as_deref().unwrap_or(""),
            "Action dispatched"
        );

        Ok(ActionDispatched { prior, outcome })
    }

    fn retrieve(&self, prior: ActionDispatched) -> ContextRetrieved {
        tracing::debug!("Stage: retrieve");
        let classified = &prior.prior.prior;

        let context = match &classified.classification.intent {
            intent @ Intent::MedicalInfo(_) => {
                let topic = intent.topic().unwrap_or(&classified.message);
                match self.retriever.retrieve(topic, self.retrieval_k) {
                    Ok(passages) if passages.is_empty() => RetrievedContext::NoneFound,
                    Ok(mut passages) => {
                        passages.truncate(self.retrieval_k);
                        RetrievedContext::Passages(passages)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Retrieval failed, continuing without context");
                        RetrievedContext::Unavailable(e.to_string())
                    }
                }
            }
            _ => RetrievedContext::NotNeeded,
        };
        tracing::info!(
            passages = match &context {
                RetrievedContext::Passages(p) => p.len(),
                _ => 0,
            },
            "Context retrieved"
        );

        ContextRetrieved { prior, context }
    }

    fn respond(&self, prior: ContextRetrieved) -> Result<Responded, PipelineError> {
        tracing::debug!("Stage: respond");
        let response = self.responder.respond(&prior).map_err(|e| {
            tracing::error!(error = %e, "Responder failed");
            PipelineError::Responder(e)
        })?;
        tracing::info!(chars = response.len(), "Responded");

        Ok(Responded { prior, response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        count_appointments, get_patient_records, insert_knowledge_chunk, insert_practitioner,
    };
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::handlers::{ActionPayload, MSG_NO_RECORDS};
    use crate::models::{IntentKind, KnowledgeChunk};
    use crate::pipeline::ollama::MockLlm;
    use crate::pipeline::types::{Stage, StageStatus};
    use crate::pipeline::{
        KeywordClassifier, KnowledgeBaseRetriever, LexiconSentimentEstimator, LlmClassifier,
        LlmError, LlmResponder, LlmSentimentEstimator, RetrievalError, TemplateResponder,
    };
    use chrono::{NaiveDate, NaiveDateTime};
    use rusqlite::Connection;
    use std::cell::Cell;

    // A Monday.
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        insert_practitioner(&conn, "Dr. Smith", Some("Cardiology")).unwrap();
        insert_practitioner(&conn, "Dr. Patel", Some("Dermatology")).unwrap();
        conn
    }

    /// Offline collaborators over `conn`, run once.
    fn run_offline(conn: &Connection, message: &str) -> Result<PipelineRun, PipelineError> {
        let retriever = KnowledgeBaseRetriever::new(conn);
        let pipeline = IntakePipeline::new(
            &KeywordClassifier,
            &LexiconSentimentEstimator,
            &retriever,
            &TemplateResponder,
            HandlerContext::new(conn).with_today(today()),
        );
        pipeline.run(message)
    }

    struct CountingRetriever {
        calls: Cell<usize>,
        result: fn() -> Result<Vec<KnowledgeChunk>, RetrievalError>,
    }

    impl Retriever for CountingRetriever {
        fn retrieve(&self, _topic: &str, _k: usize) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    struct FailingResponder;

    impl Responder for FailingResponder {
        fn respond(&self, _state: &ContextRetrieved) -> Result<String, LlmError> {
            Err(LlmError::Timeout(60))
        }
    }

    #[test]
    fn booking_request_end_to_end() {
        let conn = seeded();
        let run = run_offline(&conn, "Book an appointment with Dr. Smith for Anjali next Monday morning")
            .unwrap();

        assert_eq!(run.intent(), IntentKind::BookAppointment);
        assert!(run.outcome.success);
        match &run.outcome.payload {
            ActionPayload::Booked {
                patient,
                appointment,
                doctor,
                day,
            } => {
                assert_eq!(patient, "Anjali");
                assert_eq!(doctor.name, "Dr. Smith");
                assert_eq!(*day, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
                assert_eq!(appointment.start, at(9, 9, 0));
                assert_eq!(appointment.end, at(9, 9, 30));
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(run.context, RetrievedContext::NotNeeded);
        assert!(run.response.starts_with("Booked Anjali with Dr. Smith on Monday 9 March 2026"));
        let visited: Vec<Stage> = run.stages.iter().map(|r| r.stage).collect();
        assert_eq!(visited, Stage::ALL.to_vec());
        assert!(run.degraded_stages().is_empty());
        assert_eq!(run.stages[3].status, StageStatus::Skipped);
    }

    #[test]
    fn history_for_unknown_patient_still_responds() {
        let conn = seeded();
        let run = run_offline(&conn, "Show medical history for patient Ramesh").unwrap();

        assert_eq!(run.intent(), IntentKind::RetrieveHistory);
        assert!(!run.outcome.success);
        assert_eq!(run.outcome.message.as_deref(), Some(MSG_NO_RECORDS));
        assert_eq!(run.response, "No records found for Ramesh.");
        assert_eq!(run.stages.last().map(|r| r.stage), Some(Stage::Responded));
    }

    #[test]
    fn concurrent_pipelines_book_distinct_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontdesk.db");
        {
            let conn = open_database(&path).unwrap();
            insert_practitioner(&conn, "Dr. Smith", Some("Cardiology")).unwrap();
        }

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = ["Anjali", "Ravi"]
            .into_iter()
            .map(|name| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let conn = open_database(&path).unwrap();
                    let message =
                        format!("Book an appointment with Dr. Smith for {name} next Monday morning");
                    barrier.wait();
                    let run = run_offline(&conn, &message).unwrap();
                    match run.outcome.payload {
                        ActionPayload::Booked { appointment, .. } => appointment.start,
                        other => panic!("{name} was not booked: {other:?}"),
                    }
                })
            })
            .collect();

        let mut starts: Vec<NaiveDateTime> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        starts.sort();
        assert_eq!(starts, vec![at(9, 9, 0), at(9, 9, 30)]);

        let conn = open_database(&path).unwrap();
        assert_eq!(count_appointments(&conn).unwrap(), 2);
    }

    #[test]
    fn record_update_appends_note() {
        let conn = seeded();
        let message = "Update Meera's record: allergic to penicillin";
        let run = run_offline(&conn, message).unwrap();

        assert_eq!(run.intent(), IntentKind::UpdateRecords);
        assert_eq!(run.response, "Added a note to Meera's record.");
        let records = get_patient_records(&conn, "Meera", 5).unwrap();
        assert_eq!(records[0].content, message);
    }

    #[test]
    fn medical_question_uses_knowledge_base() {
        let conn = seeded();
        for (i, text) in [
            "Hypertension often has no symptoms, which is why regular checks matter.",
            "Eczema causes dry, itchy patches of skin.",
        ]
        .iter()
        .enumerate()
        {
            insert_knowledge_chunk(
                &conn,
                &KnowledgeChunk {
                    source: "guide.md".into(),
                    chunk_index: i,
                    content: text.to_string(),
                },
            )
            .unwrap();
        }

        let run = run_offline(&conn, "What are the symptoms of hypertension?").unwrap();
        assert_eq!(run.intent(), IntentKind::MedicalInfo);
        match &run.context {
            RetrievedContext::Passages(passages) => {
                assert_eq!(passages.len(), 1);
                assert!(passages[0].content.starts_with("Hypertension"));
            }
            other => panic!("unexpected context {other:?}"),
        }
        assert!(run.response.contains("[1] Hypertension often has no symptoms"));
    }

    #[test]
    fn empty_knowledge_base_degrades() {
        let conn = seeded();
        let run = run_offline(&conn, "What are the symptoms of hypertension?").unwrap();
        assert!(matches!(run.context, RetrievedContext::Unavailable(_)));
        assert!(run.response.contains("knowledge base is unavailable"));
        assert_eq!(run.degraded_stages(), vec![Stage::ContextRetrieved]);
    }

    #[test]
    fn retriever_only_called_for_medical_questions() {
        let conn = seeded();
        let retriever = CountingRetriever {
            calls: Cell::new(0),
            result: || Ok(Vec::new()),
        };
        let pipeline = IntakePipeline::new(
            &KeywordClassifier,
            &LexiconSentimentEstimator,
            &retriever,
            &TemplateResponder,
            HandlerContext::new(&conn).with_today(today()),
        );

        let run = pipeline.run("hello there").unwrap();
        assert_eq!(run.context, RetrievedContext::NotNeeded);
        assert_eq!(retriever.calls.get(), 0);

        let run = pipeline.run("What is eczema?").unwrap();
        assert_eq!(run.context, RetrievedContext::NoneFound);
        assert_eq!(retriever.calls.get(), 1);
    }

    #[test]
    fn retriever_error_does_not_abort() {
        let conn = seeded();
        let retriever = CountingRetriever {
            calls: Cell::new(0),
            result: || Err(RetrievalError::IndexEmpty),
        };
        let pipeline = IntakePipeline::new(
            &KeywordClassifier,
            &LexiconSentimentEstimator,
            &retriever,
            &TemplateResponder,
            HandlerContext::new(&conn),
        );
        let run = pipeline.run("What is eczema?").unwrap();
        assert_eq!(
            run.context,
            RetrievedContext::Unavailable("Knowledge base has not been built".into())
        );
    }

    #[test]
    fn classifier_outage_falls_back_to_general() {
        let conn = seeded();
        let down = MockLlm::unreachable();
        let classifier = LlmClassifier::new(&down);
        let sentiment = LlmSentimentEstimator::new(&down);
        let retriever = KnowledgeBaseRetriever::new(&conn);
        let pipeline = IntakePipeline::new(
            &classifier,
            &sentiment,
            &retriever,
            &TemplateResponder,
            HandlerContext::new(&conn),
        );

        let run = pipeline.run("Book an appointment with Dr. Smith").unwrap();
        assert_eq!(run.intent(), IntentKind::General);
        assert_eq!(run.classification.confidence, 0.0);
        assert_eq!(run.sentiment, Sentiment::neutral());
        assert_eq!(count_appointments(&conn).unwrap(), 0);
        assert_eq!(
            run.degraded_stages(),
            vec![Stage::Classified, Stage::SentimentScored]
        );
    }

    #[test]
    fn malformed_classifier_output_is_carried() {
        let conn = seeded();
        let chatty = MockLlm::replying("You probably want an appointment!");
        let classifier = LlmClassifier::new(&chatty);
        let retriever = KnowledgeBaseRetriever::new(&conn);
        let pipeline = IntakePipeline::new(
            &classifier,
            &LexiconSentimentEstimator,
            &retriever,
            &TemplateResponder,
            HandlerContext::new(&conn),
        );

        let run = pipeline.run("I need a doctor").unwrap();
        assert_eq!(run.intent(), IntentKind::General);
        assert_eq!(
            run.classification.raw.as_deref(),
            Some("You probably want an appointment!")
        );
        assert_eq!(
            run.stages[0].status,
            StageStatus::Degraded("unparseable classifier output".into())
        );
        assert_eq!(run.stages[1].status, StageStatus::Completed);
    }

    #[test]
    fn llm_collaborators_end_to_end() {
        let conn = seeded();
        let intent_llm = MockLlm::replying(
            r#"{"intent": "book_appointment", "confidence": 0.95,
                "extracted": {"patient_name": "Anjali", "doctor": "Patel", "specialty": null,
                              "date_hint": "tomorrow", "time_hint": "afternoon", "symptoms/topic": "rash"}}"#,
        );
        let sentiment_llm = MockLlm::replying(
            r#"{"sentiment": "negative", "intensity": 0.4, "emotions": ["worried"], "notes": "itchy"}"#,
        );
        let respond_llm = MockLlm::replying("You're booked with Dr. Patel tomorrow at 12:00.");

        let classifier = LlmClassifier::new(&intent_llm);
        let sentiment = LlmSentimentEstimator::new(&sentiment_llm);
        let responder = LlmResponder::new(&respond_llm);
        let retriever = KnowledgeBaseRetriever::new(&conn);
        let pipeline = IntakePipeline::new(
            &classifier,
            &sentiment,
            &retriever,
            &responder,
            HandlerContext::new(&conn).with_today(today()),
        );

        let run = pipeline.run("Can Anjali see Dr Patel tomorrow afternoon about a rash?").unwrap();
        match &run.outcome.payload {
            ActionPayload::Booked {
                appointment,
                doctor,
                ..
            } => {
                assert_eq!(doctor.name, "Dr. Patel");
                assert_eq!(appointment.start, at(3, 12, 0));
                assert_eq!(appointment.reason, "rash");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(run.response, "You're booked with Dr. Patel tomorrow at 12:00.");
        assert_eq!(intent_llm.calls(), 1);
        assert_eq!(sentiment_llm.calls(), 1);
        assert_eq!(respond_llm.calls(), 1);
    }

    #[test]
    fn responder_failure_surfaces_after_side_effects() {
        let conn = seeded();
        let retriever = KnowledgeBaseRetriever::new(&conn);
        let pipeline = IntakePipeline::new(
            &KeywordClassifier,
            &LexiconSentimentEstimator,
            &retriever,
            &FailingResponder,
            HandlerContext::new(&conn).with_today(today()),
        );

        let err = pipeline
            .run("Book an appointment with Dr. Smith for Anjali next Monday morning")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Responder(LlmError::Timeout(60))));
        assert_eq!(count_appointments(&conn).unwrap(), 1);
    }

    #[test]
    fn storage_failure_aborts_run() {
        let conn = seeded();
        conn.execute_batch("DROP TABLE patient_records").unwrap();

        let err = run_offline(&conn, "Update Meera's record: allergic to penicillin").unwrap_err();
        assert!(matches!(err, PipelineError::Database(_)));
    }

    #[test]
    fn run_serializes_for_inspection() {
        let conn = seeded();
        let run = run_offline(&conn, "Show medical history for patient Ramesh").unwrap();
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["classification"]["intent"], "retrieve_history");
        assert_eq!(json["outcome"]["success"], false);
        assert_eq!(json["context"]["status"], "not_needed");
        assert_eq!(json["stages"][0]["stage"], "classified");
        assert_eq!(json["stages"][0]["status"], "completed");
        assert_eq!(json["stages"][3]["status"], "skipped");
        assert_eq!(json["stages"][4]["stage"], "responded");
    }
}
