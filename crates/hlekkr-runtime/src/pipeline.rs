//! The pipeline orchestrator
//!
//! One media item flows upload -> security scan -> metadata extraction ->
//! source verification -> deepfake analysis -> trust score -> optional
//! human review -> discrepancy detection -> threat intelligence. Every
//! stage writes its result to the audit trail and appends a custody event;
//! later stages rebuild their inputs from the trail, so any worker can pick
//! up any stage.

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hlekkr_analysis::{DeepfakeAnalyzer, DetectionResult, ModelRoster};
use hlekkr_core::{
    AuditEvent, AuditEventType, HandlerResponse, MediaItem, PipelineError, ProcessingStage,
    Severity,
};
use hlekkr_custody::{CustodyLedger, CustodySigner, RecordRequest, StaticKeySource};
use hlekkr_discrepancy::{DiscrepancyDetector, MediaEvidence};
use hlekkr_extract::{ExtractedMetadata, MetadataExtractor};
use hlekkr_model::{MockInvoker, ModelInvoker, TimedInvoker};
use hlekkr_persist::{AuditStore, DocumentBackend, DocumentExt, MemoryObjectStore, ObjectStore};
use hlekkr_review::{
    CompletionValidator, DecisionInput, DecisionStore, ModeratorStore, ReviewItem, ReviewLifecycle,
    ReviewPriority, ReviewStore,
};
use hlekkr_score::{AnalysisBundle, HumanDecisionInput, TrustScoreEngine, TrustScoreVersion};
use hlekkr_threat::{ThreatContext, ThreatIntelProcessor};
use hlekkr_verify::{
    NoCrossReferencer, ReputationList, SourceInfo, SourceVerification, SourceVerifier,
    StaticDomainIntel, StaticFetcher,
};

use crate::bus::{MemoryBus, Notification, NotificationBus, Topic};
use crate::config::HlekkrConfig;
use crate::metrics::PipelineMetrics;
use crate::retry::retry_with_backoff;
use crate::scanner::SecurityScanner;
use crate::worker::QueueMessage;

/// Media registration row: the item plus its claimed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MediaRecord {
    media: MediaItem,
    source_info: Option<SourceInfo>,
}

/// Fully wired pipeline.
pub struct Pipeline<B: DocumentBackend + ?Sized> {
    config: HlekkrConfig,
    backend: Arc<B>,
    audit: AuditStore<B>,
    ledger: CustodyLedger<B>,
    scanner: SecurityScanner,
    extractor: MetadataExtractor,
    verifier: SourceVerifier,
    analyzer: DeepfakeAnalyzer,
    engine: TrustScoreEngine<B>,
    detector: DiscrepancyDetector,
    lifecycle: ReviewLifecycle<B>,
    completion: CompletionValidator<B>,
    threat: ThreatIntelProcessor<B>,
    bus: Arc<dyn NotificationBus>,
    metrics: Arc<PipelineMetrics>,
    degraded: AtomicBool,
}

/// Builder for the pipeline; every collaborator is injectable, with
/// in-memory defaults suitable for tests and single-node runs.
pub struct PipelineBuilder<B: DocumentBackend + ?Sized> {
    config: HlekkrConfig,
    backend: Arc<B>,
    objects: Option<Arc<dyn ObjectStore>>,
    invoker: Option<Arc<dyn ModelInvoker>>,
    verifier: Option<SourceVerifier>,
    bus: Option<Arc<dyn NotificationBus>>,
    signer: Option<CustodySigner>,
}

impl<B: DocumentBackend + ?Sized + 'static> PipelineBuilder<B> {
    pub fn new(backend: Arc<B>, config: HlekkrConfig) -> Self {
        Self {
            config,
            backend,
            objects: None,
            invoker: None,
            verifier: None,
            bus: None,
            signer: None,
        }
    }

    pub fn objects(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn verifier(mut self, verifier: SourceVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn bus(mut self, bus: Arc<dyn NotificationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn signer(mut self, signer: CustodySigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub async fn build(self) -> Result<Pipeline<B>, PipelineError> {
        let objects = self
            .objects
            .unwrap_or_else(|| Arc::new(MemoryObjectStore::new()));
        let invoker = self.invoker.unwrap_or_else(|| {
            Arc::new(TimedInvoker::wrap(MockInvoker::constant(
                r#"{"confidence": 0.5, "techniques": [], "certainty": "medium"}"#,
            )))
        });
        let bus = self.bus.unwrap_or_else(|| Arc::new(MemoryBus::new()));

        let signer = match self.signer {
            Some(signer) => signer,
            None => {
                let secret = self
                    .config
                    .signing_secret
                    .clone()
                    .unwrap_or_else(|| "dev-signing-secret".to_string());
                let source = StaticKeySource::new(secret.as_bytes());
                if self.config.production {
                    CustodySigner::initialize_production(&source).await?
                } else {
                    CustodySigner::initialize(&source).await?
                }
            }
        };

        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => SourceVerifier::new(
                Arc::new(ReputationList::with_seeds()),
                Arc::new(StaticDomainIntel::default()),
                Arc::new(StaticFetcher::default()),
                Arc::new(NoCrossReferencer),
            ),
        };

        let roster = ModelRoster {
            detailed: self.config.detailed_model.clone(),
            fast: self.config.fast_model.clone(),
            supplementary: self.config.supplementary_model.clone(),
        };
        let frames = Arc::new(hlekkr_analysis::video::ByteWindowExtractor::new(
            objects.clone(),
        ));
        let prober = Arc::new(hlekkr_extract::HeaderProber::new(objects.clone()));

        Ok(Pipeline {
            scanner: SecurityScanner::new(objects.clone()),
            extractor: MetadataExtractor::new(objects.clone(), prober),
            analyzer: DeepfakeAnalyzer::new(invoker, objects.clone(), frames, roster),
            audit: AuditStore::new(self.backend.clone()),
            ledger: CustodyLedger::new(self.backend.clone(), signer),
            engine: TrustScoreEngine::new(self.backend.clone()),
            detector: DiscrepancyDetector::new(),
            lifecycle: ReviewLifecycle::new(
                ReviewStore::new(self.backend.clone()),
                ModeratorStore::new(self.backend.clone()),
            ),
            completion: CompletionValidator::new(
                ReviewStore::new(self.backend.clone()),
                ModeratorStore::new(self.backend.clone()),
                DecisionStore::new(self.backend.clone()),
            ),
            threat: ThreatIntelProcessor::new(self.backend.clone()),
            verifier,
            backend: self.backend,
            config: self.config,
            bus,
            metrics: Arc::new(PipelineMetrics::new()),
            degraded: AtomicBool::new(false),
        })
    }
}

impl<B: DocumentBackend + ?Sized + 'static> Pipeline<B> {
    pub fn builder(backend: Arc<B>, config: HlekkrConfig) -> PipelineBuilder<B> {
        PipelineBuilder::new(backend, config)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn ledger(&self) -> &CustodyLedger<B> {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditStore<B> {
        &self.audit
    }

    pub fn engine(&self) -> &TrustScoreEngine<B> {
        &self.engine
    }

    pub fn lifecycle(&self) -> &ReviewLifecycle<B> {
        &self.lifecycle
    }

    pub fn threat(&self) -> &ThreatIntelProcessor<B> {
        &self.threat
    }

    /// Backpressure toggle from the worker's observed queue depth.
    pub fn set_backpressure(&self, queue_depth: usize) {
        let degraded = queue_depth > self.config.backpressure_queue_depth;
        if degraded != self.degraded.swap(degraded, Ordering::Relaxed) {
            tracing::warn!(queue_depth, degraded, "backpressure state changed");
            self.analyzer.set_degraded(degraded);
        }
    }

    /// Dispatch a queue or scheduler message to the right handler.
    pub async fn dispatch(&self, message: QueueMessage) -> HandlerResponse {
        let result = match message {
            QueueMessage::Scheduler { detail_type } => self.handle_scheduler(&detail_type).await,
            QueueMessage::Stage {
                media_id, stage, ..
            } => match ProcessingStage::from_str(&stage) {
                Ok(stage) => self.handle_stage(&media_id, stage).await,
                Err(e) => Err(e),
            },
        };
        HandlerResponse::from(result)
    }

    async fn handle_scheduler(&self, detail_type: &str) -> Result<serde_json::Value, PipelineError> {
        let report = match detail_type {
            "timeout-check" => self.lifecycle.timeout_sweep().await?,
            "reassignment-check" => self.lifecycle.reassignment_sweep().await?,
            "escalation-check" => self.lifecycle.escalation_sweep().await?,
            "cleanup" => self.lifecycle.cleanup_sweep().await?,
            other => {
                return Err(PipelineError::input_invalid(format!(
                    "unknown scheduler detail-type: {other}"
                )))
            }
        };
        for review_id in &report.expired {
            self.publish(
                Topic::ModeratorAlerts,
                Notification::new("REVIEW_TIMEOUT", Severity::Medium, review_id, json!({})),
            )
            .await;
        }
        Ok(serde_json::to_value(&report)
            .map_err(|e| PipelineError::store(format!("serialize sweep report: {e}")))?)
    }

    /// Register an upload and record the first custody link.
    pub async fn ingest(
        &self,
        media: MediaItem,
        source_info: Option<SourceInfo>,
    ) -> Result<(), PipelineError> {
        let record = MediaRecord {
            media: media.clone(),
            source_info,
        };
        // Create-if-absent: duplicate submissions are idempotent
        match self
            .backend
            .cas(&Self::media_key(&media.media_id), None, &record)
            .await
        {
            Ok(()) => {}
            Err(hlekkr_persist::StorageError::ConditionFailed(_)) => {
                tracing::info!(media_id = %media.media_id, "duplicate upload ignored");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        self.audit
            .append(&AuditEvent::new(
                &media.media_id,
                AuditEventType::MediaUpload,
                "ingest",
                json!({
                    "bucket": media.location.bucket,
                    "key": media.location.key,
                    "mediaType": media.kind.as_str(),
                }),
            ))
            .await
            .map_err(PipelineError::from)?;

        self.ledger
            .record(RecordRequest {
                media_id: media.media_id.clone(),
                stage: ProcessingStage::Upload,
                actor: "ingest".to_string(),
                action: "media_uploaded".to_string(),
                output_content: Some(json!({"key": media.location.key})),
                metadata: json!({"mediaType": media.kind.as_str()}),
                ..Default::default()
            })
            .await?;

        self.metrics.incr(&self.metrics.media_processed);
        Ok(())
    }

    /// Run the whole pipeline for one already-ingested media item.
    pub async fn process_media(&self, media_id: &str) -> Result<(), PipelineError> {
        for stage in [
            ProcessingStage::SecurityScan,
            ProcessingStage::MetadataExtraction,
            ProcessingStage::SourceVerification,
            ProcessingStage::DeepfakeAnalysis,
            ProcessingStage::TrustScoreCalculation,
        ] {
            self.handle_stage(media_id, stage).await?;
        }
        Ok(())
    }

    /// Run one stage with the stage deadline applied. Deadline and other
    /// recoverable failures record a synthetic failure event and let the
    /// pipeline continue; fatal errors surface.
    pub async fn handle_stage(
        &self,
        media_id: &str,
        stage: ProcessingStage,
    ) -> Result<serde_json::Value, PipelineError> {
        let deadline = Duration::from_secs(self.config.stage_deadline_secs);
        let run = async {
            match stage {
                ProcessingStage::SecurityScan => self.run_security_scan(media_id).await,
                ProcessingStage::MetadataExtraction => self.run_extraction(media_id).await,
                ProcessingStage::SourceVerification => self.run_verification(media_id).await,
                ProcessingStage::DeepfakeAnalysis => self.run_analysis(media_id).await,
                ProcessingStage::TrustScoreCalculation => self.run_scoring(media_id).await,
                other => Err(PipelineError::input_invalid(format!(
                    "stage {other} is not queue-triggered"
                ))),
            }
        };

        let result = match tokio::time::timeout(deadline, run).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(format!(
                "stage {stage} exceeded {}s",
                deadline.as_secs()
            ))),
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_recoverable() => {
                self.record_stage_failure(media_id, stage, &e).await?;
                Ok(json!({"stage": stage.as_str(), "failed": true, "error": e.to_string()}))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_security_scan(&self, media_id: &str) -> Result<serde_json::Value, PipelineError> {
        let record = self.media_record(media_id).await?;
        let scan = self.scanner.scan(media_id, &record.media.location).await?;

        if scan.threat_detected {
            self.metrics.incr(&self.metrics.scan_threats_detected);
        }
        if let Some(quarantined_to) = &scan.quarantined_to {
            self.metrics.incr(&self.metrics.quarantined);
            // Track the moved object for the rest of the pipeline
            let mut updated = record.clone();
            updated.media.location.key = quarantined_to.clone();
            self.backend
                .cas(&Self::media_key(media_id), Some(&record), &updated)
                .await
                .map_err(PipelineError::from)?;
            self.publish(
                Topic::SecurityAlerts,
                Notification::new(
                    "THREAT_QUARANTINED",
                    scan.threat_level.unwrap_or(Severity::High),
                    media_id,
                    json!({"quarantinedTo": quarantined_to, "threats": scan.threats}),
                ),
            )
            .await;
        }

        let scan_value = serde_json::to_value(&scan)
            .map_err(|e| PipelineError::store(format!("serialize scan: {e}")))?;
        self.record_stage(
            media_id,
            AuditEventType::SecurityScan,
            ProcessingStage::SecurityScan,
            "security_scanner",
            scan_value.clone(),
        )
        .await?;
        Ok(scan_value)
    }

    async fn run_extraction(&self, media_id: &str) -> Result<serde_json::Value, PipelineError> {
        let record = self.media_record(media_id).await?;
        let metadata = self
            .extractor
            .extract(media_id, &record.media.location, record.media.uploaded_at)
            .await?;

        let value = serde_json::to_value(&metadata)
            .map_err(|e| PipelineError::store(format!("serialize metadata: {e}")))?;
        self.record_stage(
            media_id,
            AuditEventType::MetadataExtraction,
            ProcessingStage::MetadataExtraction,
            "metadata_extractor",
            value.clone(),
        )
        .await?;
        Ok(value)
    }

    async fn run_verification(&self, media_id: &str) -> Result<serde_json::Value, PipelineError> {
        let record = self.media_record(media_id).await?;
        let Some(source_info) = record.source_info.clone() else {
            tracing::debug!(media_id, "no source info supplied, skipping verification");
            return Ok(json!({"skipped": true}));
        };

        let verification = self.verifier.verify(media_id, source_info).await?;
        let value = serde_json::to_value(&verification)
            .map_err(|e| PipelineError::store(format!("serialize verification: {e}")))?;
        self.record_stage(
            media_id,
            AuditEventType::SourceVerification,
            ProcessingStage::SourceVerification,
            "source_verifier",
            value.clone(),
        )
        .await?;
        Ok(value)
    }

    async fn run_analysis(&self, media_id: &str) -> Result<serde_json::Value, PipelineError> {
        let record = self.media_record(media_id).await?;
        let detection = match self.analyzer.analyze(&record.media).await {
            Ok(detection) => detection,
            Err(e) if e.is_recoverable() => {
                self.metrics.incr(&self.metrics.model_failures);
                tracing::warn!(media_id, error = %e, "analysis degraded to error sentinel");
                DetectionResult::error_result(media_id)
            }
            Err(e) => return Err(e),
        };

        self.metrics.incr(&self.metrics.analyses_completed);
        let value = serde_json::to_value(&detection)
            .map_err(|e| PipelineError::store(format!("serialize detection: {e}")))?;
        self.record_stage(
            media_id,
            AuditEventType::DeepfakeAnalysis,
            ProcessingStage::DeepfakeAnalysis,
            "deepfake_analyzer",
            value.clone(),
        )
        .await?;
        Ok(value)
    }

    async fn run_scoring(&self, media_id: &str) -> Result<serde_json::Value, PipelineError> {
        let bundle = self.gather_bundle(media_id).await?;
        let version = retry_with_backoff(|| async { self.engine.calculate(&bundle).await }).await?;
        self.metrics.incr(&self.metrics.scores_calculated);

        let value = serde_json::to_value(&version)
            .map_err(|e| PipelineError::store(format!("serialize score: {e}")))?;
        self.record_stage(
            media_id,
            AuditEventType::TrustScoreCalculation,
            ProcessingStage::TrustScoreCalculation,
            "trust_score_engine",
            value.clone(),
        )
        .await?;

        // Low trust or strong deepfake indicators both demand a human look
        let strong_indicators = bundle
            .detection
            .as_ref()
            .is_some_and(|d| d.deepfake_confidence > 0.7);
        if version.composite_score < self.config.review_threshold || strong_indicators {
            self.open_review(media_id, &version).await?;
        }

        self.run_discrepancy_detection(media_id).await?;
        Ok(value)
    }

    /// Open a human review for a low-scoring item.
    async fn open_review(
        &self,
        media_id: &str,
        version: &TrustScoreVersion,
    ) -> Result<ReviewItem, PipelineError> {
        let priority = if version.composite_score < 10.0 {
            ReviewPriority::Critical
        } else if version.composite_score < 20.0 {
            ReviewPriority::High
        } else if version.composite_score < 30.0 {
            ReviewPriority::Normal
        } else {
            ReviewPriority::Low
        };
        let review = ReviewItem::new(
            media_id,
            priority,
            json!({
                "trustScore": version.composite_score,
                "confidence": ai_confidence_for(version),
                "scoreRange": version.score_range.as_str(),
            }),
        );
        self.lifecycle.reviews().create(&review).await?;
        self.metrics.incr(&self.metrics.reviews_opened);
        self.publish(
            Topic::ModeratorAlerts,
            Notification::new(
                "REVIEW_OPENED",
                Severity::Medium,
                media_id,
                json!({"reviewId": review.review_id, "priority": priority.as_str()}),
            ),
        )
        .await;
        tracing::info!(media_id, review_id = %review.review_id, priority = priority.as_str(), "human review opened");
        Ok(review)
    }

    /// Complete a review and drive every downstream effect.
    pub async fn complete_review(
        &self,
        review_id: &str,
        moderator_id: &str,
        input: DecisionInput,
    ) -> Result<serde_json::Value, PipelineError> {
        let outcome = self
            .completion
            .complete(review_id, moderator_id, input)
            .await?;
        self.metrics.incr(&self.metrics.reviews_completed);
        let media_id = outcome.decision.media_id.clone();

        // Feedback event for the model-improvement loop
        self.audit
            .append(&AuditEvent::new(
                &media_id,
                AuditEventType::AiFeedback,
                "review_completion_validator",
                json!({
                    "reviewId": review_id,
                    "decisionType": outcome.decision.decision_type.as_str(),
                    "feedbackType": outcome.feedback_type,
                    "warnings": outcome.warnings,
                }),
            ))
            .await
            .map_err(PipelineError::from)?;

        self.audit
            .append(&AuditEvent::new(
                &media_id,
                AuditEventType::ReviewDecision,
                "review_completion_validator",
                json!({
                    "reviewId": review_id,
                    "decisionId": outcome.decision.decision_id,
                    "decisionType": outcome.decision.decision_type.as_str(),
                }),
            ))
            .await
            .map_err(PipelineError::from)?;

        self.ledger
            .record(RecordRequest {
                media_id: media_id.clone(),
                stage: ProcessingStage::HumanReview,
                actor: format!("moderator:{moderator_id}"),
                action: "review_completed".to_string(),
                output_content: Some(json!({
                    "decisionId": outcome.decision.decision_id,
                    "decisionType": outcome.decision.decision_type.as_str(),
                })),
                ..Default::default()
            })
            .await?;

        // Rescore with the human decision folded in
        let bundle = self.gather_bundle(&media_id).await?;
        let human = HumanDecisionInput {
            review_id: review_id.to_string(),
            decision_type: outcome.decision.decision_type.as_str().to_string(),
            trust_score_adjustment: outcome.decision.trust_score_adjustment,
            confidence_level: outcome.decision.confidence_level.as_str().to_string(),
        };
        let rescored = retry_with_backoff(|| async {
            self.engine.recalculate_with_human(&bundle, &human).await
        })
        .await?;
        self.metrics.incr(&self.metrics.scores_calculated);

        // Threat intelligence for confirm/suspicious outcomes
        let mut threat_summary = json!({"processed": false});
        if outcome.threat_eligible {
            let context = self.threat_context(&media_id, &bundle).await?;
            let threat = self
                .threat
                .process_decision(&outcome.decision, &context)
                .await?;
            self.metrics
                .add(&self.metrics.threat_indicators, threat.indicators.len() as u64);
            if let Some(report) = &threat.report {
                self.metrics.incr(&self.metrics.threat_reports);
                if threat.alert_required {
                    self.publish(
                        Topic::ThreatAlerts,
                        Notification::new(
                            "THREAT_REPORT",
                            report.severity,
                            &report.report_id,
                            json!({"threatType": report.threat_type.as_str(), "mediaId": media_id}),
                        ),
                    )
                    .await;
                }
            }
            threat_summary = json!({
                "processed": true,
                "indicators": threat.indicators.len(),
                "report": threat.report.as_ref().map(|r| r.report_id.clone()),
            });
        }

        Ok(json!({
            "reviewId": review_id,
            "decisionId": outcome.decision.decision_id,
            "warnings": outcome.warnings,
            "rescoredComposite": rescored.composite_score,
            "threat": threat_summary,
        }))
    }

    /// Discrepancy detection over everything recorded so far.
    pub async fn run_discrepancy_detection(
        &self,
        media_id: &str,
    ) -> Result<Vec<hlekkr_discrepancy::Discrepancy>, PipelineError> {
        let bundle = self.gather_bundle(media_id).await?;
        let custody_chain = self.ledger.get_chain(media_id).await?;
        let trust_score = self.engine.store().latest(media_id).await?;

        let record = self.media_record(media_id).await.ok();
        let source_publication_date = record
            .as_ref()
            .and_then(|r| r.source_info.as_ref())
            .and_then(|s| s.publication_date.as_deref())
            .and_then(|d| chrono::DateTime::parse_from_rfc3339(&d.replace('Z', "+00:00")).ok())
            .map(|d| d.with_timezone(&Utc));
        let domain_uploads_last_hour = match record
            .as_ref()
            .and_then(|r| r.source_info.as_ref())
            .and_then(|s| s.domain.clone())
        {
            Some(domain) => self.count_domain_uploads(&domain).await?,
            None => 0,
        };

        let evidence = MediaEvidence {
            media_id: media_id.to_string(),
            source: bundle.source.clone(),
            source_publication_date,
            metadata: bundle.metadata.clone(),
            custody_chain,
            trust_score,
            audit_events: bundle.audit_events.clone(),
            domain_uploads_last_hour,
        };

        let findings = self.detector.analyze(&evidence);
        self.metrics
            .add(&self.metrics.discrepancies_found, findings.len() as u64);

        for finding in &findings {
            self.audit
                .append(&AuditEvent::new(
                    media_id,
                    AuditEventType::DiscrepancyDetected,
                    "discrepancy_detector",
                    serde_json::to_value(finding)
                        .map_err(|e| PipelineError::store(format!("serialize finding: {e}")))?,
                ))
                .await
                .map_err(PipelineError::from)?;

            if finding.severity == Severity::Critical {
                self.publish(
                    Topic::DiscrepancyAlerts,
                    Notification::new(
                        "CRITICAL_DISCREPANCY",
                        Severity::Critical,
                        media_id,
                        json!({
                            "discrepancyType": finding.discrepancy_type.as_str(),
                            "description": finding.description,
                        }),
                    ),
                )
                .await;
            }
        }
        Ok(findings)
    }

    /// Rebuild the analysis bundle from the audit trail.
    pub async fn gather_bundle(&self, media_id: &str) -> Result<AnalysisBundle, PipelineError> {
        let audit_events = self
            .audit
            .events_for_media(media_id)
            .await
            .map_err(PipelineError::from)?;

        let detection: Option<DetectionResult> =
            latest_payload(&audit_events, AuditEventType::DeepfakeAnalysis);
        let source: Option<SourceVerification> =
            latest_payload(&audit_events, AuditEventType::SourceVerification);
        let metadata: Option<ExtractedMetadata> =
            latest_payload(&audit_events, AuditEventType::MetadataExtraction);
        let custody = self.ledger.summary(media_id).await.ok();

        Ok(AnalysisBundle {
            media_id: media_id.to_string(),
            detection,
            source,
            metadata,
            custody,
            audit_events,
        })
    }

    async fn threat_context(
        &self,
        media_id: &str,
        bundle: &AnalysisBundle,
    ) -> Result<ThreatContext, PipelineError> {
        let content_hash = bundle.metadata.as_ref().and_then(|m| m.etag.clone());
        let file_signature = bundle
            .metadata
            .as_ref()
            .and_then(|m| m.technical_metadata.probe.as_ref())
            .and_then(|p| p.format.clone());
        let techniques = bundle
            .detection
            .as_ref()
            .map(|d| d.detected_techniques.clone())
            .unwrap_or_default();
        let ai_confidence = bundle
            .detection
            .as_ref()
            .map(|d| d.deepfake_confidence.max(0.0))
            .unwrap_or(0.0);
        let source_domain = bundle.source.as_ref().and_then(|s| s.domain.clone());

        // Suspicious patterns come from the findings already persisted by
        // the discrepancy stage, not a fresh (re-recording) run
        let suspicious_patterns = bundle
            .audit_events
            .iter()
            .filter(|e| e.event_type == AuditEventType::DiscrepancyDetected)
            .filter_map(|e| {
                serde_json::from_value::<hlekkr_discrepancy::Discrepancy>(e.data.clone()).ok()
            })
            .filter(|f| {
                f.discrepancy_type == hlekkr_discrepancy::DiscrepancyType::SuspiciousPattern
            })
            .map(|f| f.evidence)
            .collect();

        Ok(ThreatContext {
            media_id: media_id.to_string(),
            content_hash,
            source_domain,
            manipulation_techniques: techniques,
            suspicious_patterns,
            file_signature,
            novel_technique: false,
            ai_confidence,
        })
    }

    async fn count_domain_uploads(&self, domain: &str) -> Result<usize, PipelineError> {
        let now = Utc::now();
        let uploads = self
            .audit
            .events_by_type(AuditEventType::MediaUpload, now - ChronoDuration::hours(1), now)
            .await
            .map_err(PipelineError::from)?;
        let mut count = 0;
        for upload in uploads {
            if let Ok(record) = self.media_record(&upload.media_id).await {
                if record
                    .source_info
                    .as_ref()
                    .and_then(|s| s.domain.as_deref())
                    == Some(domain)
                {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn record_stage(
        &self,
        media_id: &str,
        event_type: AuditEventType,
        stage: ProcessingStage,
        actor: &str,
        payload: serde_json::Value,
    ) -> Result<(), PipelineError> {
        self.audit
            .append(&AuditEvent::new(media_id, event_type, actor, payload.clone()))
            .await
            .map_err(PipelineError::from)?;
        self.ledger
            .record_processing_step(media_id, stage, actor, None, Some(payload), json!({}))
            .await?;
        Ok(())
    }

    async fn record_stage_failure(
        &self,
        media_id: &str,
        stage: ProcessingStage,
        error: &PipelineError,
    ) -> Result<(), PipelineError> {
        self.metrics.incr(&self.metrics.stage_failures);
        let failure_kind = match error {
            PipelineError::ExtractionFailed(_) => "extractionFailed",
            _ => "analysisFailed",
        };
        self.audit
            .append(&AuditEvent::new(
                media_id,
                stage_event_type(stage),
                "pipeline",
                json!({failure_kind: true, "error": error.to_string(), "stage": stage.as_str()}),
            ))
            .await
            .map_err(PipelineError::from)?;
        // The chain stays intact: the failure itself is a custody event
        self.ledger
            .record(RecordRequest {
                media_id: media_id.to_string(),
                stage,
                actor: "pipeline".to_string(),
                action: format!("{stage}_failed"),
                metadata: json!({"error": error.to_string()}),
                ..Default::default()
            })
            .await?;
        tracing::warn!(media_id, stage = stage.as_str(), error = %error, "stage failure recorded");
        Ok(())
    }

    fn media_key(media_id: &str) -> String {
        format!("media:{media_id}")
    }

    async fn media_record(&self, media_id: &str) -> Result<MediaRecord, PipelineError> {
        self.backend
            .get::<MediaRecord>(&Self::media_key(media_id))
            .await
            .map_err(PipelineError::from)?
            .ok_or_else(|| PipelineError::not_found(format!("media {media_id}")))
    }

    async fn publish(&self, topic: Topic, notification: Notification) {
        self.metrics.incr(&self.metrics.alerts_published);
        if let Err(e) = self.bus.publish(topic, notification).await {
            // Alerting must never break the pipeline
            tracing::error!(error = %e, topic = topic.as_str(), "notification publish failed");
        }
    }
}

fn stage_event_type(stage: ProcessingStage) -> AuditEventType {
    match stage {
        ProcessingStage::Upload => AuditEventType::MediaUpload,
        ProcessingStage::SecurityScan => AuditEventType::SecurityScan,
        ProcessingStage::MetadataExtraction => AuditEventType::MetadataExtraction,
        ProcessingStage::SourceVerification => AuditEventType::SourceVerification,
        ProcessingStage::DeepfakeAnalysis => AuditEventType::DeepfakeAnalysis,
        ProcessingStage::TrustScoreCalculation => AuditEventType::TrustScoreCalculation,
        ProcessingStage::HumanReview | ProcessingStage::FinalVerification | ProcessingStage::Unknown => {
            AuditEventType::ChainOfCustody
        }
    }
}

fn latest_payload<T: serde::de::DeserializeOwned>(
    events: &[AuditEvent],
    event_type: AuditEventType,
) -> Option<T> {
    events
        .iter()
        .rev()
        .find(|e| e.event_type == event_type)
        .and_then(|e| serde_json::from_value(e.data.clone()).ok())
}

fn ai_confidence_for(version: &TrustScoreVersion) -> f64 {
    match version.confidence {
        hlekkr_score::ScoreConfidence::High => 0.9,
        hlekkr_score::ScoreConfidence::Medium => 0.6,
        hlekkr_score::ScoreConfidence::Low => 0.3,
    }
}
