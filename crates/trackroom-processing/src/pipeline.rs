//! Pipeline orchestrator
//!
//! One job runs its steps strictly in sequence:
//! `Created -> Fetched -> Probed -> [Quantized] -> Previewed -> Analyzed -> Published`.
//! A fatal step error goes straight to a failed publish. The scratch directory is
//! released after every terminal outcome.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use trackroom_core::{SongMediaUpdate, StorageEvent};
use trackroom_db::SongMediaStore;
use trackroom_storage::ObjectStorage;
use uuid::Uuid;

use crate::audio::{FormatProber, PreviewEncoder, QuantizeDecision, Quantizer, WaveformAnalyzer};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::fetch_original;
use crate::publisher::ResultPublisher;
use crate::scratch::ScratchSpace;
use crate::tool::ToolRunner;
use crate::trigger::{TriggerDecision, TriggerReceiver};

/// A validated request to process one uploaded original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingJob {
    pub song_id: Uuid,
    pub source_bucket: String,
    pub object_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Created,
    Fetched,
    Probed,
    Quantized,
    Previewed,
    Analyzed,
    Published,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Created => "created",
            JobStage::Fetched => "fetched",
            JobStage::Probed => "probed",
            JobStage::Quantized => "quantized",
            JobStage::Previewed => "previewed",
            JobStage::Analyzed => "analyzed",
            JobStage::Published => "published",
        }
    }
}

/// Terminal result of a job, after the record store was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        song_id: Uuid,
        audio_url: String,
        preview_url: String,
        preview_path: String,
        quantized: bool,
        /// Replaced original left behind in the source bucket.
        #[serde(skip_serializing_if = "Option::is_none")]
        orphaned_original: Option<String>,
    },
    Failed {
        song_id: Uuid,
        stage: JobStage,
        error: String,
    },
}

impl JobOutcome {
    pub fn song_id(&self) -> Uuid {
        match self {
            JobOutcome::Succeeded { song_id, .. } | JobOutcome::Failed { song_id, .. } => *song_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Mutable per-job bookkeeping.
struct JobState {
    stage: JobStage,
    canonical_path: String,
    quantized: bool,
    orphaned_original: Option<String>,
}

impl JobState {
    fn new(job: &ProcessingJob) -> Self {
        Self {
            stage: JobStage::Created,
            canonical_path: job.object_path.clone(),
            quantized: false,
            orphaned_original: None,
        }
    }

    fn advance(&mut self, stage: JobStage) {
        tracing::debug!(from = self.stage.as_str(), to = stage.as_str(), "Job stage");
        self.stage = stage;
    }

    /// Canonical path to carry on a failure update, if it was replaced.
    fn replaced_path(&self) -> Option<&str> {
        self.quantized.then_some(self.canonical_path.as_str())
    }
}

struct PublishedPreview {
    update: SongMediaUpdate,
    preview_path: String,
}

pub struct PreviewPipeline {
    config: PipelineConfig,
    receiver: TriggerReceiver,
    storage: Arc<dyn ObjectStorage>,
    prober: FormatProber,
    quantizer: Quantizer,
    encoder: PreviewEncoder,
    analyzer: WaveformAnalyzer,
    publisher: ResultPublisher,
    jobs: Arc<Semaphore>,
}

impl PreviewPipeline {
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn SongMediaStore>,
        tools: Arc<dyn ToolRunner>,
    ) -> Self {
        let receiver = TriggerReceiver::new(config.source_bucket.clone());
        let prober = FormatProber::new(tools.clone(), &config.ffprobe_path, config.probe_timeout);
        let quantizer = Quantizer::new(
            tools.clone(),
            storage.clone(),
            &config.ffmpeg_path,
            config.quantize_timeout,
            config.source_bucket.clone(),
        );
        let encoder = PreviewEncoder::new(
            tools.clone(),
            storage.clone(),
            &config.ffmpeg_path,
            config.encode_timeout,
            config.preview_bucket.clone(),
            config.preview_bitrate_kbps,
            config.preview_sample_rate,
            config.preview_duration,
            config.preview_start,
        );
        let analyzer = WaveformAnalyzer::new(
            tools,
            &config.ffmpeg_path,
            config.analyze_timeout,
            config.waveform_buckets,
            config.waveform_sample_rate,
            config.preview_duration,
            config.waveform_reduction,
        );
        let publisher = ResultPublisher::new(
            store,
            storage.clone(),
            config.preview_bucket.clone(),
            config.preview_url_mode,
            config.signed_url_ttl,
        );
        let jobs = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        Self {
            config,
            receiver,
            storage,
            prober,
            quantizer,
            encoder,
            analyzer,
            publisher,
            jobs,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn receiver(&self) -> &TriggerReceiver {
        &self.receiver
    }

    /// Validate an inbound event and, for the source bucket, run the job to completion.
    ///
    /// Returns `Ok(None)` for events that are acknowledged without work.
    #[tracing::instrument(skip(self, event), fields(bucket = %event.record.bucket_id, name = %event.record.name))]
    pub async fn handle_event(
        &self,
        event: &StorageEvent,
    ) -> Result<Option<JobOutcome>, PipelineError> {
        match self.receiver.accept(event)? {
            TriggerDecision::Ignore { .. } => Ok(None),
            TriggerDecision::Start(job) => Ok(Some(self.process(job).await)),
        }
    }

    /// Run a job on its own task.
    pub fn spawn(self: &Arc<Self>, job: ProcessingJob) -> JoinHandle<JobOutcome> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.process(job).await })
    }

    /// Run one job to a terminal, published state.
    #[tracing::instrument(skip(self, job), fields(song_id = %job.song_id, object_path = %job.object_path))]
    pub async fn process(&self, job: ProcessingJob) -> JobOutcome {
        let _permit = self.jobs.acquire().await.ok();
        let start = Instant::now();
        let mut state = JobState::new(&job);

        let scratch = match ScratchSpace::create(self.config.scratch_dir.as_deref()) {
            Ok(scratch) => scratch,
            Err(e) => return self.fail(&job, &state, e).await,
        };

        let outcome = match self.run_steps(&job, &scratch, &mut state).await {
            Ok(published) => match self.publisher.publish_success(&published.update).await {
                Ok(()) => {
                    state.advance(JobStage::Published);
                    JobOutcome::Succeeded {
                        song_id: job.song_id,
                        audio_url: published.update.audio_url,
                        preview_url: published.update.preview_url,
                        preview_path: published.preview_path,
                        quantized: state.quantized,
                        orphaned_original: state.orphaned_original.clone(),
                    }
                }
                Err(e) => self.fail(&job, &state, e).await,
            },
            Err(e) => self.fail(&job, &state, e).await,
        };

        scratch.close();

        if let Some(orphaned) = &state.orphaned_original {
            tracing::info!(
                bucket = %job.source_bucket,
                orphaned_object = %orphaned,
                "Replaced original left in source bucket"
            );
        }
        tracing::info!(
            success = outcome.is_success(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Job finished"
        );
        outcome
    }

    async fn run_steps(
        &self,
        job: &ProcessingJob,
        scratch: &ScratchSpace,
        state: &mut JobState,
    ) -> Result<PublishedPreview, PipelineError> {
        let fetched =
            fetch_original(&self.storage, scratch, &job.source_bucket, &job.object_path).await?;
        state.advance(JobStage::Fetched);

        let report = match self.prober.probe(&fetched.local_path).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "Probe failed, continuing without format metadata");
                None
            }
        };
        state.advance(JobStage::Probed);

        let mut canonical_local = fetched.local_path.clone();
        let mut original_size_bytes = fetched.size_bytes;
        if let QuantizeDecision::Quantize { sample_fmt, bit_depth } =
            QuantizeDecision::for_report(report.as_ref())
        {
            tracing::info!(?sample_fmt, ?bit_depth, "Quantizing original to 16-bit");
            let quantized = self
                .quantizer
                .quantize(scratch, &fetched.local_path, &job.object_path)
                .await?;
            state.canonical_path = quantized.object_path;
            state.quantized = true;
            state.orphaned_original = quantized.orphaned_path;
            canonical_local = quantized.local_path;
            original_size_bytes = quantized.size_bytes;
            state.advance(JobStage::Quantized);
        }

        let source_duration = report.as_ref().and_then(|r| r.duration);
        let preview = self
            .encoder
            .encode(scratch, &canonical_local, job.song_id, source_duration)
            .await?;
        state.advance(JobStage::Previewed);

        let waveform = self
            .analyzer
            .summarize(
                &[preview.local_path.as_path(), canonical_local.as_path()],
                preview.window.length,
            )
            .await;
        state.advance(JobStage::Analyzed);

        let preview_url = self.publisher.preview_url(&preview.object_path).await?;

        Ok(PublishedPreview {
            update: SongMediaUpdate {
                song_id: job.song_id,
                audio_url: state.canonical_path.clone(),
                preview_url,
                waveform,
                original_bit_depth: report.as_ref().and_then(|r| r.bit_depth),
                original_sample_rate: report.as_ref().and_then(|r| r.sample_rate),
                original_size_bytes,
                playback_size_bytes: preview.size_bytes,
                playback_bitrate_kbps: self.encoder.bitrate_kbps() as i32,
                updated_at: Utc::now(),
            },
            preview_path: preview.object_path,
        })
    }

    async fn fail(&self, job: &ProcessingJob, state: &JobState, err: PipelineError) -> JobOutcome {
        let message = err.to_string();
        tracing::error!(
            stage = state.stage.as_str(),
            kind = err.kind(),
            error = %message,
            "Job failed"
        );
        self.publisher
            .publish_failure(job.song_id, &message, state.replaced_path())
            .await;
        JobOutcome::Failed {
            song_id: job.song_id,
            stage: state.stage,
            error: message,
        }
    }
}
