//! Background video analysis.
//!
//! An uploaded video is recorded as `pending`; [`spawn_analysis`] then moves it
//! through `processing` to `completed` or `failed` on a detached task. A
//! completed analysis also bumps the owning pet's `videos_analyzed` counter.
//! The analysis itself sits behind [`VideoAnalyzer`] so a real model can be
//! plugged in; [`StubAnalyzer`] is the default.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use petcare_store::{by_id, collections, Repository, StoreResult, Update};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Lifecycle of a video record's `analysis_status` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One observation produced by an analyzer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub detected_behaviors: Vec<String>,
    pub health_concerns: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot read video {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis failed: {0}")]
    Failed(String),
}

/// Produces a report for a stored video file.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    async fn analyze(&self, video_path: &Path) -> Result<AnalysisReport, AnalysisError>;
}

/// Analyzer used when no analysis backend is configured. It checks that the
/// video is readable and reports that analysis is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubAnalyzer;

#[async_trait]
impl VideoAnalyzer for StubAnalyzer {
    async fn analyze(&self, video_path: &Path) -> Result<AnalysisReport, AnalysisError> {
        tokio::fs::metadata(video_path)
            .await
            .map_err(|source| AnalysisError::Unreadable {
                path: video_path.to_path_buf(),
                source,
            })?;
        Ok(AnalysisReport {
            insights: vec![Insight {
                kind: "warning".into(),
                text: "Video analysis is not configured on this server".into(),
            }],
            recommendations: vec!["Configure a video analysis backend to receive insights".into()],
            confidence: 0.0,
            detected_behaviors: Vec::new(),
            health_concerns: Vec::new(),
        })
    }
}

/// A queued analysis for one uploaded video.
#[derive(Clone, Debug)]
pub struct AnalysisJob {
    pub video_id: String,
    pub pet_id: String,
    pub video_path: PathBuf,
}

/// Run `job` on a detached task. Failures are recorded on the video record
/// and logged; nothing is reported back to the uploader.
pub fn spawn_analysis(
    repo: Arc<Repository>,
    analyzer: Arc<dyn VideoAnalyzer>,
    job: AnalysisJob,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_analysis(&repo, analyzer.as_ref(), &job).await {
            error!(video_id = %job.video_id, error = %e, "video analysis aborted");
            if let Err(e) = set_status(&repo, &job.video_id, AnalysisStatus::Failed, None).await {
                error!(video_id = %job.video_id, error = %e, "failed to mark video as failed");
            }
        }
    })
}

/// Drive one job to a terminal status and return it.
pub async fn run_analysis(
    repo: &Arc<Repository>,
    analyzer: &dyn VideoAnalyzer,
    job: &AnalysisJob,
) -> StoreResult<AnalysisStatus> {
    set_status(repo, &job.video_id, AnalysisStatus::Processing, None).await?;

    let report = match analyzer.analyze(&job.video_path).await {
        Ok(report) => report,
        Err(e) => {
            warn!(video_id = %job.video_id, error = %e, "video analysis failed");
            set_status(repo, &job.video_id, AnalysisStatus::Failed, None).await?;
            return Ok(AnalysisStatus::Failed);
        }
    };

    let results = json!({
        "insights": report.insights,
        "recommendations": report.recommendations,
        "confidence_score": report.confidence,
        "detected_behaviors": report.detected_behaviors,
        "health_concerns": report.health_concerns,
    });
    set_status(repo, &job.video_id, AnalysisStatus::Completed, Some(results)).await?;

    let bump = Update::Inc(json_map(json!({ "videos_analyzed": 1 })));
    let result = repo.pets().update_one(&by_id(&job.pet_id), &bump).await?;
    if result.matched_count == 0 {
        warn!(pet_id = %job.pet_id, "analyzed video belongs to a missing pet");
    }

    info!(video_id = %job.video_id, confidence = report.confidence, "video analysis completed");
    Ok(AnalysisStatus::Completed)
}

async fn set_status(
    repo: &Arc<Repository>,
    video_id: &str,
    status: AnalysisStatus,
    extra: Option<Value>,
) -> StoreResult<()> {
    let mut fields = extra.map(json_map).unwrap_or_default();
    fields.insert("analysis_status".into(), Value::String(status.as_str().into()));
    repo.collection(collections::VIDEOS)?
        .update_one(&by_id(video_id), &Update::Set(fields))
        .await?;
    Ok(())
}

fn json_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petcare_store::{Document, StoreConfig};
    use std::sync::Mutex;

    struct FixedAnalyzer(AnalysisReport);

    #[async_trait]
    impl VideoAnalyzer for FixedAnalyzer {
        async fn analyze(&self, _: &Path) -> Result<AnalysisReport, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl VideoAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _: &Path) -> Result<AnalysisReport, AnalysisError> {
            Err(AnalysisError::Failed("model crashed".into()))
        }
    }

    /// Records the video's status as seen while analysis is running.
    struct ObservingAnalyzer {
        repo: Arc<Repository>,
        video_id: String,
        seen: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl VideoAnalyzer for ObservingAnalyzer {
        async fn analyze(&self, _: &Path) -> Result<AnalysisReport, AnalysisError> {
            let video = self.repo.videos().get(&self.video_id).await.unwrap().unwrap();
            *self.seen.lock().unwrap() = video.get("analysis_status").cloned();
            Ok(AnalysisReport::default())
        }
    }

    async fn setup(dir: &Path) -> (Arc<Repository>, AnalysisJob) {
        let repo = Repository::open(StoreConfig::with_root(dir)).await.unwrap();
        let pet = Document::from_value(json!({"name": "Rex", "videos_analyzed": 0})).unwrap();
        let pet_id = repo.pets().insert_one(pet).await.unwrap().inserted_id;
        let video = Document::from_value(json!({
            "pet_id": pet_id,
            "analysis_status": "pending",
        }))
        .unwrap();
        let video_id = repo.videos().insert_one(video).await.unwrap().inserted_id;
        let job = AnalysisJob {
            video_id,
            pet_id,
            video_path: dir.join("clip.mp4"),
        };
        (repo, job)
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            insights: vec![Insight {
                kind: "behavior".into(),
                text: "Playful".into(),
            }],
            recommendations: vec!["More walks".into()],
            confidence: 0.8,
            detected_behaviors: vec!["playing".into()],
            health_concerns: Vec::new(),
        }
    }

    #[tokio::test]
    async fn completed_analysis_updates_video_and_pet() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, job) = setup(dir.path()).await;

        let status = run_analysis(&repo, &FixedAnalyzer(report()), &job).await.unwrap();
        assert_eq!(status, AnalysisStatus::Completed);

        let video = repo.videos().get(&job.video_id).await.unwrap().unwrap();
        assert_eq!(video.get("analysis_status"), Some(&json!("completed")));
        assert_eq!(video.get("confidence_score"), Some(&json!(0.8)));
        assert_eq!(video.get("detected_behaviors"), Some(&json!(["playing"])));
        assert_eq!(
            video.get("insights"),
            Some(&json!([{"type": "behavior", "text": "Playful"}]))
        );

        let pet = repo.pets().get(&job.pet_id).await.unwrap().unwrap();
        assert_eq!(pet.get("videos_analyzed"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn failed_analysis_marks_video_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, job) = setup(dir.path()).await;

        let status = run_analysis(&repo, &FailingAnalyzer, &job).await.unwrap();
        assert_eq!(status, AnalysisStatus::Failed);

        let video = repo.videos().get(&job.video_id).await.unwrap().unwrap();
        assert_eq!(video.get("analysis_status"), Some(&json!("failed")));
        assert!(!video.contains("insights"));

        let pet = repo.pets().get(&job.pet_id).await.unwrap().unwrap();
        assert_eq!(pet.get("videos_analyzed"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn status_is_processing_during_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, job) = setup(dir.path()).await;
        let analyzer = ObservingAnalyzer {
            repo: Arc::clone(&repo),
            video_id: job.video_id.clone(),
            seen: Mutex::new(None),
        };

        run_analysis(&repo, &analyzer, &job).await.unwrap();
        assert_eq!(*analyzer.seen.lock().unwrap(), Some(json!("processing")));
    }

    #[tokio::test]
    async fn spawned_analysis_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, job) = setup(dir.path()).await;
        let video_id = job.video_id.clone();

        spawn_analysis(Arc::clone(&repo), Arc::new(FixedAnalyzer(report())), job)
            .await
            .unwrap();

        let video = repo.videos().get(&video_id).await.unwrap().unwrap();
        assert_eq!(video.get("analysis_status"), Some(&json!("completed")));
    }

    #[tokio::test]
    async fn stub_analyzer_requires_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        let err = StubAnalyzer.analyze(&missing).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Unreadable { .. }));

        let present = dir.path().join("clip.mp4");
        std::fs::write(&present, b"frames").unwrap();
        let report = StubAnalyzer.analyze(&present).await.unwrap();
        assert_eq!(report.confidence, 0.0);
        assert_eq!(report.insights[0].kind, "warning");
        assert_eq!(report.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn stub_analysis_of_missing_file_fails_video() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, job) = setup(dir.path()).await;
        let status = run_analysis(&repo, &StubAnalyzer, &job).await.unwrap();
        assert_eq!(status, AnalysisStatus::Failed);
    }

    #[test]
    fn status_strings() {
        assert_eq!(AnalysisStatus::Pending.as_str(), "pending");
        assert_eq!(
            serde_json::to_value(AnalysisStatus::Processing).unwrap(),
            json!("processing")
        );
    }
}
