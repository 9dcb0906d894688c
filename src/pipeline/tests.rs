use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::backend::{MockAudioBackend, NativeBackend};
use crate::fetcher::MockMediaSource;
use crate::locator::{MockDiscoveryProvider, SearchEntry};
use crate::media::CandidateRef;

fn provider(ids: &[&str]) -> MockDiscoveryProvider {
    let entries: Vec<Option<SearchEntry>> = ids
        .iter()
        .map(|id| {
            Some(SearchEntry {
                id: Some(id.to_string()),
                title: Some(format!("Song {}", id)),
            })
        })
        .collect();

    let mut provider = MockDiscoveryProvider::new();
    provider
        .expect_search()
        .returning(move |_, _| Ok(entries.clone()));
    provider.expect_provider_name().return_const("mock");
    provider
}

/// Writes the video id as the "audio" so merged output shows the order
fn source(failing: &'static [&'static str]) -> MockMediaSource {
    let mut source = MockMediaSource::new();
    source.expect_download().returning(move |candidate, stem| {
        if failing.contains(&candidate.source_id.as_str()) {
            return Err(MashupError::ToolFailed {
                command: "yt-dlp".to_string(),
                stderr: "ERROR: Video unavailable".to_string(),
            });
        }
        std::fs::write(stem.with_extension("webm"), candidate.source_id.as_bytes())?;
        Ok(())
    });
    source.expect_source_name().return_const("mock");
    source
}

fn copy(input: &Path, output: &Path) -> crate::Result<()> {
    std::fs::copy(input, output)?;
    Ok(())
}

fn join(inputs: &[PathBuf], output: &Path, _: &Workspace) -> crate::Result<()> {
    let mut joined = Vec::new();
    for input in inputs {
        joined.extend(std::fs::read(input)?);
    }
    std::fs::write(output, joined)?;
    Ok(())
}

fn refuse(_: &[PathBuf], _: &Path, _: &Workspace) -> crate::Result<()> {
    Err(MashupError::ToolFailed {
        command: "ffmpeg".to_string(),
        stderr: "Invalid data found when processing input".to_string(),
    })
}

type TranscodeFn = fn(&Path, &Path) -> crate::Result<()>;
type ConcatFn = fn(&[PathBuf], &Path, &Workspace) -> crate::Result<()>;

/// Backend that moves bytes around instead of touching audio; trim always copies
fn backend(name: &'static str, transcode: TranscodeFn, concatenate: ConcatFn) -> MockAudioBackend {
    let mut backend = MockAudioBackend::new();
    backend.expect_transcode().returning(transcode);
    backend
        .expect_trim()
        .returning(|input, output, _| copy(input, output));
    backend.expect_concatenate().returning(concatenate);
    backend.expect_name().return_const(name);
    backend
}

fn copying_backend() -> MockAudioBackend {
    backend("mock", copy, join)
}

fn single(backend: MockAudioBackend) -> Backends {
    Backends {
        primary: Arc::new(backend),
        merge_fallback: None,
    }
}

fn pipeline(
    dir: &Path,
    provider: MockDiscoveryProvider,
    source: impl MediaSource + 'static,
    backends: Backends,
) -> MashupPipeline {
    MashupPipeline::with_components(
        MediaLocator::new(Arc::new(provider), "songs"),
        Arc::new(source),
        backends,
        Workspace::new(dir, "temp_"),
        Duration::ZERO,
    )
}

fn request(dir: &Path, count: usize) -> MashupRequest {
    MashupRequest {
        subject: "Adele".to_string(),
        count,
        clip_seconds: 25,
        output: dir.join("mashup.mp3"),
    }
}

fn transient_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("temp_"))
        .collect()
}

#[tokio::test]
async fn merges_in_discovery_order_skipping_failed_fetches() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        dir.path(),
        provider(&["A", "B", "C"]),
        source(&["B"]),
        single(copying_backend()),
    );

    let result = pipeline.run(&request(dir.path(), 3)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.backend, "mock");
    assert_eq!(std::fs::read_to_string(dir.path().join("mashup.mp3")).unwrap(), "AC");
    assert_eq!(
        result.counts,
        StageCounts {
            located: 3,
            fetched: 2,
            transcoded: 2,
            trimmed: 2,
        }
    );
    assert!(transient_files(dir.path()).is_empty());
}

#[tokio::test]
async fn eleven_candidates_with_one_failure_merge_ten_clips() {
    let ids: Vec<String> = (0..11).map(|i| format!("v{:02}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        dir.path(),
        provider(&id_refs),
        source(&["v04"]),
        single(copying_backend()),
    );

    let result = pipeline.run(&request(dir.path(), 11)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.counts.located, 11);
    assert_eq!(result.counts.trimmed, 10);

    let expected: String = ids.iter().filter(|id| *id != "v04").cloned().collect();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("mashup.mp3")).unwrap(),
        expected
    );
    assert!(transient_files(dir.path()).is_empty());
}

#[tokio::test]
async fn survivor_counts_never_grow() {
    let dir = TempDir::new().unwrap();
    // Ordinal 1 fails conversion, everything else works
    let backend = backend(
        "mock",
        |input, output| {
            if input.to_string_lossy().contains("video_1") {
                return Err(MashupError::Decode("unsupported codec".to_string()));
            }
            copy(input, output)
        },
        |inputs, output, _| {
            std::fs::write(output, inputs.len().to_string())?;
            Ok(())
        },
    );

    let pipeline = pipeline(
        dir.path(),
        provider(&["A", "B", "C", "D"]),
        source(&["D"]),
        single(backend),
    );

    let result = pipeline.run(&request(dir.path(), 4)).await.unwrap();
    let counts = result.counts;

    assert!(counts.located >= counts.fetched);
    assert!(counts.fetched >= counts.transcoded);
    assert!(counts.transcoded >= counts.trimmed);
    assert_eq!((counts.fetched, counts.transcoded, counts.trimmed), (3, 2, 2));
    // The merge saw exactly the trim survivors
    assert_eq!(std::fs::read_to_string(&result.output_path).unwrap(), "2");
}

#[tokio::test]
async fn no_candidates_stops_after_locate() {
    let dir = TempDir::new().unwrap();
    let mut backend = MockAudioBackend::new();
    backend.expect_name().return_const("mock");
    let pipeline = pipeline(
        dir.path(),
        provider(&[]),
        MockMediaSource::new(),
        single(backend),
    );

    let err = pipeline.run(&request(dir.path(), 5)).await.unwrap_err();

    assert!(matches!(err, MashupError::StageExhausted(Stage::Locate)));
    assert_eq!(err.to_string(), "No videos found");
    assert!(!dir.path().join("mashup.mp3").exists());
    assert!(transient_files(dir.path()).is_empty());
}

#[tokio::test]
async fn every_fetch_failing_exhausts_the_fetch_stage() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        dir.path(),
        provider(&["A", "B"]),
        source(&["A", "B"]),
        single(copying_backend()),
    );

    let err = pipeline.run(&request(dir.path(), 2)).await.unwrap_err();

    assert!(matches!(err, MashupError::StageExhausted(Stage::Fetch)));
    assert!(!dir.path().join("mashup.mp3").exists());
}

#[tokio::test]
async fn half_written_conversions_are_swept() {
    let dir = TempDir::new().unwrap();
    let mut backend = MockAudioBackend::new();
    backend.expect_transcode().returning(|_, output| {
        std::fs::write(output, b"partial")?;
        Err(MashupError::ToolTimeout {
            command: "ffmpeg".to_string(),
            seconds: 600,
        })
    });
    backend.expect_name().return_const("mock");
    let pipeline = pipeline(
        dir.path(),
        provider(&["A", "B"]),
        source(&[]),
        single(backend),
    );

    let err = pipeline.run(&request(dir.path(), 2)).await.unwrap_err();

    assert!(matches!(err, MashupError::StageExhausted(Stage::Transcode)));
    assert_eq!(err.to_string(), "Conversion failed");
    assert!(transient_files(dir.path()).is_empty());
}

#[tokio::test]
async fn merge_falls_back_to_second_backend() {
    let dir = TempDir::new().unwrap();
    let primary = backend("ffmpeg", copy, refuse);

    let backends = Backends {
        primary: Arc::new(primary),
        merge_fallback: Some(Arc::new(copying_backend())),
    };
    let pipeline = pipeline(dir.path(), provider(&["A", "B"]), source(&[]), backends);

    let result = pipeline.run(&request(dir.path(), 2)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.backend, "ffmpeg");
    assert_eq!(std::fs::read_to_string(dir.path().join("mashup.mp3")).unwrap(), "AB");
}

#[tokio::test]
async fn failed_merge_is_reported_not_raised() {
    let dir = TempDir::new().unwrap();
    let primary = backend("ffmpeg", copy, |_, _, _| {
        Err(MashupError::ToolUnavailable("ffmpeg".to_string()))
    });

    let backends = Backends {
        primary: Arc::new(primary),
        merge_fallback: Some(Arc::new(backend("native", copy, refuse))),
    };
    let pipeline = pipeline(dir.path(), provider(&["A"]), source(&[]), backends);

    let result = pipeline.run(&request(dir.path(), 1)).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.counts.trimmed, 1);
    assert!(!dir.path().join("mashup.mp3").exists());
    assert!(transient_files(dir.path()).is_empty());
}

#[tokio::test]
async fn partial_merge_output_is_removed_when_every_backend_fails() {
    let dir = TempDir::new().unwrap();
    // Dies halfway through writing the output, like ffmpeg exiting non-zero
    let primary = backend("ffmpeg", copy, |_, output, _| {
        std::fs::write(output, b"partial")?;
        Err(MashupError::ToolFailed {
            command: "ffmpeg".to_string(),
            stderr: "Error writing trailer".to_string(),
        })
    });

    let backends = Backends {
        primary: Arc::new(primary),
        merge_fallback: Some(Arc::new(backend("native", copy, refuse))),
    };
    let pipeline = pipeline(dir.path(), provider(&["A"]), source(&[]), backends);

    let result = pipeline.run(&request(dir.path(), 1)).await.unwrap();

    assert!(!result.success);
    assert!(!dir.path().join("mashup.mp3").exists());
    assert!(transient_files(dir.path()).is_empty());
}

#[tokio::test]
async fn stale_output_does_not_count_as_success() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("mashup.mp3"), b"last week's mashup").unwrap();
    // Claims success without writing anything
    let primary = backend("mock", copy, |_, _, _| Ok(()));

    let pipeline = pipeline(dir.path(), provider(&["A"]), source(&[]), single(primary));

    let result = pipeline.run(&request(dir.path(), 1)).await.unwrap();

    assert!(!result.success);
}

#[tokio::test]
async fn output_with_transient_prefix_survives_the_sweep() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        dir.path(),
        provider(&["A", "B"]),
        source(&[]),
        single(copying_backend()),
    );
    let mut request = request(dir.path(), 2);
    request.output = dir.path().join("temp_mix.mp3");

    let result = pipeline.run(&request).await.unwrap();

    assert!(result.success);
    assert_eq!(transient_files(dir.path()), vec!["temp_mix.mp3".to_string()]);
}

#[tokio::test]
async fn invalid_request_never_reaches_the_provider() {
    let dir = TempDir::new().unwrap();
    let mut backend = MockAudioBackend::new();
    backend.expect_name().return_const("mock");
    let mut provider = MockDiscoveryProvider::new();
    provider.expect_search().never();

    let pipeline = pipeline(dir.path(), provider, MockMediaSource::new(), single(backend));

    let mut request = request(dir.path(), 0);
    assert!(matches!(
        pipeline.run(&request).await,
        Err(MashupError::InvalidRequest(_))
    ));

    request.count = 3;
    request.clip_seconds = 0;
    assert!(matches!(
        pipeline.run(&request).await,
        Err(MashupError::InvalidRequest(_))
    ));
}

/// Writes its file, then hangs like a stalled download
struct StallingSource;

#[async_trait]
impl MediaSource for StallingSource {
    async fn download(&self, _candidate: &CandidateRef, stem: &Path) -> crate::Result<()> {
        std::fs::write(stem.with_extension("webm.part"), b"partial")?;
        std::future::pending::<()>().await;
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "stalling"
    }
}

#[tokio::test]
async fn cancelled_run_leaves_no_transient_files() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        dir.path(),
        provider(&["A"]),
        StallingSource,
        single(copying_backend()),
    );

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), pipeline.run(&request(dir.path(), 1))).await;

    assert!(outcome.is_err());
    assert!(transient_files(dir.path()).is_empty());
}

fn write_sine_wav(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for n in 0..(seconds * spec.sample_rate as f32) as u32 {
        let t = n as f32 / spec.sample_rate as f32;
        writer
            .write_sample(((t * 330.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

#[tokio::test]
async fn native_backend_runs_the_whole_pipeline() {
    let dir = TempDir::new().unwrap();
    let mut source = MockMediaSource::new();
    source.expect_download().returning(|_, stem| {
        write_sine_wav(&stem.with_extension("wav"), 2.0);
        Ok(())
    });
    source.expect_source_name().return_const("mock");

    let pipeline = pipeline(dir.path(), provider(&["A", "B"]), source, Backends::native());
    let mut request = request(dir.path(), 2);
    request.clip_seconds = 1;

    let result = pipeline.run(&request).await.unwrap();

    assert!(result.success);
    assert_eq!(result.backend, NativeBackend::NAME);
    assert!(std::fs::metadata(dir.path().join("mashup.mp3")).unwrap().len() > 0);
    assert!(transient_files(dir.path()).is_empty());
}

#[test]
fn cancelling_during_native_transcode_writes_nothing_afterwards() {
    // With one blocking thread, a job queued after the cancel runs only once
    // the in-flight transcode has finished
    let runtime = tokio::runtime::Builder::new_current_thread()
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let dir = TempDir::new().unwrap();
    let clip = dir.path().join("clip.wav");
    write_sine_wav(&clip, 60.0);

    let mut source = MockMediaSource::new();
    source.expect_download().returning(move |_, stem| {
        std::fs::copy(&clip, stem.with_extension("wav"))?;
        Ok(())
    });
    source.expect_source_name().return_const("mock");
    let pipeline = pipeline(dir.path(), provider(&["A"]), source, Backends::native());

    runtime.block_on(async {
        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            pipeline.run(&request(dir.path(), 1)),
        )
        .await;
        assert!(outcome.is_err());

        tokio::task::spawn_blocking(|| ()).await.unwrap();
    });

    assert!(transient_files(dir.path()).is_empty());
    assert!(!dir.path().join("mashup.mp3").exists());
}
