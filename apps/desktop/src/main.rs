use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use shared::{
    domain::{FileDescriptor, UploadId},
    error::UploadError,
    protocol::UploadEvent,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;
use upload_core::{load_settings, FixedProgress, ProgressGenerator, RandomProgress, UploadSimulator};

mod display;

/// Simulates the contract upload pipeline for a batch of files.
#[derive(Parser, Debug)]
struct Args {
    /// Files to submit: an existing path, or NAME:SIZE_IN_BYTES.
    #[arg(required = true)]
    files: Vec<String>,
    /// TOML settings file; UPLOAD_SIM__* variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the same progress step on every tick instead of random steps.
    #[arg(long)]
    fixed_step: Option<f64>,
    /// Print every observation as a JSON line.
    #[arg(long)]
    json: bool,
    /// Cancel the named file once it starts processing.
    #[arg(long, value_name = "NAME")]
    cancel: Vec<String>,
    /// Fail the named file once it starts processing, as NAME=MESSAGE.
    #[arg(long, value_name = "NAME=MESSAGE")]
    fail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Intervention {
    Cancel,
    Fail(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings(args.config.as_deref())?;
    let generator: Arc<dyn ProgressGenerator> = match args.fixed_step {
        Some(step) => Arc::new(FixedProgress::uniform(step)),
        None => Arc::new(RandomProgress::from_settings(&settings)),
    };
    let files = args
        .files
        .iter()
        .map(|arg| parse_file_arg(arg))
        .collect::<Result<Vec<_>>>()?;
    let mut interventions = parse_interventions(&args.cancel, &args.fail)?;

    let simulator = UploadSimulator::new_with_generator(settings, generator);
    let mut events = simulator.subscribe_events();
    let receipt = simulator.submit_checked(files).await;

    if args.json {
        println!("{}", serde_json::to_string(&receipt)?);
    } else {
        for rejection in &receipt.rejected {
            println!("{}", display::render_rejection(rejection));
        }
    }
    if receipt.accepted.is_empty() {
        bail!("none of the submitted files were accepted");
    }

    tokio::select! {
        followed = follow_uploads(
            &simulator,
            &mut events,
            &receipt.accepted,
            &mut interventions,
            args.json,
        ) => followed?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping simulations");
            simulator.shutdown().await;
        }
    }

    let summary = simulator.summary().await;
    if args.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", display::render_summary(&summary));
    }
    Ok(())
}

/// Renders events until every accepted upload has finished, failed or been
/// cancelled.
async fn follow_uploads(
    simulator: &UploadSimulator,
    events: &mut broadcast::Receiver<UploadEvent>,
    accepted: &[UploadId],
    interventions: &mut HashMap<String, Intervention>,
    json: bool,
) -> Result<()> {
    let mut pending: HashSet<UploadId> = accepted.iter().copied().collect();
    while !pending.is_empty() {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "display fell behind the simulation");
                // Skipped events may have included terminal ones.
                pending.retain(|id| simulator.is_running(*id));
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if event.is_terminal() {
            pending.remove(&event.id());
        }
        render_event(simulator, &event, json).await?;

        if let UploadEvent::PhaseChanged(record) = &event {
            if let Some(intervention) = interventions.remove(&record.name) {
                intervene(simulator, record.id, intervention).await?;
            }
        }
    }
    Ok(())
}

/// Applies a `--cancel`/`--fail` request. A record that settled before the
/// request got to it is left alone.
async fn intervene(
    simulator: &UploadSimulator,
    id: UploadId,
    intervention: Intervention,
) -> Result<()> {
    let outcome = match intervention {
        Intervention::Cancel => simulator.cancel(id).await,
        Intervention::Fail(message) => simulator.fail(id, message).await,
    };
    match outcome {
        Ok(_) => Ok(()),
        Err(err @ (UploadError::AlreadyTerminal { .. } | UploadError::Cancelled(_))) => {
            tracing::warn!(upload_id = %id, error = %err, "intervention skipped");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn render_event(
    simulator: &UploadSimulator,
    event: &UploadEvent,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", event.to_json()?);
        return Ok(());
    }

    match event {
        UploadEvent::Cancelled { id } => {
            if let Some(record) = simulator.store().get(*id).await {
                println!("{}", display::render_cancelled(&record));
            }
        }
        _ => {
            if let Some(record) = event.record() {
                println!("{}", display::render_record(record));
            }
        }
    }
    Ok(())
}

fn parse_file_arg(arg: &str) -> Result<FileDescriptor> {
    let path = Path::new(arg);
    if path.is_file() {
        let size = path
            .metadata()
            .with_context(|| format!("failed to read metadata for '{arg}'"))?
            .len();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| arg.to_string());
        return Ok(FileDescriptor::new(name, size));
    }

    let Some((name, size)) = arg.rsplit_once(':') else {
        bail!("'{arg}' is not a file; use NAME:SIZE_IN_BYTES to describe one");
    };
    let size = size
        .trim()
        .parse::<u64>()
        .with_context(|| format!("invalid size in '{arg}'"))?;
    Ok(FileDescriptor::new(name, size))
}

fn parse_interventions(
    cancel: &[String],
    fail: &[String],
) -> Result<HashMap<String, Intervention>> {
    let mut interventions = HashMap::new();
    for name in cancel {
        interventions.insert(name.clone(), Intervention::Cancel);
    }
    for entry in fail {
        let Some((name, message)) = entry.split_once('=') else {
            bail!("--fail expects NAME=MESSAGE, got '{entry}'");
        };
        interventions.insert(name.to_string(), Intervention::Fail(message.to_string()));
    }
    Ok(interventions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::UploadStatus;
    use std::{
        env, fs,
        time::{Duration, SystemTime, UNIX_EPOCH},
    };
    use upload_core::SimulationSettings;

    #[test]
    fn parses_name_and_size_pairs() {
        assert_eq!(
            parse_file_arg("contract.pdf:2048").expect("descriptor"),
            FileDescriptor::new("contract.pdf", 2048)
        );
        assert!(parse_file_arg("contract.pdf:big").is_err());
        assert!(parse_file_arg("missing-file.pdf").is_err());
    }

    #[test]
    fn existing_paths_use_size_on_disk() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let temp_root = env::temp_dir().join(format!("upload_sim_cli_test_{suffix}"));
        fs::create_dir_all(&temp_root).expect("temp root");
        let path = temp_root.join("terms.txt");
        fs::write(&path, b"net 30").expect("write");

        let descriptor = parse_file_arg(path.to_string_lossy().as_ref()).expect("descriptor");
        assert_eq!(descriptor, FileDescriptor::new("terms.txt", 6));

        fs::remove_dir_all(temp_root).expect("cleanup");
    }

    #[test]
    fn parses_interventions() {
        let interventions = parse_interventions(
            &["a.pdf".to_string()],
            &["b.pdf=parser timed out".to_string()],
        )
        .expect("interventions");
        assert_eq!(interventions["a.pdf"], Intervention::Cancel);
        assert_eq!(
            interventions["b.pdf"],
            Intervention::Fail("parser timed out".into())
        );
        assert!(parse_interventions(&[], &["no-message".to_string()]).is_err());
    }

    fn file(name: &str) -> FileDescriptor {
        FileDescriptor::new(name, 2048)
    }

    #[tokio::test(start_paused = true)]
    async fn lagging_display_still_sees_every_upload_settle() {
        let mut settings = SimulationSettings::default();
        settings.event_capacity = 2;
        let simulator =
            UploadSimulator::new_with_generator(settings, Arc::new(FixedProgress::uniform(100.0)));
        let mut events = simulator.subscribe_events();
        let ids = simulator
            .submit(vec![file("a.pdf"), file("b.pdf"), file("c.pdf")])
            .await;

        let mut interventions = HashMap::new();
        tokio::time::timeout(
            Duration::from_secs(60),
            follow_uploads(&simulator, &mut events, &ids, &mut interventions, true),
        )
        .await
        .expect("display stopped waiting")
        .expect("follow uploads");

        assert_eq!(simulator.summary().await.completed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn late_interventions_are_skipped() {
        let simulator = UploadSimulator::new_with_generator(
            SimulationSettings::default(),
            Arc::new(FixedProgress::uniform(100.0)),
        );
        let mut events = simulator.subscribe_events();
        let ids = simulator.submit(vec![file("done.pdf")]).await;
        let id = ids[0];
        let mut interventions = HashMap::new();
        follow_uploads(&simulator, &mut events, &ids, &mut interventions, true)
            .await
            .expect("follow uploads");

        intervene(&simulator, id, Intervention::Fail("too late".into()))
            .await
            .expect("finished upload is left alone");
        let record = simulator.store().get(id).await.expect("record");
        assert_eq!(record.status, UploadStatus::Completed);

        let missing = UploadId::new();
        assert!(intervene(&simulator, missing, Intervention::Cancel)
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_request_stops_file_at_processing() {
        let simulator = UploadSimulator::new_with_generator(
            SimulationSettings::default(),
            Arc::new(FixedProgress::uniform(100.0)),
        );
        let mut events = simulator.subscribe_events();
        let ids = simulator
            .submit(vec![file("kept.pdf"), file("dropped.pdf")])
            .await;
        let mut interventions = parse_interventions(&["dropped.pdf".to_string()], &[])
            .expect("interventions");

        follow_uploads(&simulator, &mut events, &ids, &mut interventions, true)
            .await
            .expect("follow uploads");

        let summary = simulator.summary().await;
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.processing, 1);
        assert!(interventions.is_empty());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
