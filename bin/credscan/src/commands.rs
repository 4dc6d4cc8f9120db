use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use credscan_core::types::{CredentialRecord, DocumentSide, ErrorKind};
use credscan_core::{ExtractionCallback, Orchestrator, TaskEvent, TaskId};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Forwards a task's callbacks into a channel the command loop reads.
struct ChannelCallback {
    tx: mpsc::UnboundedSender<TaskEvent>,
}

impl ExtractionCallback for ChannelCallback {
    fn on_progress(&self, _task_id: TaskId, percent: u8, status: &str) {
        let _ = self.tx.send(TaskEvent::Progress {
            percent,
            status: status.to_owned(),
        });
    }

    fn on_complete(&self, _task_id: TaskId, record: CredentialRecord) {
        let _ = self.tx.send(TaskEvent::Completed(Box::new(record)));
    }

    fn on_error(&self, _task_id: TaskId, kind: ErrorKind, message: &str) {
        let _ = self.tx.send(TaskEvent::Failed {
            kind,
            message: message.to_owned(),
        });
    }

    fn on_cancelled(&self, _task_id: TaskId) {
        let _ = self.tx.send(TaskEvent::Cancelled);
    }
}

pub async fn extract_sync(
    orchestrator: Arc<Orchestrator>,
    image: PathBuf,
    side: DocumentSide,
    pretty: bool,
) -> anyhow::Result<ExitCode> {
    let record = tokio::task::spawn_blocking(move || orchestrator.submit_sync(image, side))
        .await
        .context("extraction worker panicked")?;
    print_record(&record, pretty)?;
    Ok(record_exit_code(&record))
}

pub async fn extract_async(
    orchestrator: &Orchestrator,
    image: PathBuf,
    side: DocumentSide,
    pretty: bool,
) -> anyhow::Result<ExitCode> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task_id = orchestrator.submit_async(image, side, Arc::new(ChannelCallback { tx }))?;
    info!(%task_id, "waiting for task");

    let mut interrupted = false;
    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            result = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for CTRL+C");
                }
                interrupted = true;
                if !orchestrator.cancel(task_id) {
                    warn!(%task_id, "task already finished; nothing to cancel");
                }
                continue;
            }
        };

        match event {
            Some(TaskEvent::Progress { percent, status }) => {
                eprintln!("[{percent:>3}%] {status}");
            }
            Some(TaskEvent::Completed(record)) => {
                print_record(&record, pretty)?;
                return Ok(record_exit_code(&record));
            }
            Some(TaskEvent::Failed { kind, message }) => {
                eprintln!("error {} ({kind}): {message}", kind.code());
                return Ok(ExitCode::FAILURE);
            }
            Some(TaskEvent::Cancelled) => {
                eprintln!("task {task_id} cancelled");
                return Ok(ExitCode::from(130));
            }
            None => anyhow::bail!("task {task_id} ended without an outcome"),
        }
    }
}

pub async fn check(
    orchestrator: Arc<Orchestrator>,
    image: PathBuf,
    side: DocumentSide,
) -> anyhow::Result<ExitCode> {
    let path = image.clone();
    let plausible =
        tokio::task::spawn_blocking(move || orchestrator.check_credential(path, side))
            .await
            .context("pre-check worker panicked")?;
    println!(
        "{}",
        json!({
            "image": image.display().to_string(),
            "side": side,
            "plausible": plausible,
        })
    );
    Ok(if plausible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn info(orchestrator: &Orchestrator, pretty: bool) -> anyhow::Result<ExitCode> {
    let info = orchestrator.get_service_info();
    let text = if pretty {
        serde_json::to_string_pretty(&info)?
    } else {
        serde_json::to_string(&info)?
    };
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}

fn print_record(record: &CredentialRecord, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(record)?
    } else {
        serde_json::to_string(record)?
    };
    println!("{text}");
    Ok(())
}

fn record_exit_code(record: &CredentialRecord) -> ExitCode {
    if record.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn callback_forwards_events_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = ChannelCallback { tx };
        let task_id = "67e55044-10b1-426f-9247-bb680e5fe0c8"
            .parse::<TaskId>()
            .expect("uuid");

        callback.on_progress(task_id, 10, "Validating image");
        callback.on_error(task_id, ErrorKind::FileNotFound, "gone");

        assert_eq!(
            rx.try_recv().ok(),
            Some(TaskEvent::Progress {
                percent: 10,
                status: "Validating image".into()
            })
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(TaskEvent::Failed {
                kind: ErrorKind::FileNotFound,
                message: "gone".into()
            })
        );
    }

    #[test]
    fn error_records_exit_with_failure() {
        let ok = CredentialRecord::new(DocumentSide::Front);
        let failed = CredentialRecord::failure(Some(DocumentSide::Front), "boom");
        assert_eq!(
            format!("{:?}", record_exit_code(&ok)),
            format!("{:?}", ExitCode::SUCCESS)
        );
        assert_eq!(
            format!("{:?}", record_exit_code(&failed)),
            format!("{:?}", ExitCode::FAILURE)
        );
    }
}
