use super::ui;
use crate::app::App;
use crate::core::UserId;
use crate::core::extraction::ExtractionIntent;
use crate::pipeline::{DispatchResponse, JobSnapshot, TaskOutcome};
use anyhow::{Result, bail};
use comfy_table::{Cell, Color};
use indicatif::ProgressBar;
use std::time::Duration;
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn display_response(response: &DispatchResponse) -> String {
    match response {
        DispatchResponse::Started { job_id, total } => format!(
            "Started job {} for {} file(s)",
            ui::style_text(&job_id.to_string(), ui::StyleType::Title),
            total
        ),
        DispatchResponse::NoFiles { message } => ui::style_text(message, ui::StyleType::Subtle),
        DispatchResponse::Error { message } => ui::style_text(message, ui::StyleType::Error),
    }
}

pub fn display_outcomes(snapshot: &JobSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("File"),
        ui::header_cell("Status"),
        ui::header_cell("Detail"),
    ]);

    for outcome in &snapshot.outcomes {
        let (status, detail) = match outcome {
            TaskOutcome::Success { .. } => (Cell::new("SUCCESS").fg(Color::Green), String::new()),
            TaskOutcome::Unsupported { reason, .. } => {
                (Cell::new("UNSUPPORTED").fg(Color::DarkGrey), reason.clone())
            }
            TaskOutcome::Failure { error, .. } => {
                (Cell::new("FAILURE").fg(Color::Red), error.clone())
            }
        };
        table.add_row(vec![Cell::new(outcome.file_name()), status, Cell::new(detail)]);
    }

    format!("{}\n\n{}", table, display_summary(snapshot))
}

pub fn display_summary(snapshot: &JobSnapshot) -> String {
    format!(
        "{} {}/{}",
        ui::style_text("Succeeded:", ui::StyleType::TotalLabel),
        ui::style_text(&snapshot.succeeded().to_string(), ui::StyleType::TotalValue),
        snapshot.handle.total
    )
}

/// Polls until every task of the job reported an outcome, then evicts the
/// job from the backend.
async fn wait_for_job(app: &App, job_id: Uuid, pb: ProgressBar) -> Result<JobSnapshot> {
    pb.set_message("Processing");
    loop {
        let Some(snapshot) = app.job_snapshot(job_id).await else {
            pb.abandon();
            bail!("Job {job_id} is unknown");
        };
        pb.set_position(snapshot.completed() as u64);
        if snapshot.is_finished() {
            pb.finish_and_clear();
            app.forget_job(job_id).await;
            return Ok(snapshot);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Dispatches a batch and drains it before returning, so no task is lost
/// when the process exits. `wait` only controls the progress bar and the
/// per-file outcome table.
pub async fn run(app: &App, user: UserId, intent: ExtractionIntent, wait: bool) -> Result<()> {
    let response = match intent {
        ExtractionIntent::PurchaseTicket => app.dispatch_ticket_processing(user).await,
        ExtractionIntent::Investment => app.dispatch_investment_processing(user).await,
    };
    println!("{}", display_response(&response));

    match response {
        DispatchResponse::Started { job_id, total } => {
            let pb = if wait {
                ui::new_progress_bar(total as u64)
            } else {
                ProgressBar::hidden()
            };
            let snapshot = wait_for_job(app, job_id, pb).await?;
            if wait {
                println!("\n{}", display_outcomes(&snapshot));
            } else {
                println!("{}", display_summary(&snapshot));
            }
            Ok(())
        }
        DispatchResponse::NoFiles { .. } => Ok(()),
        DispatchResponse::Error { message } => bail!("Dispatch failed: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{JobHandle, JobStatus};

    #[test]
    fn test_outcome_table_lists_every_file() {
        let snapshot = JobSnapshot {
            handle: JobHandle {
                job_id: Uuid::new_v4(),
                total: 3,
                status: JobStatus::Completed,
            },
            outcomes: vec![
                TaskOutcome::Success {
                    file_name: "oxxo.jpg".into(),
                },
                TaskOutcome::Unsupported {
                    file_name: "notes.zip".into(),
                    reason: "Unsupported file type: application/zip".into(),
                },
                TaskOutcome::Failure {
                    file_name: "blurry.png".into(),
                    error: "TransientError".into(),
                },
            ],
        };

        let output = display_outcomes(&snapshot);
        assert!(output.contains("oxxo.jpg"));
        assert!(output.contains("UNSUPPORTED"));
        assert!(output.contains("TransientError"));
        assert!(output.contains("/3"));
    }

    #[test]
    fn test_no_files_message() {
        let output = display_response(&DispatchResponse::NoFiles {
            message: "No new files found in 'Inversiones'".into(),
        });
        assert!(output.contains("Inversiones"));
    }
}
