use super::connect;
use crate::cli::StatusArgs;
use crate::error::CliError;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets, Attribute, Cell, Color, Table};
use taskprobe_client::Cluster;
use taskprobe_core::config::Config;
use taskprobe_core::model::{JobId, TaskInfo};

pub fn handle_status(args: StatusArgs, config: &Config) -> Result<(), CliError> {
    let client = connect(config)?;
    let tracker = client.tracker();
    let job_id = JobId(args.job_id);

    let status = tracker.job_status(&job_id)?;
    let tasks = tracker.task_infos(&job_id)?;
    client.disconnect();

    println!("Job: {}", status.job_id);
    println!("State: {}", status.run_state);
    println!("User: {}", status.username);
    println!("{}", task_table(&tasks));
    Ok(())
}

fn task_table(tasks: &[TaskInfo]) -> String {
    let header = ["Task", "Kind", "Attempts", "Latest", "Node"]
        .into_iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan));

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);

    for task in tasks {
        let kind = if task.is_bookkeeping {
            "bookkeeping"
        } else if task.task_id.is_reduce() {
            "reduce"
        } else {
            "map"
        };
        let latest = task
            .attempts
            .iter()
            .max_by_key(|a| a.attempt_id.index)
            .map(|a| a.run_state.to_string())
            .unwrap_or_else(|| "-".to_string());
        let node = task
            .execution_nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(task.task_id.0.as_str()).fg(Color::Yellow),
            Cell::new(kind),
            Cell::new(task.attempts.len()),
            Cell::new(latest),
            Cell::new(node),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskprobe_core::model::{TaskAttemptId, TaskAttemptStatus, TaskId, TaskRunState};

    #[test]
    fn test_task_table_shows_latest_attempt() {
        let task_id = TaskId("task_1_0001_m_000000".into());
        let tasks = vec![TaskInfo {
            task_id: task_id.clone(),
            is_bookkeeping: false,
            execution_nodes: vec!["tracker_node1:50060".into()],
            attempts: vec![
                TaskAttemptStatus {
                    attempt_id: TaskAttemptId::new(task_id.clone(), 0),
                    run_state: TaskRunState::Killed,
                },
                TaskAttemptStatus {
                    attempt_id: TaskAttemptId::new(task_id, 1),
                    run_state: TaskRunState::Running,
                },
            ],
        }];

        let table = task_table(&tasks);
        assert!(table.contains("task_1_0001_m_000000"));
        assert!(table.contains("RUNNING"));
        assert!(!table.contains("KILLED"));
        assert!(table.contains("tracker_node1:50060"));
    }
}
