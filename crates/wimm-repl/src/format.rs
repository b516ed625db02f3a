//! Output formatting for the shell and the one-shot commands.
//!
//! Human output is aligned text with a little color on status words; `--json`
//! output is pretty-printed JSON with the same information.

use owo_colors::OwoColorize;
use serde_json::{Value, json};

use wimm_kernel::types::{
    ImageIndexInfo, JobOutcome, JobResult, MountedImage, OperationKind, SpecialCode,
};
use wimm_kernel::{JobInfo, JobState, ToolStatus, parse_image_indexes, parse_mounted_images};

/// Whether to emit ANSI colors.
fn use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    !std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false)
}

fn good(text: &str) -> String {
    if use_color() {
        text.green().bold().to_string()
    } else {
        text.to_string()
    }
}

fn bad(text: &str) -> String {
    if use_color() {
        text.red().bold().to_string()
    } else {
        text.to_string()
    }
}

fn warn(text: &str) -> String {
    if use_color() {
        text.yellow().bold().to_string()
    } else {
        text.to_string()
    }
}

fn dim(text: &str) -> String {
    if use_color() {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// One-line summary of how a job ended.
pub fn format_status(label: &str, result: &JobResult) -> String {
    let code = result
        .exit_code
        .map(|c| format!("exit {}", c))
        .unwrap_or_else(|| "no exit code".to_string());

    match (result.succeeded, result.special) {
        (true, _) => format!("{} {} ({})", good("✓"), label, code),
        (false, Some(SpecialCode::PrivilegeRequired)) => format!(
            "{} {} ({}): run wimm from an elevated prompt",
            warn("!"),
            label,
            code
        ),
        (false, Some(SpecialCode::TimedOut)) => {
            format!("{} {} (timed out, killed)", bad("✗"), label)
        }
        (false, Some(SpecialCode::Terminated)) => {
            format!("{} {} (terminated by signal)", bad("✗"), label)
        }
        (false, None) if result.exit_code.is_none() => {
            format!("{} {} (launch failed)", bad("✗"), label)
        }
        (false, None) => format!("{} {} ({})", bad("✗"), label, code),
    }
}

/// Render a finished job for a human.
///
/// Successful listings are parsed into tables; when parsing finds nothing
/// (or the job failed) the raw tool output is shown.
pub fn format_job_result(kind: OperationKind, label: &str, result: &JobResult) -> String {
    let mut out = format_status(label, result);

    let body = if result.succeeded {
        match kind {
            OperationKind::ListIndexes => {
                let images = parse_image_indexes(&result.output);
                (!images.is_empty()).then(|| format_indexes(&images))
            }
            OperationKind::ListMounts => {
                let mounts = parse_mounted_images(&result.output);
                (!mounts.is_empty()).then(|| format_mounts(&mounts))
            }
            OperationKind::Mount | OperationKind::Unmount => None,
        }
    } else {
        None
    };

    let body = body.unwrap_or_else(|| result.output.trim_end().to_string());
    if !body.is_empty() {
        out.push('\n');
        out.push_str(&body);
    }
    out
}

/// JSON form of a finished job, with parsed listings when available.
pub fn job_result_json(kind: OperationKind, label: &str, result: &JobResult) -> Value {
    let mut value = json!({
        "label": label,
        "succeeded": result.succeeded,
        "exit_code": result.exit_code,
        "special": result.special,
        "output": result.output,
    });
    if result.succeeded {
        match kind {
            OperationKind::ListIndexes => {
                value["images"] = json!(parse_image_indexes(&result.output));
            }
            OperationKind::ListMounts => {
                value["mounts"] = json!(parse_mounted_images(&result.output));
            }
            OperationKind::Mount | OperationKind::Unmount => {}
        }
    }
    value
}

/// Table of images in a container.
pub fn format_indexes(images: &[ImageIndexInfo]) -> String {
    let rows: Vec<Vec<String>> = images
        .iter()
        .map(|image| {
            vec![
                image.index.to_string(),
                image.name.clone().unwrap_or_default(),
                image.size.clone().unwrap_or_default(),
            ]
        })
        .collect();
    format_rows_aligned(&["INDEX", "NAME", "SIZE"], &rows)
}

/// Table of mounted images.
pub fn format_mounts(mounts: &[MountedImage]) -> String {
    let rows: Vec<Vec<String>> = mounts
        .iter()
        .map(|mount| {
            vec![
                mount.mount_dir.clone(),
                mount.image_file.clone().unwrap_or_default(),
                mount.index.map(|i| i.to_string()).unwrap_or_default(),
                match mount.read_write {
                    Some(true) => "rw".to_string(),
                    Some(false) => "ro".to_string(),
                    None => String::new(),
                },
                mount.status.clone().unwrap_or_default(),
            ]
        })
        .collect();
    format_rows_aligned(&["MOUNT DIR", "IMAGE", "INDEX", "MODE", "STATUS"], &rows)
}

/// Which backends are installed.
pub fn format_tools(tools: &[ToolStatus]) -> String {
    tools
        .iter()
        .map(|tool| match &tool.path {
            Some(path) => format!("{} {:<7} {}", good("✓"), tool.backend.name(), path.display()),
            None => format!("{} {:<7} {}", bad("✗"), tool.backend.name(), dim("not found")),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tools_json(tools: &[ToolStatus]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "backend": tool.backend,
                    "path": tool.path.as_ref().map(|p| p.display().to_string()),
                })
            })
            .collect(),
    )
}

/// Job registry listing.
pub fn format_jobs(jobs: &[JobInfo]) -> String {
    if jobs.is_empty() {
        return "(no jobs)".to_string();
    }
    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            vec![
                format!("[{}]", job.id),
                job.state.to_string(),
                job.backend.to_string(),
                job.label.clone(),
                job.submitted_at.format("%H:%M:%S").to_string(),
            ]
        })
        .collect();
    let table = format_rows_aligned(&["JOB", "STATE", "BACKEND", "LABEL", "STARTED"], &rows);

    // Color the state column after alignment so escape codes don't skew widths
    if !use_color() {
        return table;
    }
    let mut lines = table.lines();
    let mut out: Vec<String> = lines.next().map(|h| vec![h.to_string()]).unwrap_or_default();
    for (line, job) in lines.zip(jobs) {
        let state = job.state.to_string();
        let colored = match job.state {
            JobState::Completed(JobOutcome::Success) => good(&state),
            JobState::Completed(JobOutcome::PrivilegeRequired) => warn(&state),
            JobState::Completed(_) => bad(&state),
            JobState::Pending | JobState::Running => state.clone(),
        };
        out.push(line.replacen(&state, &colored, 1));
    }
    out.join("\n")
}

pub fn jobs_json(jobs: &[JobInfo]) -> Value {
    Value::Array(
        jobs.iter()
            .map(|job| {
                json!({
                    "id": job.id.0,
                    "label": job.label,
                    "backend": job.backend,
                    "command": job.command,
                    "state": job.state.to_string(),
                    "submitted_at": job.submitted_at.to_rfc3339(),
                    "finished_at": job.finished_at.map(|t| t.to_rfc3339()),
                })
            })
            .collect(),
    )
}

/// Format rows with aligned columns under a header line.
fn format_rows_aligned(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut col_widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    let header_row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header_row).chain(rows) {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            line.push_str(cell);
            if i < row.len() - 1 {
                let padding = col_widths[i].saturating_sub(cell.chars().count());
                line.push_str(&" ".repeat(padding));
            }
        }
        output.push_str(line.trim_end());
        output.push('\n');
    }

    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_rows_pad_columns() {
        let rows = vec![
            vec!["1".to_string(), "Windows 10 Home".to_string()],
            vec!["10".to_string(), "Pro".to_string()],
        ];
        let table = format_rows_aligned(&["INDEX", "NAME"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "INDEX  NAME");
        assert_eq!(lines[1], "1      Windows 10 Home");
        assert_eq!(lines[2], "10     Pro");
    }

    #[test]
    fn success_status_names_exit_code() {
        let result = JobResult::from_exit(0, "", &[740]);
        let status = format_status("mount /mnt", &result);
        assert!(status.contains("mount /mnt (exit 0)"));
    }

    #[test]
    fn privilege_status_suggests_elevation() {
        let result = JobResult::from_exit(740, "Error: 740", &[740]);
        let status = format_status("unmount /mnt", &result);
        assert!(status.contains("elevated"));
    }

    #[test]
    fn launch_failure_shows_detail() {
        let result = JobResult::launch_failure("failed to launch dism: not found");
        let text = format_job_result(OperationKind::Mount, "mount /mnt", &result);
        assert!(text.contains("launch failed"));
        assert!(text.contains("failed to launch dism"));
    }

    #[test]
    fn listing_is_parsed_into_table() {
        let output = "Index : 1\nName : Windows 10 Home\nSize : 15 GB\n";
        let result = JobResult::from_exit(0, output, &[740]);
        let text = format_job_result(OperationKind::ListIndexes, "list-indexes a.wim", &result);
        assert!(text.contains("INDEX  NAME"));
        assert!(text.contains("Windows 10 Home  15 GB"));
    }

    #[test]
    fn json_includes_parsed_images() {
        let output = "Index : 2\nName : Pro\n";
        let result = JobResult::from_exit(0, output, &[740]);
        let value = job_result_json(OperationKind::ListIndexes, "list-indexes a.wim", &result);
        assert_eq!(value["succeeded"], json!(true));
        assert_eq!(value["exit_code"], json!(0));
        assert_eq!(value["images"][0]["index"], json!(2));
        assert_eq!(value["images"][0]["name"], json!("Pro"));
    }

    #[test]
    fn empty_job_list() {
        assert_eq!(format_jobs(&[]), "(no jobs)");
    }
}
