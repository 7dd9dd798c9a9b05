// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `manfred session` command implementations.
//!
//! Read-mostly views over the session store. `--json` emits structured
//! output for scripting; otherwise a table, colored when stdout is a TTY.

use chrono::{DateTime, Utc};
use serde::Serialize;

use manfred_core::{ManfredError, Phase, Session, SessionEvent, SessionFilter, SessionStore};

/// Filters accepted by `manfred session list`.
#[derive(Debug, Default)]
pub struct ListArgs {
    pub repo: Option<String>,
    pub phase: Option<Phase>,
    pub active: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListArgs {
    /// `--repo` takes `owner` or `owner/repo`.
    pub fn to_filter(&self) -> Result<SessionFilter, ManfredError> {
        let mut filter = SessionFilter::new();
        if let Some(repo) = &self.repo {
            let (owner, name) = match repo.split_once('/') {
                Some((owner, name)) => (owner, Some(name)),
                None => (repo.as_str(), None),
            };
            if owner.is_empty() || name.is_some_and(str::is_empty) {
                return Err(ManfredError::Config(format!(
                    "--repo expects owner or owner/repo, got {repo:?}"
                )));
            }
            filter = filter.owner(owner);
            if let Some(name) = name {
                filter = filter.repository(name);
            }
        }
        if let Some(phase) = self.phase {
            filter = filter.phase(phase);
        }
        if self.active {
            filter = filter.active_only();
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        if let Some(offset) = self.offset {
            filter = filter.offset(offset);
        }
        Ok(filter)
    }
}

/// Structured output of `manfred session show --json`.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub valid_transitions: Vec<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<SessionEvent>>,
}

/// Structured output of `manfred session stats --json`.
#[derive(Debug, Serialize)]
pub struct SessionStats {
    pub total: u64,
    pub active: u64,
    pub by_phase: Vec<PhaseCount>,
}

#[derive(Debug, Serialize)]
pub struct PhaseCount {
    pub phase: Phase,
    pub count: u64,
}

pub async fn run_list(
    store: &dyn SessionStore,
    args: &ListArgs,
    json: bool,
    use_color: bool,
) -> Result<(), ManfredError> {
    let sessions = store.list(&args.to_filter()?).await?;
    if json {
        println!("{}", to_json(&sessions));
        return Ok(());
    }
    if sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }

    println!(
        "{:<40} {:<18} {:>6} {:<20}",
        "ID", "PHASE", "PR", "LAST ACTIVITY"
    );
    for s in &sessions {
        let pr = s.pr_number().map_or_else(|| "-".to_string(), |n| format!("#{n}"));
        println!(
            "{:<40} {} {:>6} {:<20}",
            s.id(),
            phase_cell(s.phase(), use_color),
            pr,
            format_time(s.last_activity())
        );
    }
    Ok(())
}

pub async fn run_show(
    store: &dyn SessionStore,
    id: &str,
    with_events: bool,
    json: bool,
    use_color: bool,
) -> Result<(), ManfredError> {
    let session = store
        .get(id)
        .await?
        .ok_or_else(|| ManfredError::NotFound {
            session_id: id.to_string(),
        })?;
    let events = if with_events {
        Some(store.get_events(id).await?)
    } else {
        None
    };

    let detail = SessionDetail {
        valid_transitions: session.phase().valid_transitions().to_vec(),
        session,
        events,
    };
    if json {
        println!("{}", to_json(&detail));
    } else {
        print_detail(&detail, use_color);
    }
    Ok(())
}

pub async fn run_delete(store: &dyn SessionStore, id: &str) -> Result<(), ManfredError> {
    store.delete(id).await?;
    println!("deleted {id}");
    Ok(())
}

pub async fn run_stats(
    store: &dyn SessionStore,
    json: bool,
    use_color: bool,
) -> Result<(), ManfredError> {
    let stats = collect_stats(store).await?;
    if json {
        println!("{}", to_json(&stats));
        return Ok(());
    }

    println!();
    println!("  manfred sessions");
    println!("  {}", "-".repeat(35));
    for entry in &stats.by_phase {
        println!(
            "    {} {:>6}",
            phase_cell(entry.phase, use_color),
            entry.count
        );
    }
    println!("  {}", "-".repeat(35));
    println!("    {:<18} {:>6}", "active", stats.active);
    println!("    {:<18} {:>6}", "total", stats.total);
    println!();
    Ok(())
}

pub async fn collect_stats(store: &dyn SessionStore) -> Result<SessionStats, ManfredError> {
    let mut by_phase = Vec::with_capacity(Phase::ALL.len());
    for phase in Phase::ALL {
        let count = store.count(&SessionFilter::new().phase(phase)).await?;
        by_phase.push(PhaseCount { phase, count });
    }
    Ok(SessionStats {
        total: by_phase.iter().map(|p| p.count).sum(),
        active: store.count(&SessionFilter::new().active_only()).await?,
        by_phase,
    })
}

fn print_detail(detail: &SessionDetail, use_color: bool) {
    let s = &detail.session;
    println!();
    println!("  {}", s.id());
    println!("  {}", "-".repeat(35));
    println!("    Issue:     {}#{}", s.repo_full_name(), s.issue_number());
    println!("    Phase:     {}", paint(s.phase(), s.phase().display_name(), use_color));
    println!("    Branch:    {}", s.branch());
    if let Some(pr) = s.pr_number() {
        println!("    PR:        #{pr}");
    }
    if let Some(container) = s.container_ref() {
        println!("    Container: {container}");
    }
    println!("    Created:   {}", format_time(s.created_at()));
    println!("    Activity:  {}", format_time(s.last_activity()));
    if let Some(err) = s.error_text() {
        println!("    Error:     {err}");
    }

    let next = if detail.valid_transitions.is_empty() {
        "(none)".to_string()
    } else {
        detail
            .valid_transitions
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("    Next:      {next}");

    if let Some(plan) = s.plan_text() {
        println!();
        println!("  Plan:");
        for line in plan.lines() {
            println!("    {line}");
        }
    }

    if let Some(events) = &detail.events {
        println!();
        println!("  Events:");
        if events.is_empty() {
            println!("    (none)");
        }
        for e in events {
            let payload = e
                .payload
                .as_ref()
                .map(|p| format!(" {p}"))
                .unwrap_or_default();
            println!(
                "    {}  {}{payload}",
                format_time(e.created_at),
                e.event_type
            );
        }
    }
    println!();
}

/// Phase padded to a fixed column.
fn phase_cell(phase: Phase, use_color: bool) -> String {
    paint(phase, &format!("{:<18}", phase.as_str()), use_color)
}

/// Colors `text` by where `phase` sits in the workflow.
fn paint(phase: Phase, text: &str, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    use colored::Colorize;
    match phase {
        Phase::Completed => text.green().to_string(),
        Phase::Error => text.red().to_string(),
        Phase::AwaitingApproval | Phase::InReview => text.yellow().to_string(),
        _ => text.cyan().to_string(),
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
