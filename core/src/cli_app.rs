use crate::attachment_form::{AttachmentForm, PollForm};
use crate::chat_types::{LinkedEntities, UserId};
use crate::collaborators::{InMemoryTaskBoard, NoopNotifier, StaticRoster};
use crate::composer::Composer;
use crate::config::Config;
use crate::conversation::{ConversationType, NewConversation};
use crate::extract::extract_task;
use crate::insight::{InsightAnalyzer, InsightType, RuleAnalyzer};
use crate::records_store::{RecordEntry, SledRecordsStore};
use crate::workspace::{Collaborators, SendMessage, TaskConfirmation, Workspace};
use colored::*;
use std::sync::Arc;
use std::time::Duration;

/// Shared CLI implementation for the `cli` binary and the `core` demo.
pub fn run(args: Vec<String>) -> anyhow::Result<()> {
    let bin = args
        .first()
        .map(|s| s.as_str())
        .unwrap_or("threadline")
        .to_string();

    if args.len() < 2 {
        print_usage(&bin);
        return Ok(());
    }

    let command = &args[1];

    match command.as_str() {
        "analyze" => {
            if args.len() < 3 {
                eprintln!("{}", format!("Usage: {} analyze <text>", bin).yellow());
                return Ok(());
            }
            analyze(&args[2..].join(" "))?;
        }
        "extract" => {
            if args.len() < 4 {
                eprintln!("{}", format!("Usage: {} extract <context> <text>", bin).yellow());
                return Ok(());
            }
            // Literal "\n" lets list items be typed on one shell line
            let text = args[3..].join(" ").replace("\\n", "\n");
            extract(&args[2], &text);
        }
        "demo" => {
            // args[1] stands in for the binary name so flags start at index 2
            let config = Config::from_args(&args[1..])
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(demo(config))?;
        }
        "records" => {
            let (limit, config) = records_args(&args)
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            list_records(&config, limit)?;
        }
        _ => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), command.red());
            print_usage(&bin);
        }
    }

    Ok(())
}

fn print_usage(bin: &str) {
    println!("{}", "⚡ Threadline CLI".bright_cyan().bold());
    println!();
    println!("{}", "Usage:".bright_white().bold());
    println!("  {} <command> [args]", bin.cyan());
    println!();
    println!("{}", "Commands:".bright_white().bold());
    println!(
        "  {} <text>                 Run the insight rules over a message",
        "analyze".cyan()
    );
    println!(
        "  {} <context> <text>       Extract a task draft from text",
        "extract".cyan()
    );
    println!(
        "  {} [flags]                   Run a scripted Campaign Chat session",
        "demo".cyan()
    );
    println!(
        "  {} [limit] [flags]        Show the most recent saved records",
        "records".cyan()
    );
}

fn analyze(text: &str) -> anyhow::Result<()> {
    let candidates = RuleAnalyzer::deterministic().analyze(text)?;
    if candidates.is_empty() {
        println!("{}", "No insights for this message".yellow());
        return Ok(());
    }
    for candidate in candidates {
        println!(
            "{} {} {}",
            "✓".green().bold(),
            candidate.title.bright_white().bold(),
            format!("({})", candidate.insight_type).dimmed()
        );
        println!("  {}", candidate.description);
    }
    Ok(())
}

fn extract(context: &str, text: &str) {
    let draft = extract_task(text, context);
    println!("{}", draft.title.bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    println!("{}", draft.description);
    if draft.subtasks.is_empty() {
        println!("{}", "No subtasks found".dimmed());
        return;
    }
    println!();
    for subtask in &draft.subtasks {
        println!("  {} {}", "•".cyan(), subtask.title);
    }
}

/// `records [limit] [flags]`: an optional leading count, then the usual config flags
fn records_args(args: &[String]) -> crate::Result<(usize, Config)> {
    let (limit, flags_from) = match args.get(2).and_then(|s| s.parse::<usize>().ok()) {
        Some(limit) => (limit, 3),
        None => (10, 2),
    };
    // The slot before the first flag stands in for the binary name
    let config = Config::from_args(&args[flags_from - 1..])?;
    Ok((limit, config))
}

fn list_records(config: &Config, limit: usize) -> anyhow::Result<()> {
    let store = SledRecordsStore::new(&config.data_dir())?;
    let entries = store.list_recent(limit)?;
    if entries.is_empty() {
        println!("{}", "No records saved yet".yellow());
        return Ok(());
    }
    println!(
        "{}",
        format!("Records ({} of {})", entries.len(), store.count())
            .bright_cyan()
            .bold()
    );
    println!("{}", "─".repeat(60).dimmed());
    for entry in entries {
        let saved_at = entry.saved_at().format("%Y-%m-%d %H:%M").to_string();
        match entry {
            RecordEntry::Message {
                conversation_title,
                message,
                saved_by,
                ..
            } => println!(
                "  {} message in {} by {}: {}",
                saved_at.dimmed(),
                conversation_title.cyan(),
                saved_by.to_string().green(),
                message.preview(60)
            ),
            RecordEntry::Transcript {
                transcript,
                saved_by,
                ..
            } => println!(
                "  {} transcript of {} by {} ({} messages)",
                saved_at.dimmed(),
                transcript.title.cyan(),
                saved_by.to_string().green(),
                transcript.messages.len()
            ),
        }
    }
    Ok(())
}

/// Scripted session: a few messages, wait out the insight delay, turn the
/// task recommendation into a confirmed task, archive a transcript.
pub async fn demo(config: Config) -> anyhow::Result<()> {
    let roster = StaticRoster::new([
        ("ana", "Ana Ruiz"),
        ("raj", "Raj Patel"),
        ("mei", "Mei Chen"),
    ]);
    let tasks = Arc::new(InMemoryTaskBoard::new());
    let records = Arc::new(SledRecordsStore::new(&config.data_dir())?);
    let collaborators = Collaborators {
        roster: Arc::new(roster.clone()),
        tasks: tasks.clone(),
        records,
        notifier: Arc::new(NoopNotifier),
    };
    let wait = config.insight_delay + Duration::from_millis(100);
    let workspace = Workspace::new(config, collaborators)?;

    let ana = UserId::from("ana");
    let raj = UserId::from("raj");
    let mei = UserId::from("mei");
    let conversation_id = workspace
        .create_conversation(NewConversation {
            conversation_type: ConversationType::Project,
            title: "Campaign Chat".to_string(),
            subtitle: Some("Q3 client campaigns".to_string()),
            participant_ids: vec![ana.clone(), raj.clone(), mei.clone()],
            linked: LinkedEntities::default(),
        })
        .await?;

    workspace
        .send_message(
            &conversation_id,
            SendMessage::text(raj.clone(), "Morning! Q3 numbers are in the shared folder."),
        )
        .await?;
    let request = workspace
        .send_message(
            &conversation_id,
            SendMessage::text(
                ana.clone(),
                "Raj, can you pull data for CA-45 and CA-92 by tomorrow? \
                 Then we draft the memo for the client.",
            ),
        )
        .await?;

    let mut composer = Composer::new();
    let mut poll = PollForm {
        question: "Memo format?".to_string(),
        ..Default::default()
    };
    poll.set_option(0, "One-pager");
    poll.set_option(1, "Slide deck");
    composer.attach(&AttachmentForm::Poll(poll), &roster)?;
    composer.set_text("Quick vote while we wait on the numbers");
    let (text, attachments) = composer.take();
    workspace
        .send_message(
            &conversation_id,
            SendMessage::text(mei.clone(), text).with_attachments(attachments),
        )
        .await?;

    let conversation = workspace.conversation(&conversation_id).await?;
    println!("{}", format!("# {}", conversation.title()).bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    for message in conversation.messages() {
        println!("{} {}", message.sender_name.green().bold(), message.text);
        for attachment in &message.attachments {
            println!(
                "  {} {}",
                attachment.label().cyan(),
                attachment.subtitle().unwrap_or_default().dimmed()
            );
        }
    }
    println!(
        "{}",
        format!("Insights pending: {}", conversation.insights().len()).dimmed()
    );

    tokio::time::sleep(wait).await;

    let insights = workspace.insights(&conversation_id).await?;
    println!();
    println!("{}", format!("Insights ({})", insights.len()).bright_white().bold());
    for insight in &insights {
        println!(
            "  {} {} - {}",
            "✦".yellow(),
            insight.title.bright_white(),
            insight.description
        );
    }

    let recommendation = insights
        .iter()
        .find(|i| i.insight_type == InsightType::TaskRecommendation);
    if let Some(insight) = recommendation {
        let (acted, draft) = workspace.act_on_insight(&conversation_id, &insight.id).await?;
        println!();
        println!("{} {}", "Draft:".bright_white().bold(), draft.title.cyan());
        for subtask in &draft.subtasks {
            println!("  {} {}", "•".cyan(), subtask.title);
        }

        let source_message_id = acted.source_message_id.unwrap_or_else(|| request.id.clone());
        let (task_id, card) = workspace
            .confirm_task(
                &conversation_id,
                TaskConfirmation {
                    confirmed_by: raj.clone(),
                    draft,
                    source_message_id,
                },
            )
            .await?;
        println!("{} {} ({})", "✓".green().bold(), card.text, task_id.to_string().dimmed());
    }

    workspace.mark_read(&conversation_id, &ana).await?;
    let record_id = workspace
        .save_transcript_to_records(&conversation_id, &ana)
        .await?;

    println!();
    println!("{}", "Summary".bright_white().bold());
    for summary in workspace.list_conversations().await {
        println!(
            "  {} v{} · {} pending · {}",
            summary.title.cyan(),
            summary.version,
            summary.pending_insights,
            summary.last_message_preview.unwrap_or_default()
        );
    }
    println!("  tasks on board: {}", tasks.tasks().len());
    println!("  transcript saved as {}", record_id.dimmed());

    workspace.archive_conversation(&conversation_id).await?;
    Ok(())
}
