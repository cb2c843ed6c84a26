//! Ideaflow CLI - command line interface for the orchestrator HTTP API.

use clap::{Parser, Subcommand};
use serde_json::json;

use ideaflow_core::{MatchResult, WorkflowResult};

/// Ideaflow CLI - submit ideas and inspect results
#[derive(Parser)]
#[command(name = "ideaflow")]
#[command(about = "CLI for the Ideaflow orchestrator", long_about = None)]
struct Cli {
    /// Orchestrator base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an idea and wait for the aggregated result
    Submit {
        /// Raw idea text
        idea: String,

        /// Conversation id (enables memory across submissions)
        #[arg(short, long, default_value = "default")]
        conversation: String,

        /// Team id for collaboration notifications
        #[arg(short, long, default_value = "default")]
        team: String,
    },

    /// Find collaborator matches for an idea
    Matches {
        /// Idea text to match against
        idea: String,

        /// Number of matches to return
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,

        /// Candidate id to exclude
        #[arg(short, long)]
        exclude: Option<String>,
    },

    /// Show the stage history of a conversation
    History {
        /// Conversation id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Submit {
            idea,
            conversation,
            team,
        } => submit(&client, &cli.addr, &idea, &conversation, &team).await?,
        Commands::Matches {
            idea,
            top_k,
            exclude,
        } => matches(&client, &cli.addr, &idea, top_k, exclude).await?,
        Commands::History { id } => history(&client, &cli.addr, &id).await?,
    }

    Ok(())
}

async fn submit(
    client: &reqwest::Client,
    addr: &str,
    idea: &str,
    conversation: &str,
    team: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/v1/workflows", addr))
        .json(&json!({
            "raw_idea": idea,
            "conversation_id": conversation,
            "team_id": team,
            "stream": false,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("submission failed: {}", body).into());
    }

    let result: WorkflowResult = response.json().await?;
    println!("Run {} finished: {:?}", result.run_id, result.status);
    if result.degraded {
        let stages: Vec<String> = result
            .degraded_stages
            .iter()
            .map(|s| s.to_string())
            .collect();
        println!("Degraded stages: {}", stages.join(", "));
    }
    if let Some(report) = result.report {
        println!();
        println!("{} [{}]", report.title, report.domains.join(", "));
        println!(
            "Overall {:.2} | Feasibility {:.1}/5 | {}",
            report.overall_score,
            report.feasibility_score,
            report.readiness.message()
        );
        println!();
        println!("{}", report.summary);
    }
    Ok(())
}

async fn matches(
    client: &reqwest::Client,
    addr: &str,
    idea: &str,
    top_k: usize,
    exclude: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut query = vec![
        ("idea".to_string(), idea.to_string()),
        ("top_k".to_string(), top_k.to_string()),
    ];
    if let Some(exclude) = exclude {
        query.push(("exclude_id".to_string(), exclude));
    }

    let response = client
        .get(format!("{}/v1/matches", addr))
        .query(&query)
        .send()
        .await?;

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("match request failed: {}", body).into());
    }

    let results: Vec<MatchResult> = response.json().await?;
    if results.is_empty() {
        println!("No matches found.");
        return Ok(());
    }
    for (rank, m) in results.iter().enumerate() {
        println!(
            "{:>2}. {:<24} {:>5.1}  {:?}  [{:?}]",
            rank + 1,
            m.candidate.name,
            m.score,
            m.recommended_action,
            m.candidate.source,
        );
        println!("    {}", m.rationale);
    }
    Ok(())
}

async fn history(
    client: &reqwest::Client,
    addr: &str,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/v1/conversations/{}/history", addr, id))
        .send()
        .await?;

    if response.status().as_u16() == 404 {
        println!("No history for conversation {}", id);
        return Ok(());
    }
    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("history request failed: {}", body).into());
    }

    let records: Vec<serde_json::Value> = response.json().await?;
    for record in &records {
        let stage = record["stage"].as_str().unwrap_or("?");
        let fallback = record["used_fallback"].as_bool().unwrap_or(false);
        let at = record["recorded_at"].as_str().unwrap_or("?");
        println!(
            "{:<22} {} {}",
            stage,
            at,
            if fallback { "(fallback)" } else { "" }
        );
    }
    println!("{} record(s).", records.len());
    Ok(())
}
