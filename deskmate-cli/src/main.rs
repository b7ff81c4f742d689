//! deskmate-cli: command-line client for the Deskmate HTTP API
//!
//! # Subcommands
//! - `ask <tenant> <query> [--conversation <id>] [--json]`: ask the assistant
//! - `search <tenant> <query> [-n <limit>] [--semantic] [--json]`: ranked knowledge search
//! - `status`: show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";
const DEFAULT_LIMIT: usize = 5;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "deskmate-cli", version, about = "Deskmate retail knowledge assistant CLI")]
struct Cli {
    /// Deskmate HTTP server URL (overrides DESKMATE_HTTP_URL env var)
    #[arg(long, env = "DESKMATE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a question the way an employee would
    Ask {
        /// Tenant (company) id
        tenant: String,

        /// Question text
        query: String,

        /// Conversation id, keeps history between calls
        #[arg(long)]
        conversation: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Search the knowledge base
    Search {
        /// Tenant (company) id
        tenant: String,

        /// Query text to search for
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Rank by embeddings instead of keywords
        #[arg(long)]
        semantic: bool,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show Deskmate server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub response_text: String,
    pub localized_text: String,
    pub matched_record_id: Option<String>,
    pub confidence_score: f64,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub is_automated: bool,
    pub path: String,
    pub took_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub record_id: String,
    pub title: String,
    pub body: String,
    pub record_type: Option<String>,
    pub similarity_score: f64,
    pub is_pattern_match: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: usize,
    pub took_ms: Option<u64>,
}

// ============================================================================
// Formatting
// ============================================================================

pub fn format_answer(answer: &AskResponse) -> String {
    let mut out = format!("{}\n\n", answer.localized_text);
    if answer.response_text != answer.localized_text {
        out.push_str(&format!("[en] {}\n\n", answer.response_text));
    }
    for url in &answer.media_urls {
        out.push_str(&format!("media: {}\n", url));
    }
    out.push_str(&format!(
        "path: {}  confidence: {:.0}%  automated: {}",
        answer.path,
        answer.confidence_score * 100.0,
        if answer.is_automated { "yes" } else { "no" }
    ));
    if let Some(id) = &answer.matched_record_id {
        out.push_str(&format!("  record: {}", id));
    }
    out
}

pub fn format_result(rank: usize, r: &SearchResult) -> String {
    let kind = if r.is_pattern_match {
        "manager answer"
    } else {
        r.record_type.as_deref().unwrap_or("record")
    };
    let preview: String = r.body.chars().take(200).collect();
    format!(
        "{}. {} [{}] {:.0}%\n   {}\n   {}",
        rank,
        r.title,
        kind,
        r.similarity_score * 100.0,
        r.record_id,
        preview
    )
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST a JSON body and return the parsed JSON response, exiting on HTTP errors.
fn post_json(url: &str, body: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let resp = match client(60)?.post(url).json(body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("deskmate-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("deskmate-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    Ok(resp.json()?)
}

fn do_ask(
    server: &str,
    tenant: &str,
    query: &str,
    conversation: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let url = format!("{}/ask", server);
    let body = serde_json::json!({
        "tenant_id": tenant,
        "query": query,
        "conversation_id": conversation,
        "caller": "deskmate-cli",
    });

    let value = post_json(&url, &body)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let answer: AskResponse = serde_json::from_value(value)?;
    println!("{}", format_answer(&answer));
    Ok(())
}

fn do_search(
    server: &str,
    tenant: &str,
    query: &str,
    limit: usize,
    semantic: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let endpoint = if semantic { "semantic-search" } else { "search" };
    let url = format!("{}/{}", server, endpoint);
    let body = serde_json::json!({
        "tenant_id": tenant,
        "query": query,
        "limit": limit,
    });

    let value = post_json(&url, &body)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let search_resp: SearchResponse = serde_json::from_value(value)?;
    if search_resp.results.is_empty() {
        eprintln!("No results found for: {}", query);
        return Ok(());
    }
    for (i, r) in search_resp.results.iter().enumerate() {
        println!("{}\n", format_result(i + 1, r));
    }
    if let Some(ms) = search_resp.took_ms {
        eprintln!("{} results in {} ms", search_resp.count, ms);
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Deskmate server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Corpus:          {}", body["corpus"].as_str().unwrap_or("?"));
            println!("Embedding:       {}", body["embedding"].as_str().unwrap_or("disabled"));
            println!("Generation:      {}", body["generation"].as_str().unwrap_or("disabled"));
            println!("Locale:          {}", body["locale"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("deskmate-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("deskmate-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ask {
            tenant,
            query,
            conversation,
            json,
        } => do_ask(&server, &tenant, &query, conversation.as_deref(), json),
        Commands::Search {
            tenant,
            query,
            limit,
            semantic,
            json,
        } => do_search(&server, &tenant, &query, limit, semantic, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("deskmate-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
