mod logging;

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use lexmerge_core::sense_merge::merge_senses_into;
use lexmerge_core::{
    Database, DuplicateSuggester, ExitCode, LexiconConfig, MergeSource, MergeUnit, Scope,
    SemanticDomain, Sense, StringSuggester, Word,
};
use lexmerge_engine::{EngineError, LexiconBackend, SqliteBackend};
use tracing::debug;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lexmerge",
    about = "Find and merge duplicate entries in a lexicon",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project to work in. Also read from LEXMERGE_PROJECT.
    #[arg(long, global = true)]
    project: Option<String>,

    /// Acting user. Also read from LEXMERGE_USER.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Output in JSON format. Also enabled by setting LEXMERGE_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging for the lexmerge crates.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the database.
    Init,

    /// Add a word. An existing entry that already covers it absorbs it.
    Add {
        vernacular: String,
        #[arg(long)]
        gloss: Option<String>,
        /// Gloss language (defaults to core.analysis_language).
        #[arg(long)]
        lang: Option<String>,
        /// Semantic domain id, e.g. 2.1.1.
        #[arg(long)]
        domain: Option<String>,
        #[arg(long, default_value = "")]
        domain_name: String,
        /// Always create a new entry.
        #[arg(long)]
        no_merge: bool,
    },

    /// List the words in the frontier.
    List,

    /// Suggest frontier words that look like `text`.
    Suggest {
        text: String,
        #[arg(long)]
        exclude: Option<String>,
        #[arg(long)]
        max: Option<usize>,
        /// Match against glosses in the analysis language instead.
        #[arg(long, conflicts_with = "exclude")]
        gloss: bool,
    },

    /// Bulk duplicate review.
    Dups {
        #[command(subcommand)]
        action: DupsAction,
    },

    /// Merge children into a parent.
    Merge {
        /// Parent word id. Its senses absorb the children's.
        #[arg(long, required_unless_present = "delete_only")]
        parent: Option<String>,
        /// Child id, optionally suffixed with `:audio` to keep its audio.
        #[arg(long = "child", required = true, action = clap::ArgAction::Append)]
        children: Vec<String>,
        /// Remove the children without folding them anywhere.
        #[arg(long)]
        delete_only: bool,
    },

    /// Undo a merge.
    Undo {
        #[arg(long = "parent", action = clap::ArgAction::Append)]
        parents: Vec<String>,
        #[arg(long = "child", required = true, action = clap::ArgAction::Append)]
        children: Vec<String>,
    },

    /// Show recent merges.
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

// ─── Dups Actions ───────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum DupsAction {
    /// Search the frontier for clusters of likely duplicates.
    Find {
        #[arg(long)]
        max_in_list: Option<usize>,
        #[arg(long)]
        max_lists: Option<usize>,
        /// Seconds to wait for the search.
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
    /// Mark a set of words as not duplicates. They are never proposed again.
    Blacklist {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,
    },
    /// Defer a set of words for later review.
    Graylist {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,
    },
    /// Show deferred sets that still have at least two words.
    Deferred {
        #[arg(long)]
        max_lists: Option<usize>,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::configure_logging(cli.verbose);

    let json_output = cli.json || std::env::var("LEXMERGE_JSON").as_deref() == Ok("1");

    if let Err(err) = run(cli, json_output).await {
        let code = exit_code_for(&err);
        if json_output {
            let body = serde_json::json!({
                "status": "error",
                "error": error_label(code),
                "message": err.to_string(),
            });
            println!("{body}");
        } else {
            eprintln!("error: {err:#}");
        }
        std::process::exit(code as i32);
    }
}

async fn run(cli: Cli, json_output: bool) -> Result<()> {
    let start = Instant::now();
    let config = LexiconConfig::load()?;
    let scope = Scope::new(
        cli.project
            .or_else(|| std::env::var("LEXMERGE_PROJECT").ok())
            .unwrap_or_else(|| "default".to_string()),
        cli.user
            .or_else(|| std::env::var("LEXMERGE_USER").ok())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "local".to_string()),
    );
    debug!(project = %scope.project_id, user = %scope.user_id, "resolved scope");

    match cli.command {
        Commands::Init => {
            let path = LexiconConfig::config_path();
            if !path.exists() {
                config.save_to(&path)?;
            }
            let db = Database::open(&config.database_path())?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "config": path, "database": db.path() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("config:   {}", path.display());
                println!("database: {}", db.path().unwrap_or("(in memory)"));
            }
        }

        // ── Words ──────────────────────────────────────────────────────────

        Commands::Add { vernacular, gloss, lang, domain, domain_name, no_merge } => {
            let backend = open_backend(&config)?;

            let mut sense = Sense::new();
            if let Some(text) = gloss {
                let lang = lang.unwrap_or_else(|| config.core.analysis_language.clone());
                sense = sense.with_gloss(lang, text);
            }
            if let Some(id) = domain {
                sense = sense.with_domain(SemanticDomain::new(id, domain_name));
            }
            let word = Word::new(vernacular).with_sense(sense);

            let existing = if no_merge { None } else { backend.duplicate_id(&scope, &word).await? };
            let (id, merged_into) = match existing {
                Some(dup_id) => {
                    let id = backend.update_duplicate(&scope, &dup_id, &word).await?;
                    (id, Some(dup_id))
                }
                None => (backend.create_word(&scope, word).await?.id, None),
            };
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "id": id, "merged_into": merged_into },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if let Some(dup_id) = merged_into {
                println!("{id}  (folded into existing entry {dup_id})");
            } else {
                println!("{id}");
            }
        }

        Commands::List => {
            let backend = open_backend(&config)?;
            let words = backend.frontier_words(&scope).await?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": words, "total": words.len() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if words.is_empty() {
                println!("No words in project {}. Use `lexmerge add` to add one.", scope.project_id);
            } else {
                for word in &words {
                    println!("{}  {:<24}  {}", word.id, word.vernacular, gloss_summary(word));
                }
            }
        }

        Commands::Suggest { text, max, gloss: true, .. } => {
            let backend = open_backend(&config)?;
            let frontier = backend.frontier_words(&scope).await?;
            let glosses = frontier_glosses(&frontier, &config.core.analysis_language);
            let mut suggester = StringSuggester::from_config(&config.suggest);
            if let Some(max) = max {
                suggester = suggester.with_max_count(max);
            }
            let items = suggester.suggest(&text, &glosses);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": items, "query": text, "language": config.core.analysis_language },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if items.is_empty() {
                println!("No similar glosses.");
            } else {
                for item in &items {
                    println!("{item}");
                }
            }
        }

        Commands::Suggest { text, exclude, max, gloss: false } => {
            let backend = open_backend(&config)?;
            let frontier = backend.frontier_words(&scope).await?;
            let mut suggester = DuplicateSuggester::from_config(&config.suggest);
            if let Some(max) = max {
                suggester = suggester.with_max_count(max);
            }
            let ids = suggester.duplicates_from_frontier(&frontier, &text, exclude.as_deref());
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": ids, "query": text },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if ids.is_empty() {
                println!("No similar words.");
            } else {
                for id in &ids {
                    if let Some(word) = frontier.iter().find(|w| &w.id == id) {
                        println!("{id}  {}", word.vernacular);
                    }
                }
            }
        }

        // ── Duplicates ─────────────────────────────────────────────────────

        Commands::Dups { action } => {
            let backend = open_backend(&config)?;
            match action {
                DupsAction::Find { max_in_list, max_lists, timeout } => {
                    let max_in_list = max_in_list.unwrap_or(config.dedup.max_in_list);
                    let max_lists = max_lists.unwrap_or(config.dedup.max_lists);
                    backend.find_potential_duplicates(&scope, max_in_list, max_lists).await?;

                    let deadline = Instant::now() + Duration::from_secs(timeout);
                    while backend.is_search_running(&scope)? {
                        if Instant::now() >= deadline {
                            return Err(anyhow!("duplicate search did not finish within {timeout}s"));
                        }
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }

                    let clusters = backend.retrieve_potential_duplicates(&scope).await?;
                    print_clusters(&clusters, json_output, start)?;
                }

                DupsAction::Blacklist { ids } => {
                    backend.blacklist_add(&scope, &ids).await?;
                    print_ok(json_output, start, serde_json::json!({ "blacklisted": ids }))?;
                }

                DupsAction::Graylist { ids } => {
                    backend.graylist_add(&scope, &ids).await?;
                    print_ok(json_output, start, serde_json::json!({ "graylisted": ids }))?;
                }

                DupsAction::Deferred { max_lists } => {
                    let max_lists = max_lists.unwrap_or(config.dedup.max_lists);
                    let clusters = backend.graylist_entries(&scope, max_lists).await?;
                    print_clusters(&clusters, json_output, start)?;
                }
            }
        }

        // ── Merges ─────────────────────────────────────────────────────────

        Commands::Merge { parent, children, delete_only } => {
            let backend = open_backend(&config)?;
            let sources = children
                .iter()
                .map(|raw| parse_child(raw))
                .collect::<Result<Vec<_>>>()?;

            let unit = if delete_only {
                MergeUnit::delete_only(sources)
            } else {
                let parent_id = parent.ok_or_else(|| anyhow!("--parent is required"))?;
                let frontier = backend.frontier_words(&scope).await?;
                MergeUnit::merge(folded_parent(&frontier, &parent_id, &sources)?, sources)
            };

            let mut results = backend.merge_words(&scope, vec![unit]).await;
            let survivor = results.pop().ok_or_else(|| anyhow!("merge returned no result"))??;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "parent": survivor, "children": children },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                match survivor {
                    Some(id) => println!("merged into {id}"),
                    None => println!("deleted {} words", children.len()),
                }
            }
        }

        Commands::Undo { parents, children } => {
            let backend = open_backend(&config)?;
            backend.undo_merge(&scope, &parents, &children).await?;
            print_ok(json_output, start, serde_json::json!({ "restored": children }))?;
        }

        Commands::History { limit } => {
            let backend = open_backend(&config)?;
            let records = backend.merge_history(&scope, limit).await?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": records },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if records.is_empty() {
                println!("No merges yet.");
            } else {
                for record in &records {
                    let state = if record.undone { "undone" } else { "active" };
                    println!(
                        "{}  {:<6}  parents [{}]  children [{}]",
                        record.created_at.format("%Y-%m-%d %H:%M"),
                        state,
                        record.parent_ids.join(" "),
                        record.child_ids.join(" "),
                    );
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn open_backend(config: &LexiconConfig) -> Result<SqliteBackend> {
    let db = Database::open(&config.database_path())?;
    Ok(SqliteBackend::with_config(db, &config.dedup))
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_ok(json_output: bool, start: Instant, data: serde_json::Value) -> Result<()> {
    if json_output {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": data,
            "meta": { "duration_ms": start.elapsed().as_millis() }
        }))
    } else {
        println!("ok");
        Ok(())
    }
}

fn print_clusters(clusters: &[Vec<Word>], json_output: bool, start: Instant) -> Result<()> {
    if json_output {
        return print_json(&serde_json::json!({
            "status": "ok",
            "data": { "clusters": clusters, "total": clusters.len() },
            "meta": { "duration_ms": start.elapsed().as_millis() }
        }));
    }

    if clusters.is_empty() {
        println!("No duplicate candidates.");
    }
    for (idx, cluster) in clusters.iter().enumerate() {
        println!("#{}", idx + 1);
        for word in cluster {
            println!("  {}  {:<24}  {}", word.id, word.vernacular, gloss_summary(word));
        }
    }
    Ok(())
}

fn gloss_summary(word: &Word) -> String {
    word.senses
        .iter()
        .filter(|s| s.is_active())
        .flat_map(|s| s.glosses.values())
        .cloned()
        .collect::<Vec<_>>()
        .join("; ")
}

/// Distinct glosses of active senses in `language`, in frontier order.
fn frontier_glosses(frontier: &[Word], language: &str) -> Vec<String> {
    let mut glosses: Vec<String> = Vec::new();
    for sense in frontier.iter().flat_map(|w| w.senses.iter()).filter(|s| s.is_active()) {
        if let Some(text) = sense.gloss(language) {
            if !text.trim().is_empty() && !glosses.iter().any(|g| g == text) {
                glosses.push(text.to_string());
            }
        }
    }
    glosses
}

/// `ID` or `ID:audio`.
fn parse_child(raw: &str) -> Result<MergeSource> {
    match raw.rsplit_once(':') {
        Some(("", _)) => Err(anyhow!("missing word id in `{raw}`")),
        Some((id, "audio")) => Ok(MergeSource::new(id, true)),
        Some((_, flag)) => Err(anyhow!("unknown child flag `{flag}` in `{raw}`")),
        None => Ok(MergeSource::new(raw, false)),
    }
}

/// The parent as stored, with every child's senses folded in. Audio is left
/// to the per-child flag.
fn folded_parent(frontier: &[Word], parent_id: &str, sources: &[MergeSource]) -> Result<Word> {
    let find = |id: &str| {
        frontier
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("word {id}")))
    };

    let parent = find(parent_id)?;
    let mut folded = parent.clone();
    for source in sources.iter().filter(|s| s.src_word_id != parent_id) {
        folded = merge_senses_into(&folded, find(&source.src_word_id)?);
    }
    folded.audio = parent.audio.clone();
    Ok(folded)
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return engine.exit_code();
    }
    if let Some(core) = err.downcast_ref::<lexmerge_core::LexiconError>() {
        return match core {
            lexmerge_core::LexiconError::Io(_) => ExitCode::FileSystemError,
            lexmerge_core::LexiconError::ConfigError(_)
            | lexmerge_core::LexiconError::TomlParse(_) => ExitCode::InvalidArgs,
            _ => ExitCode::GeneralError,
        };
    }
    ExitCode::GeneralError
}

fn error_label(code: ExitCode) -> &'static str {
    match code {
        ExitCode::Success => "ok",
        ExitCode::NotFound => "not_found",
        ExitCode::InvalidArgs => "invalid_args",
        ExitCode::FileSystemError => "filesystem",
        ExitCode::NetworkError => "busy",
        ExitCode::Conflict => "conflict",
        ExitCode::GeneralError => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexmerge_core::Pronunciation;

    #[test]
    fn parse_child_reads_audio_flag() {
        assert_eq!(parse_child("w1").unwrap(), MergeSource::new("w1", false));
        assert_eq!(parse_child("w1:audio").unwrap(), MergeSource::new("w1", true));
        assert!(parse_child("w1:video").is_err());
        assert!(parse_child(":audio").is_err());
    }

    #[test]
    fn folded_parent_takes_child_senses_but_not_audio() {
        let mut parent = Word::new("test").with_sense(Sense::new().with_gloss("en", "exam"));
        parent.audio.push(Pronunciation::new("test.wav"));
        let mut child = Word::new("tost").with_sense(Sense::new().with_gloss("en", "bread"));
        child.audio.push(Pronunciation::new("tost.wav"));
        let frontier = vec![parent.clone(), child.clone()];

        let sources = vec![MergeSource::new(child.id.clone(), true)];
        let folded = folded_parent(&frontier, &parent.id, &sources).unwrap();

        assert_eq!(folded.id, parent.id);
        assert_eq!(folded.senses.len(), 2);
        assert_eq!(folded.audio, parent.audio);
    }

    #[test]
    fn frontier_glosses_are_distinct_and_in_one_language() {
        let mut retired = Sense::new().with_gloss("en", "stale");
        retired.accessibility = lexmerge_core::Accessibility::Deleted;
        let frontier = vec![
            Word::new("mbwa").with_sense(Sense::new().with_gloss("en", "dog").with_gloss("fr", "chien")),
            Word::new("mbwa").with_sense(Sense::new().with_gloss("en", "dog")),
            Word::new("paka").with_sense(Sense::new().with_gloss("en", "cat")).with_sense(retired),
        ];

        assert_eq!(frontier_glosses(&frontier, "en"), vec!["dog", "cat"]);
        assert_eq!(frontier_glosses(&frontier, "fr"), vec!["chien"]);
    }

    #[test]
    fn unknown_parent_maps_to_not_found_exit() {
        let err: anyhow::Error = folded_parent(&[], "missing", &[]).unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::NotFound);
    }
}
