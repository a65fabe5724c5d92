//! Compares the local fallback cache with the backend and lists what only one
//! side has. Read-only: nothing is pushed or pulled.

use std::collections::{BTreeSet, HashMap};

use quire::config::{self, QuireConfig};
use quire::core::id::EntityId;
use quire::local::LocalStore;
use quire::local::backend::FileBackend;
use quire::sync::api::{HttpRemote, RemoteService};

struct Report {
    matched: usize,
    local_only: Vec<String>,
    remote_only: Vec<String>,
    mismatched: Vec<String>,
}

fn compare<T>(local: &[T], remote: &[T], id: fn(&T) -> EntityId, describe: fn(&T) -> String, differs: fn(&T, &T) -> bool) -> Report {
    let remote_by_id: HashMap<EntityId, &T> = remote.iter().map(|r| (id(r), r)).collect();
    let local_ids: BTreeSet<EntityId> = local.iter().map(id).collect();

    let mut report = Report {
        matched: 0,
        local_only: Vec::new(),
        remote_only: Vec::new(),
        mismatched: Vec::new(),
    };
    for item in local {
        match remote_by_id.get(&id(item)) {
            Some(other) => {
                report.matched += 1;
                if differs(item, other) {
                    report.mismatched.push(format!("local: {}, remote: {}", describe(item), describe(other)));
                }
            }
            None => report.local_only.push(describe(item)),
        }
    }
    report.remote_only = remote
        .iter()
        .filter(|r| !local_ids.contains(&id(r)))
        .map(describe)
        .collect();
    report
}

fn print_report(kind: &str, local: usize, remote: usize, report: &Report) {
    println!("\n--- {} ---", kind);
    println!("  Local: {}, remote: {}, matched: {}", local, remote, report.matched);

    let sections = [
        ("DIFFERENT", &report.mismatched),
        ("LOCAL ONLY (never reached the server)", &report.local_only),
        ("ON SERVER ONLY", &report.remote_only),
    ];
    for (title, items) in sections {
        if !items.is_empty() {
            println!("\n  {} ({}):", title, items.len());
            for item in items.iter() {
                println!("    {}", item);
            }
        }
    }
    if report.mismatched.is_empty() && report.local_only.is_empty() && report.remote_only.is_empty() {
        println!("  All in sync!");
    }
}

#[tokio::main]
async fn main() {
    match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => {
            if let Err(e) = journal
                .with_syslog_identifier("quire-cache-check".to_string())
                .install()
            {
                eprintln!("Failed to install journal logger: {}", e);
            }
        }
        Err(e) => eprintln!("Journal unavailable, running without logs: {}", e),
    }
    log::set_max_level(log::LevelFilter::Info);

    let config = QuireConfig::load(&config::config_path());
    let base_url = std::env::args()
        .skip_while(|a| a != "--api")
        .nth(1)
        .unwrap_or_else(|| config.api_base_url.clone());

    println!("=== Local cache vs {} ===", base_url);
    println!("Cache: {}", config.data_directory.display());

    let local = LocalStore::new(FileBackend::new(config.data_directory.clone()));
    let remote = match HttpRemote::new(&base_url) {
        Ok(r) => r,
        Err(e) => {
            println!("  Client error: {}", e);
            return;
        }
    };

    match remote.list_folders().await {
        Ok(remote_folders) => {
            let local_folders = local.load_folders();
            let report = compare(
                &local_folders,
                &remote_folders,
                |f| f.id,
                |f| format!("#{} {}", f.id, f.name),
                |a, b| a.name != b.name,
            );
            print_report("Folders", local_folders.len(), remote_folders.len(), &report);
        }
        Err(e) => println!("  Error listing folders: {}", e),
    }

    match remote.list_notes(None).await {
        Ok(remote_notes) => {
            let local_notes = local.load_notes();
            let report = compare(
                &local_notes,
                &remote_notes,
                |n| n.id,
                |n| {
                    let state = if n.is_archived() { "archived" } else { "active" };
                    format!("#{} [{}] {}", n.id, state, n.title)
                },
                |a, b| a.title != b.title || a.is_archived() != b.is_archived() || a.folder_id != b.folder_id,
            );
            print_report("Notes", local_notes.len(), remote_notes.len(), &report);
        }
        Err(e) => println!("  Error listing notes: {}", e),
    }

    match remote.list_todos(None).await {
        Ok(remote_todos) => {
            let local_todos = local.load_todos();
            let report = compare(
                &local_todos,
                &remote_todos,
                |t| t.id,
                |t| format!("#{} [{}] {}", t.id, if t.completed { "x" } else { " " }, t.text),
                |a, b| a.text != b.text || a.completed != b.completed || a.section != b.section,
            );
            print_report("Todos", local_todos.len(), remote_todos.len(), &report);
        }
        Err(e) => println!("  Error listing todos: {}", e),
    }

    println!("\n=== Done ===");
}
