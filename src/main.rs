use std::error::Error;
use std::io::{BufRead, Write};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::io::AsyncBufReadExt;

use quire::config::{self, QuireConfig};
use quire::core::folder::Folder;
use quire::core::history::Section;
use quire::core::id::EntityId;
use quire::core::note::{Note, NoteDraft, NotePatch};
use quire::core::todo::{Todo, TodoDraft, TodoPatch, TodoSection};
use quire::local::LocalStore;
use quire::local::backend::FileBackend;
use quire::search;
use quire::state::AppStore;
use quire::sync::api::{HttpRemote, OfflineRemote, RemoteService};
use quire::sync::{Applied, Reconciler};
use quire::views::{NoteFilter, Sidebar, TodoBoard};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

const USAGE: &str = "\
usage: quire [--api URL] [--offline] [--yes] [--search QUERY] <command>

  folders                              folder tree with note counts
  folder add <name>
  folder rename <id> <name>
  folder rm <id>

  notes [all|unorganized|archived|<folder-id>]
  note show <id>
  note add <title> [--folder <id>]
  note title <id> <title>
  note write <id> general|discussion <text>
  note stash <id> general|discussion   move the text into history
  note forget <id> general|discussion <index>
  note mv <id> <folder-id|none>
  note archive <id>
  note restore <id>
  note rm <id>

  todos [--all]
  board [--all]                        live board: x <id> toggles, q quits
  todo add <quick-wins|delegate|general|high-priority> <text>
  todo edit <id> <text>
  todo mv <id> <section>
  todo detail <id> details|stakeholders|target <text>
  todo toggle <id>
  todo rm <id>

  config                               show the active configuration
";

const BOARD_HELP: &str = "x <id> toggles a todo, q quits";

#[derive(Debug, Default)]
struct Cli {
    api: Option<String>,
    offline: bool,
    yes: bool,
    debug: bool,
    help: bool,
    show_completed: bool,
    search: Option<String>,
    folder: Option<EntityId>,
    command: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> CliResult<Cli> {
    let mut cli = Cli::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--api" => cli.api = Some(args.next().ok_or("--api needs a URL")?),
            "--offline" => cli.offline = true,
            "--yes" | "-y" => cli.yes = true,
            "--debug" => cli.debug = true,
            "--all" => cli.show_completed = true,
            "--search" => cli.search = Some(args.next().ok_or("--search needs a query")?),
            "--folder" => {
                let id = args.next().ok_or("--folder needs an id")?;
                cli.folder = Some(parse_id(&id)?);
            }
            "-h" | "--help" => cli.help = true,
            _ => cli.command.push(arg),
        }
    }
    Ok(cli)
}

fn parse_id(s: &str) -> CliResult<EntityId> {
    s.parse().map_err(|_| format!("not an id: {}", s).into())
}

fn parse_section(s: &str) -> CliResult<Section> {
    Section::from_label(s).ok_or_else(|| format!("unknown section: {}", s).into())
}

fn parse_todo_section(s: &str) -> CliResult<TodoSection> {
    TodoSection::from_key(s).ok_or_else(|| format!("unknown section: {}", s).into())
}

/// Patch for one of the todo detail fields. Target dates must be `YYYY-MM-DD`.
fn detail_patch(field: &str, value: String) -> CliResult<TodoPatch> {
    let mut patch = TodoPatch::default();
    match field {
        "details" => patch.details = Some(value),
        "stakeholders" => patch.stakeholders = Some(value),
        "target" => {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map_err(|_| format!("target date must be YYYY-MM-DD: {}", value))?;
            patch.target_date = Some(value.trim().to_string());
        }
        other => return Err(format!("unknown detail: {}", other).into()),
    }
    Ok(patch)
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = parse_args(std::env::args().skip(1))?;
    if cli.help || cli.command.is_empty() {
        print!("{}", USAGE);
        return Ok(());
    }

    let config = QuireConfig::load(&config::config_path());
    init_logging(config.debug_logging || cli.debug);

    let local = LocalStore::new(FileBackend::new(config.data_directory.clone()));
    let store = Arc::new(AppStore::new());

    if cli.offline {
        run(Reconciler::new(OfflineRemote, local, store), &cli, &config).await
    } else {
        let base_url = cli.api.as_deref().unwrap_or(&config.api_base_url);
        let remote = HttpRemote::new(base_url)?;
        log::debug!("Using backend at {}", remote.base_url());
        run(Reconciler::new(remote, local, store), &cli, &config).await
    }
}

/// Journal logging (`journalctl --user -t quire -f`). Crate targets log at
/// info, or debug when toggled; everything else at warn.
fn init_logging(debug: bool) {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("quire") {
                let max = if quire::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }

        fn flush(&self) {
            self.inner.flush();
        }
    }

    quire::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("quire".to_string()),
        Err(e) => {
            if debug {
                eprintln!("journal unavailable, running without logs: {}", e);
            }
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max stays at Debug so the toggle can let debug records through.
        log::set_max_level(log::LevelFilter::Debug);
    }
}

async fn run<R: RemoteService>(rec: Reconciler<R>, cli: &Cli, config: &QuireConfig) -> CliResult {
    rec.load_folders().await;
    rec.load_notes().await;
    rec.load_todos().await;
    if let Some(query) = &cli.search {
        rec.store().set_query(query);
    }

    let args: Vec<&str> = cli.command.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["folders"] => print_sidebar(&rec),

        ["folder", "add", name @ ..] => {
            let applied = rec.create_folder(&name.join(" ")).await?;
            println!("Created folder #{} {}{}", applied.value.id, applied.value.name, offline_note(&applied));
        }
        ["folder", "rename", id, name @ ..] => {
            let id = parse_id(id)?;
            let applied = rec.rename_folder(id, &name.join(" ")).await?;
            match &applied.value {
                Some(folder) => println!("Renamed folder #{} to {}{}", id, folder.name, offline_note(&applied)),
                None => println!("No folder #{}", id),
            }
        }
        ["folder", "rm", id] => {
            let id = parse_id(id)?;
            if confirm(cli, &format!("Delete folder #{}? Its notes become unorganized.", id))? {
                let applied = rec.delete_folder(id).await?;
                println!("Deleted folder #{}{}", id, offline_note(&applied));
            }
        }

        ["notes"] => print_notes(&rec, NoteFilter::All),
        ["notes", filter] => {
            let filter = NoteFilter::parse(filter).ok_or_else(|| format!("unknown filter: {}", filter))?;
            print_notes(&rec, filter);
        }

        ["note", "show", id] => {
            let note = find_note(&rec, parse_id(id)?)?;
            print_note(&note, &rec.store().folders());
        }
        ["note", "add", title @ ..] => {
            let draft = NoteDraft {
                folder_id: cli.folder,
                ..NoteDraft::titled(&title.join(" "))
            };
            let applied = rec.create_note(draft).await?;
            println!("Created note #{} {}{}", applied.value.id, applied.value.title, offline_note(&applied));
        }
        ["note", "title", id, title @ ..] => {
            let patch = NotePatch {
                title: Some(title.join(" ")),
                ..NotePatch::default()
            };
            edit_note(&rec, parse_id(id)?, patch, "Renamed").await?;
        }
        ["note", "write", id, section, text @ ..] => {
            let text = text.join(" ");
            let patch = match parse_section(section)? {
                Section::GeneralNotes => NotePatch {
                    general_notes: Some(text),
                    ..NotePatch::default()
                },
                Section::DiscussionPoints => NotePatch {
                    discussion_points: Some(text),
                    ..NotePatch::default()
                },
            };
            edit_note(&rec, parse_id(id)?, patch, "Saved").await?;
        }
        ["note", "stash", id, section] => {
            let note = find_note(&rec, parse_id(id)?)?;
            let section = parse_section(section)?;
            match note.move_to_history(section, &Local::now()) {
                Some(patch) => edit_note(&rec, note.id, patch, "Moved to history:").await?,
                None => println!("{} is empty, nothing to move", section.label()),
            }
        }
        ["note", "forget", id, section, index] => {
            let note = find_note(&rec, parse_id(id)?)?;
            let section = parse_section(section)?;
            let index: usize = index.parse().map_err(|_| format!("not an index: {}", index))?;
            let Some(patch) = note.delete_history_entry(section, index) else {
                println!("No {} entry {} on note #{}", section.label(), index, note.id);
                return Ok(());
            };
            if confirm(cli, &format!("Delete history entry {} from note #{}?", index, note.id))? {
                edit_note(&rec, note.id, patch, "Updated history of").await?;
            }
        }
        ["note", "mv", id, target] => {
            let folder = match *target {
                "none" => None,
                other => Some(parse_id(other)?),
            };
            let applied = rec.move_note(parse_id(id)?, folder).await?;
            report_note(&applied, "Moved");
        }
        ["note", "archive", id] => {
            let applied = rec.archive_note(parse_id(id)?).await?;
            report_note(&applied, "Archived");
        }
        ["note", "restore", id] => {
            let applied = rec.restore_note(parse_id(id)?).await?;
            report_note(&applied, "Restored");
        }
        ["note", "rm", id] => {
            let id = parse_id(id)?;
            if confirm(cli, &format!("Delete note #{}?", id))? {
                let applied = rec.delete_note(id).await;
                println!("Deleted note #{}{}", id, offline_note(&applied));
            }
        }

        ["todos"] => {
            let board = opening_board(&rec, config);
            let query = cli.search.as_deref().unwrap_or("");
            print!("{}", render_board(&board, &rec.store().todos(), Utc::now(), cli.show_completed, query));
        }
        ["board"] => run_board(&rec, cli, config).await?,
        ["todo", "add", section, text @ ..] => {
            let section = parse_todo_section(section)?;
            let applied = rec.create_todo(TodoDraft::new(&text.join(" "), section)).await?;
            println!("Added todo #{} to {}{}", applied.value.id, section.title(), offline_note(&applied));
        }
        ["todo", "edit", id, text @ ..] => {
            let patch = TodoPatch {
                text: Some(text.join(" ")),
                ..TodoPatch::default()
            };
            edit_todo(&rec, parse_id(id)?, patch, "Updated").await?;
        }
        ["todo", "mv", id, section] => {
            let patch = TodoPatch {
                section: Some(parse_todo_section(section)?),
                ..TodoPatch::default()
            };
            edit_todo(&rec, parse_id(id)?, patch, "Moved").await?;
        }
        ["todo", "detail", id, field, value @ ..] => {
            let patch = detail_patch(field, value.join(" "))?;
            edit_todo(&rec, parse_id(id)?, patch, "Updated").await?;
        }
        ["todo", "toggle", id] => {
            let applied = rec.toggle_todo(parse_id(id)?).await;
            match &applied.value {
                Some(todo) => {
                    let mark = if todo.completed { "Completed" } else { "Reopened" };
                    println!("{} todo #{} {}{}", mark, todo.id, todo.text, offline_note(&applied));
                }
                None => println!("No todo #{}", id),
            }
        }
        ["todo", "rm", id] => {
            let id = parse_id(id)?;
            if confirm(cli, &format!("Delete todo #{}?", id))? {
                let applied = rec.delete_todo(id).await;
                println!("Deleted todo #{}{}", id, offline_note(&applied));
            }
        }

        ["config"] => {
            println!("# {}", config::config_path().display());
            println!("{}", serde_json::to_string_pretty(config)?);
        }

        _ => return Err(format!("unknown command: {}\n\n{}", args.join(" "), USAGE).into()),
    }
    Ok(())
}

fn offline_note<T>(applied: &Applied<T>) -> &'static str {
    if applied.is_local() {
        " (offline, saved locally)"
    } else {
        ""
    }
}

fn confirm(cli: &Cli, prompt: &str) -> CliResult<bool> {
    if cli.yes {
        return Ok(true);
    }
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn find_note<R: RemoteService>(rec: &Reconciler<R>, id: EntityId) -> CliResult<Note> {
    rec.store()
        .notes()
        .iter()
        .find(|n| n.id == id)
        .cloned()
        .ok_or_else(|| format!("no note #{}", id).into())
}

async fn edit_note<R: RemoteService>(rec: &Reconciler<R>, id: EntityId, patch: NotePatch, verb: &str) -> CliResult {
    let applied = rec.update_note(id, patch).await?;
    report_note(&applied, verb);
    Ok(())
}

fn report_note(applied: &Applied<Option<Note>>, verb: &str) {
    match &applied.value {
        Some(note) => println!("{} note #{} {}{}", verb, note.id, note.title, offline_note(applied)),
        None => println!("No such note"),
    }
}

async fn edit_todo<R: RemoteService>(
    rec: &Reconciler<R>,
    id: EntityId,
    patch: TodoPatch,
    verb: &str,
) -> CliResult {
    let applied = rec.update_todo(id, patch).await?;
    match &applied.value {
        Some(todo) => println!(
            "{} todo #{} {} [{}]{}",
            verb,
            todo.id,
            todo.text,
            todo.section.title(),
            offline_note(&applied)
        ),
        None => println!("No todo #{}", id),
    }
    Ok(())
}

fn emphasize(text: &str, query: &str) -> String {
    search::highlight(text, query)
        .iter()
        .map(|s| {
            if s.matched {
                format!("\x1b[1m{}\x1b[0m", s.text)
            } else {
                s.text.to_string()
            }
        })
        .collect()
}

fn print_sidebar<R: RemoteService>(rec: &Reconciler<R>) {
    let folders = rec.store().folders();
    let view = rec.store().notes_view();
    let sidebar = Sidebar::new(&folders, &view);
    let counts = sidebar.counts();

    for folder in sidebar.visible_folders() {
        let count = counts
            .per_folder
            .iter()
            .find(|(id, _)| *id == folder.id)
            .map_or(0, |(_, n)| *n);
        println!("{:>6}  {}  ({})", format!("#{}", folder.id), folder.name, count);
    }
    println!("        Unorganized  ({})", counts.unorganized);
    println!("        Archived  ({})", counts.archived);
}

fn print_notes<R: RemoteService>(rec: &Reconciler<R>, filter: NoteFilter) {
    let folders = rec.store().folders();
    let view = rec.store().notes_view();
    let notes = filter.apply(view.visible(), &folders);
    if notes.is_empty() {
        println!("No notes");
        return;
    }
    for note in notes {
        let place = folder_label(note, &folders);
        println!("{:>6}  {}  [{}]", format!("#{}", note.id), emphasize(&note.title, &view.query), place);
    }
}

fn folder_label(note: &Note, folders: &[Folder]) -> String {
    if note.is_archived() {
        return "archived".to_string();
    }
    note.folder_id
        .and_then(|id| folders.iter().find(|f| f.id == id))
        .map_or_else(|| "unorganized".to_string(), |f| f.name.clone())
}

fn print_note(note: &Note, folders: &[Folder]) {
    println!("#{} {}  [{}]", note.id, note.title, folder_label(note, folders));
    if let Some(updated) = note.updated_at {
        println!("updated {}", updated.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
    for section in Section::ALL {
        println!("\n{}:", section.label());
        let text = note.section_text(section);
        if !text.is_empty() {
            println!("{}", text);
        }
        for (i, entry) in note.history.entries(section).iter().enumerate() {
            println!("  [{}] {}", i, entry);
        }
    }
}

/// Board as it opens: todos already completed start out hidden.
fn opening_board<R: RemoteService>(rec: &Reconciler<R>, config: &QuireConfig) -> TodoBoard {
    let mut completed = rec.completed_ids();
    completed.extend(rec.store().todos().iter().filter(|t| t.completed).map(|t| t.id));
    TodoBoard::new(completed, config.board_timing())
}

fn render_board(
    board: &TodoBoard,
    todos: &[Todo],
    now: DateTime<Utc>,
    show_completed: bool,
    query: &str,
) -> String {
    let mut out = String::new();
    for (section, items) in board.by_section(todos, now, show_completed, query) {
        out.push_str(section.title());
        out.push('\n');
        for todo in items {
            let mark = if board.is_completed(todo.id) { "x" } else { " " };
            let line = format!(
                "  [{}] {:>6}  {}",
                mark,
                format!("#{}", todo.id),
                emphasize(&todo.text, query)
            );
            if board.is_fading(todo.id, now) {
                out.push_str(&format!("\x1b[2m{}\x1b[0m\n", line));
            } else {
                out.push_str(&line);
                out.push('\n');
            }
            for (label, value) in [
                ("details", &todo.details),
                ("stakeholders", &todo.stakeholders),
                ("target", &todo.target_date),
            ] {
                if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                    out.push_str(&format!("              {}: {}\n", label, value));
                }
            }
        }
    }
    out
}

/// Interactive board. Checked todos fade, then drop out on the configured
/// timers; the board redraws whenever what it shows changes.
async fn run_board<R: RemoteService>(
    rec: &Reconciler<R>,
    cli: &Cli,
    config: &QuireConfig,
) -> CliResult {
    let mut board = opening_board(rec, config);
    let query = cli.search.clone().unwrap_or_default();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(250));
    let mut shown = String::new();

    println!("{}", BOARD_HELP);
    loop {
        let frame = render_board(
            &board,
            &rec.store().todos(),
            Utc::now(),
            cli.show_completed,
            &query,
        );
        if frame != shown {
            print!("\n{}> ", frame);
            std::io::stdout().flush()?;
            shown = frame;
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    ["q"] | ["quit"] => break,
                    ["x", id] => match parse_id(id) {
                        Ok(id) => match rec.toggle_todo(id).await.value {
                            Some(todo) => board.set_completed(todo.id, todo.completed, Utc::now()),
                            None => println!("No todo #{}", id),
                        },
                        Err(e) => println!("{}", e),
                    },
                    [] => {}
                    _ => println!("{}", BOARD_HELP),
                }
                // Force a redraw after any input so the prompt comes back.
                shown.clear();
            }
            _ = ticker.tick() => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire::views::BoardTiming;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn flags_are_pulled_out_of_the_command() {
        let cli = parse_args(args("--offline note add Weekly sync --folder 4 -y")).unwrap();
        assert!(cli.offline);
        assert!(cli.yes);
        assert_eq!(cli.folder, Some(4));
        assert_eq!(cli.command, args("note add Weekly sync"));
    }

    #[test]
    fn api_flag_takes_a_value() {
        let cli = parse_args(args("--api http://notes.lan/api folders")).unwrap();
        assert_eq!(cli.api.as_deref(), Some("http://notes.lan/api"));
        assert_eq!(cli.command, args("folders"));
        assert!(parse_args(args("--api")).is_err());
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("forty").is_err());
        assert!(parse_section("general").is_ok());
        assert!(parse_section("misc").is_err());
        assert_eq!(parse_todo_section("high-priority").unwrap(), TodoSection::HighPriority);
    }

    #[test]
    fn detail_fields_map_onto_the_patch() {
        let patch = detail_patch("stakeholders", "Finance team".into()).unwrap();
        assert_eq!(patch.stakeholders.as_deref(), Some("Finance team"));
        assert!(patch.details.is_none());

        let patch = detail_patch("target", " 2026-11-02 ".into()).unwrap();
        assert_eq!(patch.target_date.as_deref(), Some("2026-11-02"));

        assert!(detail_patch("target", "next week".into()).is_err());
        assert!(detail_patch("owner", "me".into()).is_err());
    }

    #[test]
    fn board_dims_then_drops_a_checked_todo() {
        let t0 = Utc::now();
        let todos = vec![
            Todo::from_draft(1, &TodoDraft::new("Review reports", TodoSection::HighPriority), t0),
            Todo::from_draft(2, &TodoDraft::new("Send emails", TodoSection::QuickWins), t0),
        ];
        let mut board = TodoBoard::new(Default::default(), BoardTiming::default());
        board.set_completed(2, true, t0);

        let fresh = render_board(&board, &todos, t0, false, "");
        assert!(fresh.contains("  [x]     #2  Send emails\n"));

        let fading = render_board(&board, &todos, t0 + chrono::Duration::seconds(4), false, "");
        assert!(fading.contains("\x1b[2m  [x]     #2  Send emails\x1b[0m"));

        let later = render_board(&board, &todos, t0 + chrono::Duration::seconds(6), false, "");
        assert!(!later.contains("Send emails"));
        assert!(later.contains("Review reports"));
    }
}
