use crate::config::Config;
use crate::model::{BoardState, Todo, TodoId};
use crate::storage::{
    init_project_store, load_board_state, load_task_list, locate_store, reset_task_list,
    save_board_state, save_task_list, FileStore, StoreLocation,
};
use crate::store::{Action, DragEnd, DragKind, DragSource, DropTarget, Store};
use crate::tasks::{Category, CategorizedTodo, TaskList};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use std::env;

/// Where this invocation reads and writes its state.
pub struct Session {
    pub location: StoreLocation,
    pub files: FileStore,
}

pub fn init(config: &Config, boards: Vec<String>) -> Result<()> {
    let defaults = if boards.is_empty() {
        config.default_state()
    } else {
        BoardState::with_boards(&boards)
    };
    let location = init_project_store(&config.state_key, &defaults)?;
    println!("Initialized boards at {}", location.dir.display());
    Ok(())
}

pub fn list(config: &Config, board: Option<String>) -> Result<()> {
    let session = open_session()?;
    let store = open_store(config, &session)?;
    println!(
        "Boards ({}: {})",
        session.location.scope.label(),
        session.location.dir.display()
    );
    if let Some(ref name) = board {
        require_board(store.state(), name)?;
    }
    for (position, (name, entry)) in store.state().boards().enumerate() {
        if let Some(ref filter) = board {
            if name != filter {
                continue;
            }
        }
        println!("[{}] {} ({})", position, name, entry.todos.len());
        if entry.todos.is_empty() {
            println!("  (empty)");
        }
        for (index, todo) in entry.todos.iter().enumerate() {
            print_todo(index, todo);
        }
        println!();
    }
    Ok(())
}

pub fn add(config: &Config, text: String, board: Option<String>) -> Result<()> {
    let session = open_session()?;
    let mut store = open_store(config, &session)?;
    let board = match board {
        Some(name) => name,
        None => store
            .state()
            .board_at(0)
            .map(|(name, _)| name.to_string())
            .ok_or_else(|| anyhow!("there are no boards yet"))?,
    };
    require_board(store.state(), &board)?;
    commit(
        &mut store,
        Action::AddTodo {
            board: board.clone(),
            text,
        },
    )
    .with_context(|| format!("adding todo to {}", board))?;
    println!("Added todo to {}", board);
    Ok(())
}

pub fn move_todo(
    config: &Config,
    board: String,
    index: usize,
    to: Option<String>,
    at: usize,
) -> Result<()> {
    let session = open_session()?;
    let mut store = open_store(config, &session)?;
    require_todo(store.state(), &board, index)?;
    let dest = to.unwrap_or_else(|| board.clone());
    require_board(store.state(), &dest)?;
    if dest == board && index == at {
        println!("{}[{}] is already there", board, index);
        return Ok(());
    }
    commit(
        &mut store,
        todo_drop(&board, index, Some(DropTarget::Board { board: dest.clone(), index: at })),
    )
    .with_context(|| format!("moving {}[{}] to {}[{}]", board, index, dest, at))?;
    println!("Moved {}[{}] to {}[{}]", board, index, dest, at);
    Ok(())
}

pub fn remove(config: &Config, board: String, index: usize) -> Result<()> {
    let session = open_session()?;
    let mut store = open_store(config, &session)?;
    let text = require_todo(store.state(), &board, index)?.text.clone();
    commit(&mut store, todo_drop(&board, index, Some(DropTarget::Trash)))?;
    println!("Trashed \"{}\"", text);
    Ok(())
}

pub fn board_add(config: &Config, name: String) -> Result<()> {
    let session = open_session()?;
    let mut store = open_store(config, &session)?;
    commit(&mut store, Action::CreateBoard { name: name.clone() })?;
    let name = name.trim();
    let position = store.state().position_of(name).unwrap_or_default();
    println!("Created board {} at position {}", name, position);
    Ok(())
}

pub fn board_move(config: &Config, from: usize, to: usize) -> Result<()> {
    let session = open_session()?;
    let mut store = open_store(config, &session)?;
    let drag = board_drop(store.state(), from, to)?;
    let name = drag.source.board.clone();
    if from == to {
        println!("Board {} is already at position {}", name, to);
        return Ok(());
    }
    commit(&mut store, Action::DragEnd(drag))?;
    println!("Moved board {} to position {}", name, to);
    Ok(())
}

pub fn tasks_list(config: &Config, category: Option<Category>) -> Result<()> {
    let session = open_session()?;
    let list = load_task_list(&session.files, &config.tasks_key)?;
    if list.is_empty() {
        println!("No tasks yet");
        return Ok(());
    }
    let progress = list.progress();
    println!(
        "Tasks: {}/{} done ({:.0}%)",
        progress.completed,
        progress.total,
        progress.percent()
    );
    for cat in Category::ALL {
        if category.is_some_and(|c| c != cat) {
            continue;
        }
        println!("{}", cat.label());
        let mut empty = true;
        for task in list.in_category(cat) {
            print_task(task);
            empty = false;
        }
        if empty {
            println!("  (empty)");
        }
        println!();
    }
    Ok(())
}

pub fn tasks_add(config: &Config, text: String, category: Category) -> Result<()> {
    update_tasks(config, |list| {
        let id = list.add(&text, category)?;
        println!("Added task {} to {}", id, category.label());
        Ok(())
    })
}

pub fn tasks_mark(config: &Config, id: TodoId, category: Category) -> Result<()> {
    update_tasks(config, |list| {
        list.recategorize(id, category)?;
        let text = list.get(id).map(|t| t.text.as_str()).unwrap_or_default();
        println!("Marked \"{}\" as {}", text, category.label());
        Ok(())
    })
}

pub fn tasks_remove(config: &Config, id: TodoId) -> Result<()> {
    update_tasks(config, |list| {
        let task = list.remove(id)?;
        println!("Deleted task \"{}\"", task.text);
        Ok(())
    })
}

pub fn tasks_reset(config: &Config) -> Result<()> {
    let mut session = open_session()?;
    reset_task_list(&mut session.files, &config.tasks_key)?;
    println!("Cleared all tasks");
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let session = open_session()?;
    let store = open_store(config, &session)?;
    let tasks = load_task_list(&session.files, &config.tasks_key)?;
    ui::run(store, tasks, session, config.tasks_key.clone())
}

fn open_session() -> Result<Session> {
    let cwd = env::current_dir()?;
    let location = locate_store(&cwd)?;
    let files = FileStore::new(&location.dir);
    Ok(Session { location, files })
}

/// Loads the saved boards and subscribes persistence so every applied
/// action is written back before `dispatch` returns.
pub fn open_store(config: &Config, session: &Session) -> Result<Store> {
    let state = load_board_state(&session.files, &config.state_key, &config.default_state())?;
    let mut store = Store::new(state);
    let mut files = session.files.clone();
    let key = config.state_key.clone();
    store.subscribe(move |state| save_board_state(&mut files, &key, state));
    Ok(store)
}

fn update_tasks<F>(config: &Config, f: F) -> Result<()>
where
    F: FnOnce(&mut TaskList) -> Result<()>,
{
    let mut session = open_session()?;
    let mut list = load_task_list(&session.files, &config.tasks_key)?;
    f(&mut list)?;
    save_task_list(&mut session.files, &config.tasks_key, &list)
}

fn commit(store: &mut Store, action: Action) -> Result<()> {
    match store.dispatch(action) {
        Ok(true) => Ok(()),
        Ok(false) => bail!("nothing changed (check board names and positions)"),
        Err(err) => Err(err.into()),
    }
}

fn todo_drop(board: &str, index: usize, destination: Option<DropTarget>) -> Action {
    Action::DragEnd(DragEnd {
        kind: DragKind::Todo,
        source: DragSource {
            board: board.to_string(),
            index,
        },
        destination,
    })
}

fn board_drop(state: &BoardState, from: usize, to: usize) -> Result<DragEnd> {
    let (name, _) = state
        .board_at(from)
        .ok_or_else(|| anyhow!("no board at position {}", from))?;
    let (target, _) = state
        .board_at(to)
        .ok_or_else(|| anyhow!("no board at position {}", to))?;
    Ok(DragEnd {
        kind: DragKind::Board,
        source: DragSource {
            board: name.to_string(),
            index: from,
        },
        destination: Some(DropTarget::Board {
            board: target.to_string(),
            index: to,
        }),
    })
}

fn require_board<'a>(state: &'a BoardState, name: &str) -> Result<&'a crate::model::Board> {
    state
        .board(name)
        .ok_or_else(|| anyhow!("board not found: {}", name))
}

fn require_todo<'a>(state: &'a BoardState, board: &str, index: usize) -> Result<&'a Todo> {
    let entry = require_board(state, board)?;
    entry
        .todos
        .get(index)
        .ok_or_else(|| anyhow!("{} has no todo at position {}", board, index))
}

fn print_todo(index: usize, todo: &Todo) {
    println!("  {:>3}. {}  ({})", index, todo.text, todo.id);
}

fn print_task(task: &CategorizedTodo) {
    println!("  - {}: {}", task.id, task.text);
}
