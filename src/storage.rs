use crate::model::{Board, BoardState, Todo, TodoId};
use crate::tasks::TaskList;
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PROJECT_DIR: &str = ".todoboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub dir: PathBuf,
    pub scope: StoreScope,
}

impl StoreScope {
    pub fn label(&self) -> &'static str {
        match self {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    }
}

/// String-keyed persistent entries, one serialized value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Keeps each key in `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        Ok(Some(data))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {:?}", self.dir))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("writing {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {:?}", path))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {:?}", path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!("invalid storage key {:?} (use letters, digits, '_' or '-')", key);
    }
    Ok(())
}

pub fn init_project_store(
    state_key: &str,
    defaults: &BoardState,
) -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {} directory", PROJECT_DIR))?;
    let mut files = FileStore::new(&dir);
    if files.get(state_key)?.is_none() {
        save_board_state(&mut files, state_key, defaults)?;
    }
    Ok(StoreLocation {
        dir,
        scope: StoreScope::Project,
    })
}

pub fn locate_store(start: &Path) -> Result<StoreLocation> {
    if let Some(dir) = find_project_dir(start) {
        return Ok(StoreLocation {
            dir,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        dir: global_data_dir()?,
        scope: StoreScope::Global,
    })
}

pub fn global_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "todoboard").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn find_project_dir(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// Boards as they may appear on disk: full records, or bare todo arrays
/// written before boards carried an explicit order.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBoard {
    Record { todos: Vec<Todo>, order: usize },
    Bare(Vec<Todo>),
}

#[derive(thiserror::Error, Debug)]
enum ShapeError {
    #[error("not a board map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no boards")]
    Empty,
    #[error("blank board name")]
    BlankName,
    #[error("todo id {0} appears more than once")]
    DuplicateTodo(TodoId),
}

fn parse_board_state(raw: &str) -> Result<BoardState, ShapeError> {
    let stored: IndexMap<String, StoredBoard> = serde_json::from_str(raw)?;
    if stored.is_empty() {
        return Err(ShapeError::Empty);
    }
    let mut entries = Vec::with_capacity(stored.len());
    for (position, (name, board)) in stored.into_iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ShapeError::BlankName);
        }
        let board = match board {
            StoredBoard::Record { todos, order } => Board { todos, order },
            StoredBoard::Bare(todos) => Board {
                todos,
                order: position,
            },
        };
        entries.push((name, board));
    }
    let mut seen = HashSet::new();
    for todo in entries.iter().flat_map(|(_, b)| b.todos.iter()) {
        if !seen.insert(todo.id) {
            return Err(ShapeError::DuplicateTodo(todo.id));
        }
    }
    Ok(BoardState::from_entries(entries))
}

/// Reads the board state under `key`. Missing or mis-shaped data yields
/// `defaults`; a stored value is either adopted whole or not at all.
pub fn load_board_state(
    store: &impl KeyValueStore,
    key: &str,
    defaults: &BoardState,
) -> Result<BoardState> {
    let Some(raw) = store.get(key)? else {
        debug!(key, "no saved board state, using defaults");
        return Ok(defaults.clone());
    };
    match parse_board_state(&raw) {
        Ok(state) => Ok(state),
        Err(reason) => {
            warn!(key, %reason, "discarding saved board state");
            Ok(defaults.clone())
        }
    }
}

pub fn save_board_state(
    store: &mut impl KeyValueStore,
    key: &str,
    state: &BoardState,
) -> Result<()> {
    let serialized = serde_json::to_string(state).context("serializing board state")?;
    store.set(key, &serialized)?;
    debug!(key, boards = state.len(), todos = state.todo_count(), "saved board state");
    Ok(())
}

pub fn load_task_list(store: &impl KeyValueStore, key: &str) -> Result<TaskList> {
    let Some(raw) = store.get(key)? else {
        return Ok(TaskList::default());
    };
    match serde_json::from_str(&raw) {
        Ok(list) => Ok(list),
        Err(err) => {
            warn!(key, %err, "discarding saved task list");
            Ok(TaskList::default())
        }
    }
}

pub fn save_task_list(store: &mut impl KeyValueStore, key: &str, list: &TaskList) -> Result<()> {
    let serialized = serde_json::to_string(list).context("serializing task list")?;
    store.set(key, &serialized)
}

pub fn reset_task_list(store: &mut impl KeyValueStore, key: &str) -> Result<()> {
    store.remove(key)?;
    info!(key, "task list reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Category;

    const KEY: &str = "todo_state";

    fn store_with(raw: &str) -> MemoryStore {
        let mut store = MemoryStore::default();
        store.set(KEY, raw).unwrap();
        store
    }

    fn load(store: &MemoryStore) -> BoardState {
        load_board_state(store, KEY, &BoardState::default_boards()).unwrap()
    }

    #[test]
    fn absent_state_uses_defaults() {
        let store = MemoryStore::default();
        assert_eq!(load(&store), BoardState::default_boards());
    }

    #[test]
    fn minimal_record_is_adopted_as_is() {
        let store = store_with(r#"{"To Do": {"todos": [], "order": 0}}"#);
        let state = load(&store);
        assert_eq!(state.len(), 1);
        assert_eq!(state.board("To Do").unwrap().order, 0);
        assert!(state.board("To Do").unwrap().todos.is_empty());
    }

    #[test]
    fn non_board_entry_falls_back_to_defaults() {
        let store = store_with(r#"{"To Do": "not-an-array"}"#);
        assert_eq!(load(&store), BoardState::default_boards());
    }

    #[test]
    fn one_bad_entry_discards_everything() {
        let store = store_with(
            r#"{"Keep": {"todos": [{"id": 1, "text": "a"}], "order": 0}, "Bad": {"order": 1}}"#,
        );
        assert_eq!(load(&store), BoardState::default_boards());
    }

    #[test]
    fn garbage_and_empty_maps_fall_back() {
        for raw in ["not json", "[]", "{}", r#"{"  ": []}"#] {
            assert_eq!(load(&store_with(raw)), BoardState::default_boards(), "{raw}");
        }
    }

    #[test]
    fn duplicate_todo_ids_fall_back() {
        let store = store_with(
            r#"{"A": {"todos": [{"id": 1, "text": "a"}], "order": 0},
                "B": {"todos": [{"id": 1, "text": "b"}], "order": 1}}"#,
        );
        assert_eq!(load(&store), BoardState::default_boards());
    }

    #[test]
    fn bare_arrays_take_order_from_position() {
        let store = store_with(r#"{"Now": [{"id": 3, "text": "x"}], "Later": []}"#);
        let state = load(&store);
        assert_eq!(state.board_at(0).map(|(n, _)| n), Some("Now"));
        assert_eq!(state.board("Later").unwrap().order, 1);
        assert_eq!(state.board("Now").unwrap().todos[0].text, "x");
    }

    #[test]
    fn largest_stored_id_does_not_break_adding() {
        let store = store_with(
            r#"{"To Do":{"todos":[{"id":9223372036854775807,"text":"x"}],"order":0}}"#,
        );
        let mut boards = crate::store::Store::new(load(&store));
        assert_eq!(boards.state().max_id(), Some(i64::MAX));
        let add = crate::store::Action::AddTodo {
            board: "To Do".into(),
            text: "y".into(),
        };
        assert_eq!(boards.dispatch(add), Ok(false));
        assert_eq!(boards.state().todo_count(), 1);
    }

    #[test]
    fn orders_are_renumbered_on_load() {
        let store = store_with(concat!(
            r#"{"B": {"todos": [], "order": 5}, "A": {"todos": [], "order": 1}, "#,
            r#""extra": {"todos": [], "order": 9, "color": "red"}}"#,
        ));
        let state = load(&store);
        let order: Vec<_> = state.boards().map(|(n, b)| (n, b.order)).collect();
        assert_eq!(order, vec![("A", 0), ("B", 1), ("extra", 2)]);
    }

    #[test]
    fn save_then_load_keeps_state() {
        let mut store = MemoryStore::default();
        let mut state = BoardState::default_boards();
        state.add_todo_at("Doing", "write docs", 7).unwrap();
        state.reorder_boards(2, 0).unwrap();
        save_board_state(&mut store, KEY, &state).unwrap();
        assert_eq!(load(&store), state);
    }

    #[test]
    fn file_store_round_trip_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let mut files = FileStore::new(tmp.path().join("nested"));
        assert_eq!(files.get("todos").unwrap(), None);
        files.set("todos", "[]").unwrap();
        assert_eq!(files.get("todos").unwrap().as_deref(), Some("[]"));
        assert!(tmp.path().join("nested/todos.json").exists());
        files.remove("todos").unwrap();
        assert_eq!(files.get("todos").unwrap(), None);
        files.remove("todos").unwrap();
    }

    #[test]
    fn keys_cannot_escape_the_directory() {
        let files = FileStore::new("/tmp");
        assert!(files.path_for("../etc/passwd").is_err());
        assert!(files.path_for("").is_err());
        assert!(files.path_for("todo_state").is_ok());
    }

    #[test]
    fn finds_project_dir_in_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(PROJECT_DIR)).unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let location = locate_store(&nested).unwrap();
        assert_eq!(location.scope, StoreScope::Project);
        assert_eq!(location.dir, tmp.path().join(PROJECT_DIR));
    }

    #[test]
    fn task_list_persist_and_reset() {
        let mut store = MemoryStore::default();
        let mut list = TaskList::default();
        list.add_at("a", Category::Doing, 1).unwrap();
        save_task_list(&mut store, "todos", &list).unwrap();
        assert_eq!(load_task_list(&store, "todos").unwrap(), list);
        reset_task_list(&mut store, "todos").unwrap();
        assert!(store.get("todos").unwrap().is_none());
        assert!(load_task_list(&store, "todos").unwrap().is_empty());
    }

    #[test]
    fn malformed_task_list_is_discarded() {
        let store = store_with("{oops");
        assert!(load_task_list(&store, KEY).unwrap().is_empty());
    }
}
