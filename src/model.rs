use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Creation timestamp in milliseconds, bumped past the largest id in the
/// state when two todos land in the same millisecond.
pub type TodoId = i64;

pub const DEFAULT_BOARDS: [&str; 3] = ["To Do", "Doing", "Done"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Board {
    pub todos: Vec<Todo>,
    pub order: usize,
}

/// Every board keyed by name. Map order always matches each board's `order`.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct BoardState {
    boards: IndexMap<String, Board>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("board name must not be empty")]
    EmptyBoardName,
    #[error("todo text must not be empty")]
    EmptyTodoText,
    #[error("a board named {0:?} already exists")]
    BoardExists(String),
    #[error("board not found: {0}")]
    BoardNotFound(String),
    #[error("index {index} out of range for {target} (len {len})")]
    IndexOutOfRange {
        target: String,
        index: usize,
        len: usize,
    },
    #[error("no todo id left after {0}")]
    IdsExhausted(TodoId),
}

impl BoardError {
    /// Conflicts a person can fix by retrying with other input. The rest are
    /// broken caller contracts (stale indices, vanished boards).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BoardError::EmptyBoardName | BoardError::EmptyTodoText | BoardError::BoardExists(_)
        )
    }
}

impl BoardState {
    pub fn with_boards<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut boards = IndexMap::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || boards.contains_key(name) {
                continue;
            }
            let order = boards.len();
            boards.insert(
                name.to_string(),
                Board {
                    todos: Vec::new(),
                    order,
                },
            );
        }
        BoardState { boards }
    }

    pub fn default_boards() -> Self {
        Self::with_boards(DEFAULT_BOARDS)
    }

    /// Builds a state from loosely ordered entries, renumbering `order` to
    /// `0..N-1` while keeping ties in their given sequence.
    pub(crate) fn from_entries(mut entries: Vec<(String, Board)>) -> Self {
        entries.sort_by_key(|(_, board)| board.order);
        let mut boards = IndexMap::with_capacity(entries.len());
        for (idx, (name, mut board)) in entries.into_iter().enumerate() {
            board.order = idx;
            boards.insert(name, board);
        }
        BoardState { boards }
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    pub fn boards(&self) -> impl Iterator<Item = (&str, &Board)> {
        self.boards.iter().map(|(name, board)| (name.as_str(), board))
    }

    pub fn board(&self, name: &str) -> Option<&Board> {
        self.boards.get(name)
    }

    pub fn board_at(&self, index: usize) -> Option<(&str, &Board)> {
        self.boards
            .get_index(index)
            .map(|(name, board)| (name.as_str(), board))
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.boards.get_index_of(name)
    }

    pub fn todo_count(&self) -> usize {
        self.boards.values().map(|b| b.todos.len()).sum()
    }

    pub fn max_id(&self) -> Option<TodoId> {
        self.boards
            .values()
            .flat_map(|b| b.todos.iter().map(|t| t.id))
            .max()
    }

    pub fn create_board(&mut self, name: &str) -> Result<(), BoardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::EmptyBoardName);
        }
        if self.boards.contains_key(name) {
            return Err(BoardError::BoardExists(name.to_string()));
        }
        let order = self.boards.len();
        self.boards.insert(
            name.to_string(),
            Board {
                todos: Vec::new(),
                order,
            },
        );
        Ok(())
    }

    pub fn add_todo(&mut self, board: &str, text: &str) -> Result<TodoId, BoardError> {
        self.add_todo_at(board, text, Utc::now().timestamp_millis())
    }

    /// Same as [`BoardState::add_todo`] with an explicit clock reading.
    pub fn add_todo_at(
        &mut self,
        board: &str,
        text: &str,
        now_ms: i64,
    ) -> Result<TodoId, BoardError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BoardError::EmptyTodoText);
        }
        let idx = self.index_of(board)?;
        let id = self.next_id(now_ms)?;
        self.boards[idx].todos.insert(
            0,
            Todo {
                id,
                text: text.to_string(),
            },
        );
        Ok(id)
    }

    pub fn reorder_todos(&mut self, board: &str, from: usize, to: usize) -> Result<(), BoardError> {
        let idx = self.index_of(board)?;
        relocate(&mut self.boards[idx].todos, from, to, board)
    }

    pub fn move_todo(
        &mut self,
        source: &str,
        dest: &str,
        from: usize,
        to: usize,
    ) -> Result<(), BoardError> {
        if source == dest {
            return self.reorder_todos(source, from, to);
        }
        let src_idx = self.index_of(source)?;
        let dst_idx = self.index_of(dest)?;
        let src_len = self.boards[src_idx].todos.len();
        if from >= src_len {
            return Err(out_of_range(source, from, src_len));
        }
        let dst_len = self.boards[dst_idx].todos.len();
        if to > dst_len {
            return Err(out_of_range(dest, to, dst_len));
        }
        let todo = self.boards[src_idx].todos.remove(from);
        self.boards[dst_idx].todos.insert(to, todo);
        Ok(())
    }

    pub fn reorder_boards(&mut self, from: usize, to: usize) -> Result<(), BoardError> {
        let len = self.boards.len();
        if from >= len {
            return Err(out_of_range("boards", from, len));
        }
        if to >= len {
            return Err(out_of_range("boards", to, len));
        }
        if from != to {
            self.boards.move_index(from, to);
            self.renumber();
        }
        Ok(())
    }

    pub fn delete_todo(&mut self, board: &str, index: usize) -> Result<Todo, BoardError> {
        let idx = self.index_of(board)?;
        let todos = &mut self.boards[idx].todos;
        if index >= todos.len() {
            return Err(out_of_range(board, index, todos.len()));
        }
        Ok(todos.remove(index))
    }

    fn index_of(&self, board: &str) -> Result<usize, BoardError> {
        self.boards
            .get_index_of(board)
            .ok_or_else(|| BoardError::BoardNotFound(board.to_string()))
    }

    fn next_id(&self, now_ms: i64) -> Result<TodoId, BoardError> {
        match self.max_id() {
            Some(max) if max >= now_ms => {
                max.checked_add(1).ok_or(BoardError::IdsExhausted(max))
            }
            _ => Ok(now_ms),
        }
    }

    fn renumber(&mut self) {
        for (idx, board) in self.boards.values_mut().enumerate() {
            board.order = idx;
        }
    }
}

fn relocate<T>(items: &mut Vec<T>, from: usize, to: usize, target: &str) -> Result<(), BoardError> {
    let len = items.len();
    if from >= len {
        return Err(out_of_range(target, from, len));
    }
    // after removal there are len - 1 items, so `to` may be at most len - 1
    if to >= len {
        return Err(out_of_range(target, to, len));
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

fn out_of_range(target: &str, index: usize, len: usize) -> BoardError {
    BoardError::IndexOutOfRange {
        target: target.to_string(),
        index,
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn texts(state: &BoardState, board: &str) -> Vec<String> {
        state
            .board(board)
            .unwrap()
            .todos
            .iter()
            .map(|t| t.text.clone())
            .collect()
    }

    fn seeded() -> BoardState {
        let mut state = BoardState::default_boards();
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            state.add_todo_at("To Do", text, 1_000 + i as i64).unwrap();
        }
        state.add_todo_at("Doing", "x", 2_000).unwrap();
        state
    }

    #[test]
    fn default_state_has_three_empty_boards_in_order() {
        let state = BoardState::default_boards();
        let names: Vec<_> = state.boards().map(|(n, b)| (n.to_string(), b.order)).collect();
        assert_eq!(
            names,
            vec![
                ("To Do".to_string(), 0),
                ("Doing".to_string(), 1),
                ("Done".to_string(), 2)
            ]
        );
        assert_eq!(state.todo_count(), 0);
    }

    #[test]
    fn create_board_appends_with_next_order() {
        let mut state = BoardState::default_boards();
        state.create_board("Later").unwrap();
        assert_eq!(state.board("Later").unwrap().order, 3);
        assert_eq!(state.position_of("Later"), Some(3));
    }

    #[test]
    fn duplicate_board_leaves_state_unchanged() {
        let mut state = seeded();
        let before = state.clone();
        let err = state.create_board("Doing").unwrap_err();
        assert_eq!(err, BoardError::BoardExists("Doing".into()));
        assert!(err.is_user_facing());
        assert_eq!(state, before);
    }

    #[test]
    fn blank_board_name_is_rejected() {
        let mut state = BoardState::default_boards();
        assert_eq!(state.create_board("   "), Err(BoardError::EmptyBoardName));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn add_todo_prepends() {
        let state = seeded();
        assert_eq!(texts(&state, "To Do"), vec!["c", "b", "a"]);
    }

    #[test]
    fn add_todo_to_missing_board_is_a_no_op() {
        let mut state = seeded();
        let before = state.clone();
        let err = state.add_todo("Nope", "text").unwrap_err();
        assert!(!err.is_user_facing());
        assert_eq!(state, before);
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let mut state = BoardState::default_boards();
        let a = state.add_todo_at("To Do", "one", 5).unwrap();
        let b = state.add_todo_at("Doing", "two", 5).unwrap();
        let c = state.add_todo_at("Done", "three", 3).unwrap();
        assert_eq!((a, b, c), (5, 6, 7));
    }

    #[test]
    fn largest_id_cannot_be_bumped() {
        let mut state = BoardState::default_boards();
        state.add_todo_at("To Do", "last", i64::MAX).unwrap();
        let before = state.clone();
        let err = state.add_todo_at("Doing", "one more", 5).unwrap_err();
        assert_eq!(err, BoardError::IdsExhausted(i64::MAX));
        assert!(!err.is_user_facing());
        assert_eq!(state, before);
    }

    #[test]
    fn adds_and_deletes_keep_count_and_unique_ids() {
        let mut state = BoardState::default_boards();
        let mut added = 0;
        let mut deleted = 0;
        for step in 0..40_i64 {
            if step % 3 == 2 {
                if state.delete_todo("To Do", 0).is_ok() {
                    deleted += 1;
                }
            } else {
                state.add_todo_at("To Do", "t", step / 4).unwrap();
                added += 1;
            }
        }
        let board = state.board("To Do").unwrap();
        assert_eq!(board.todos.len(), added - deleted);
        let ids: HashSet<_> = board.todos.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), board.todos.len());
    }

    #[test]
    fn reorder_todos_shifts_intervening_items() {
        let mut state = seeded();
        state.reorder_todos("To Do", 0, 2).unwrap();
        assert_eq!(texts(&state, "To Do"), vec!["b", "a", "c"]);
        state.reorder_todos("To Do", 2, 0).unwrap();
        assert_eq!(texts(&state, "To Do"), vec!["c", "b", "a"]);
    }

    #[test]
    fn reorder_todos_out_of_range_changes_nothing() {
        let mut state = seeded();
        let before = state.clone();
        assert!(state.reorder_todos("To Do", 0, 3).is_err());
        assert!(state.reorder_todos("To Do", 7, 0).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn move_todo_updates_both_boards() {
        let mut state = seeded();
        state.move_todo("To Do", "Doing", 1, 1).unwrap();
        assert_eq!(texts(&state, "To Do"), vec!["c", "a"]);
        assert_eq!(texts(&state, "Doing"), vec!["x", "b"]);
    }

    #[test]
    fn move_todo_round_trip_restores_boards() {
        let mut state = seeded();
        let before = state.clone();
        state.move_todo("To Do", "Doing", 2, 0).unwrap();
        state.move_todo("Doing", "To Do", 0, 2).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn move_todo_into_empty_board_and_past_end() {
        let mut state = seeded();
        state.move_todo("To Do", "Done", 0, 0).unwrap();
        assert_eq!(texts(&state, "Done"), vec!["c"]);
        let before = state.clone();
        assert!(state.move_todo("To Do", "Done", 0, 5).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn reorder_boards_moves_third_to_front() {
        let mut state = seeded();
        let todos_before: Vec<_> = state
            .boards()
            .map(|(n, b)| (n.to_string(), b.todos.clone()))
            .collect();
        state.reorder_boards(2, 0).unwrap();
        let order: Vec<_> = state.boards().map(|(n, b)| (n, b.order)).collect();
        assert_eq!(order, vec![("Done", 0), ("To Do", 1), ("Doing", 2)]);
        for (name, todos) in todos_before {
            assert_eq!(state.board(&name).unwrap().todos, todos);
        }
    }

    #[test]
    fn reorder_boards_same_index_is_idempotent() {
        let mut state = seeded();
        let before = state.clone();
        state.reorder_boards(1, 1).unwrap();
        state.reorder_boards(1, 1).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn from_entries_normalizes_order() {
        let entries = vec![
            (
                "B".to_string(),
                Board {
                    todos: Vec::new(),
                    order: 7,
                },
            ),
            (
                "A".to_string(),
                Board {
                    todos: Vec::new(),
                    order: 2,
                },
            ),
        ];
        let state = BoardState::from_entries(entries);
        assert_eq!(state.board_at(0).map(|(n, b)| (n, b.order)), Some(("A", 0)));
        assert_eq!(state.board_at(1).map(|(n, b)| (n, b.order)), Some(("B", 1)));
    }

    #[test]
    fn serializes_as_name_keyed_map() {
        let mut state = BoardState::with_boards(["To Do"]);
        state.add_todo_at("To Do", "write", 42).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"To Do":{"todos":[{"id":42,"text":"write"}],"order":0}}"#
        );
    }
}
