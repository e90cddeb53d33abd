//! The single mutation entry point for board state.
//!
//! Every change goes through [`Store::dispatch`]; listeners (persistence,
//! UI bookkeeping) hear about a change only after it has been applied.

use crate::model::{BoardError, BoardState};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Board,
    Todo,
}

/// Where a gesture started. For board drags `index` is the board position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSource {
    pub board: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Board { board: String, index: usize },
    Trash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub kind: DragKind,
    pub source: DragSource,
    pub destination: Option<DropTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateBoard {
        name: String,
    },
    AddTodo {
        board: String,
        text: String,
    },
    ReorderTodos {
        board: String,
        from: usize,
        to: usize,
    },
    MoveTodo {
        source: String,
        dest: String,
        from: usize,
        to: usize,
    },
    ReorderBoards {
        from: usize,
        to: usize,
    },
    DeleteTodo {
        board: String,
        index: usize,
    },
    DragEnd(DragEnd),
}

/// Maps a finished drag gesture onto the operation it stands for, or `None`
/// when the gesture was cancelled. Trash must be checked before comparing
/// boards: it is never a reorder target.
pub fn resolve(drag: &DragEnd) -> Option<Action> {
    let destination = drag.destination.as_ref()?;
    match (drag.kind, destination) {
        (DragKind::Board, DropTarget::Board { index, .. }) => Some(Action::ReorderBoards {
            from: drag.source.index,
            to: *index,
        }),
        (DragKind::Board, DropTarget::Trash) => None,
        (DragKind::Todo, DropTarget::Trash) => Some(Action::DeleteTodo {
            board: drag.source.board.clone(),
            index: drag.source.index,
        }),
        (DragKind::Todo, DropTarget::Board { board, index }) if *board == drag.source.board => {
            Some(Action::ReorderTodos {
                board: board.clone(),
                from: drag.source.index,
                to: *index,
            })
        }
        (DragKind::Todo, DropTarget::Board { board, index }) => Some(Action::MoveTodo {
            source: drag.source.board.clone(),
            dest: board.clone(),
            from: drag.source.index,
            to: *index,
        }),
    }
}

pub type Listener = Box<dyn FnMut(&BoardState) -> anyhow::Result<()>>;

pub struct Store {
    state: BoardState,
    listeners: Vec<Listener>,
}

impl Store {
    pub fn new(state: BoardState) -> Self {
        Store {
            state,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&BoardState) -> anyhow::Result<()> + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Applies `action`. Returns `Ok(true)` when state changed, `Ok(false)`
    /// for cancelled gestures, moves onto the same spot and stale indices or
    /// board names, and the error itself for conflicts the user should see.
    /// Listeners only run on `Ok(true)`; state is untouched otherwise.
    pub fn dispatch(&mut self, action: Action) -> Result<bool, BoardError> {
        match apply(&mut self.state, &action) {
            Ok(true) => {
                debug!(?action, "applied");
                self.notify();
                Ok(true)
            }
            Ok(false) => {
                debug!(?action, "nothing to change");
                Ok(false)
            }
            Err(err) if err.is_user_facing() => {
                debug!(%err, "rejected");
                Err(err)
            }
            Err(err) => {
                debug!(%err, ?action, "ignored");
                Ok(false)
            }
        }
    }

    fn notify(&mut self) {
        for listener in self.listeners.iter_mut() {
            if let Err(err) = listener(&self.state) {
                warn!("state listener failed: {err:#}");
            }
        }
    }
}

/// Runs one action against `state`, reporting whether anything moved.
fn apply(state: &mut BoardState, action: &Action) -> Result<bool, BoardError> {
    match action {
        Action::CreateBoard { name } => state.create_board(name).map(|()| true),
        Action::AddTodo { board, text } => state.add_todo(board, text).map(|_| true),
        Action::ReorderTodos { board, from, to } => {
            state.reorder_todos(board, *from, *to).map(|()| from != to)
        }
        Action::MoveTodo {
            source,
            dest,
            from,
            to,
        } => state
            .move_todo(source, dest, *from, *to)
            .map(|()| source != dest || from != to),
        Action::ReorderBoards { from, to } => state.reorder_boards(*from, *to).map(|()| from != to),
        Action::DeleteTodo { board, index } => state.delete_todo(board, *index).map(|_| true),
        Action::DragEnd(drag) => match resolve(drag) {
            Some(resolved) => apply(state, &resolved),
            None => Ok(false),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn seeded_store() -> Store {
        let mut state = BoardState::default_boards();
        state.add_todo_at("To Do", "a", 1).unwrap();
        state.add_todo_at("To Do", "b", 2).unwrap();
        state.add_todo_at("Doing", "x", 3).unwrap();
        Store::new(state)
    }

    fn todo_drag(board: &str, index: usize, destination: Option<DropTarget>) -> Action {
        Action::DragEnd(DragEnd {
            kind: DragKind::Todo,
            source: DragSource {
                board: board.into(),
                index,
            },
            destination,
        })
    }

    fn to_board(board: &str, index: usize) -> Option<DropTarget> {
        Some(DropTarget::Board {
            board: board.into(),
            index,
        })
    }

    fn texts<'a>(store: &'a Store, board: &str) -> Vec<&'a str> {
        store
            .state()
            .board(board)
            .unwrap()
            .todos
            .iter()
            .map(|t| t.text.as_str())
            .collect()
    }

    fn counting(store: &mut Store) -> Rc<RefCell<usize>> {
        let calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&calls);
        store.subscribe(move |_| {
            *seen.borrow_mut() += 1;
            Ok(())
        });
        calls
    }

    #[test]
    fn drop_outside_any_target_is_cancelled() {
        let mut store = seeded_store();
        let calls = counting(&mut store);
        let before = store.state().clone();
        assert_eq!(store.dispatch(todo_drag("To Do", 0, None)), Ok(false));
        assert_eq!(store.state(), &before);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn board_drag_wins_over_everything_else() {
        let drag = DragEnd {
            kind: DragKind::Board,
            source: DragSource {
                board: "Done".into(),
                index: 2,
            },
            destination: to_board("Done", 0),
        };
        assert_eq!(
            resolve(&drag),
            Some(Action::ReorderBoards { from: 2, to: 0 })
        );
    }

    #[test]
    fn board_drag_to_front() {
        let mut store = seeded_store();
        let before = store.state().clone();
        let drag = Action::DragEnd(DragEnd {
            kind: DragKind::Board,
            source: DragSource {
                board: "Done".into(),
                index: 2,
            },
            destination: to_board("To Do", 0),
        });
        assert_eq!(store.dispatch(drag), Ok(true));
        let names: Vec<_> = store.state().boards().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Done", "To Do", "Doing"]);
        for (name, board) in before.boards() {
            assert_eq!(store.state().board(name).unwrap().todos, board.todos);
        }
    }

    #[test]
    fn board_dropped_on_trash_is_cancelled() {
        let drag = DragEnd {
            kind: DragKind::Board,
            source: DragSource {
                board: "To Do".into(),
                index: 0,
            },
            destination: Some(DropTarget::Trash),
        };
        assert_eq!(resolve(&drag), None);
    }

    #[test]
    fn trash_is_checked_before_same_board() {
        let drag = DragEnd {
            kind: DragKind::Todo,
            source: DragSource {
                board: "To Do".into(),
                index: 1,
            },
            destination: Some(DropTarget::Trash),
        };
        assert_eq!(
            resolve(&drag),
            Some(Action::DeleteTodo {
                board: "To Do".into(),
                index: 1
            })
        );
    }

    #[test]
    fn same_board_drop_reorders_and_other_board_moves() {
        let mut store = seeded_store();
        store
            .dispatch(todo_drag("To Do", 0, to_board("To Do", 1)))
            .unwrap();
        assert_eq!(texts(&store, "To Do"), vec!["a", "b"]);

        store
            .dispatch(todo_drag("To Do", 0, to_board("Doing", 1)))
            .unwrap();
        assert_eq!(store.state().board("To Do").unwrap().todos.len(), 1);
        assert_eq!(texts(&store, "Doing"), vec!["x", "a"]);
    }

    #[test]
    fn trash_drop_deletes_and_notifies() {
        let mut store = seeded_store();
        let calls = counting(&mut store);
        assert_eq!(
            store.dispatch(todo_drag("To Do", 0, Some(DropTarget::Trash))),
            Ok(true)
        );
        assert_eq!(store.state().board("To Do").unwrap().todos.len(), 1);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn duplicate_board_is_reported_without_notifying() {
        let mut store = seeded_store();
        let calls = counting(&mut store);
        let before = store.state().clone();
        let result = store.dispatch(Action::CreateBoard {
            name: "Done".into(),
        });
        assert_eq!(result, Err(BoardError::BoardExists("Done".into())));
        assert_eq!(store.state(), &before);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn stale_indices_are_ignored_quietly() {
        let mut store = seeded_store();
        let before = store.state().clone();
        assert_eq!(
            store.dispatch(todo_drag("To Do", 9, to_board("Doing", 0))),
            Ok(false)
        );
        assert_eq!(
            store.dispatch(Action::AddTodo {
                board: "Gone".into(),
                text: "x".into()
            }),
            Ok(false)
        );
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn drops_onto_the_same_spot_do_not_notify() {
        let mut store = seeded_store();
        let calls = counting(&mut store);
        let before = store.state().clone();
        assert_eq!(store.dispatch(Action::ReorderBoards { from: 1, to: 1 }), Ok(false));
        assert_eq!(
            store.dispatch(Action::ReorderTodos {
                board: "To Do".into(),
                from: 1,
                to: 1
            }),
            Ok(false)
        );
        assert_eq!(
            store.dispatch(Action::MoveTodo {
                source: "To Do".into(),
                dest: "To Do".into(),
                from: 0,
                to: 0
            }),
            Ok(false)
        );
        assert_eq!(
            store.dispatch(todo_drag("Doing", 0, to_board("Doing", 0))),
            Ok(false)
        );
        assert_eq!(store.state(), &before);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn exhausted_ids_are_ignored_without_notifying() {
        let mut state = BoardState::with_boards(["To Do"]);
        state.add_todo_at("To Do", "x", i64::MAX).unwrap();
        let mut store = Store::new(state);
        let calls = counting(&mut store);
        let before = store.state().clone();
        let add = Action::AddTodo {
            board: "To Do".into(),
            text: "y".into(),
        };
        assert_eq!(store.dispatch(add), Ok(false));
        assert_eq!(store.state(), &before);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn listener_failure_does_not_roll_back() {
        let mut store = seeded_store();
        store.subscribe(|_| Err(anyhow::anyhow!("disk full")));
        let calls = counting(&mut store);
        assert_eq!(
            store.dispatch(Action::CreateBoard {
                name: "Later".into()
            }),
            Ok(true)
        );
        assert!(store.state().board("Later").is_some());
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn listeners_see_the_new_state() {
        let mut store = seeded_store();
        let snapshot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&snapshot);
        store.subscribe(move |state| {
            *sink.borrow_mut() = Some(state.todo_count());
            Ok(())
        });
        store
            .dispatch(Action::AddTodo {
                board: "Done".into(),
                text: "ship".into(),
            })
            .unwrap();
        assert_eq!(*snapshot.borrow(), Some(4));
    }
}
