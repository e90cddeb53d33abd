use crate::commands::Session;
use crate::model::{BoardState, Todo};
use crate::storage::{save_task_list, FileStore, StoreLocation};
use crate::store::{Action, DragEnd, DragKind, DragSource, DropTarget, Store};
use crate::tasks::{CategorizedTodo, Category, TaskList};
use anyhow::Result;
use chrono::{TimeZone, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Tabs, Wrap,
};
use ratatui::Terminal;
use std::cell::Cell;
use std::io::{stdout, Stdout};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::warn;

const TRASH_WIDTH: u16 = 12;

pub fn run(mut store: Store, tasks: TaskList, session: Session, tasks_key: String) -> Result<()> {
    let last_save = Rc::new(Cell::new(Instant::now()));
    let saved = Rc::clone(&last_save);
    store.subscribe(move |_| {
        saved.set(Instant::now());
        Ok(())
    });
    let mut terminal = setup_terminal()?;
    let mut app = App::new(store, tasks, session, tasks_key, last_save);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: Store,
    tasks: TaskList,
    files: FileStore,
    location: StoreLocation,
    tasks_key: String,
    selected_board: usize,
    selected_todo: usize,
    scroll_offsets: Vec<usize>,
    category: Category,
    selected_task: usize,
    last_save: Rc<Cell<Instant>>,
    status: String,
    mode: Mode,
    view: ViewMode,
}

enum Mode {
    Normal,
    Input { purpose: InputPurpose, field: FieldValue },
    Dragging(Grab),
    ConfirmDelete { board: String, index: usize },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum InputPurpose {
    NewTodo,
    NewBoard,
    NewTask,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ViewMode {
    Boards,
    Tasks,
}

/// A todo or board lifted off the board and carried by the cursor.
#[derive(Clone, Debug)]
struct Grab {
    kind: DragKind,
    source: DragSource,
    hover: Hover,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Hover {
    Board { board: usize, index: usize },
    Trash,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Boards => "Boards",
            ViewMode::Tasks => "Tasks",
        }
    }
}

impl InputPurpose {
    fn title(&self) -> &'static str {
        match self {
            InputPurpose::NewTodo => "New Todo",
            InputPurpose::NewBoard => "New Board",
            InputPurpose::NewTask => "New Task",
        }
    }
}

impl Grab {
    fn new(kind: DragKind, board_idx: usize, name: &str, index: usize) -> Self {
        Grab {
            kind,
            source: DragSource {
                board: name.to_string(),
                index,
            },
            hover: Hover::Board {
                board: board_idx,
                index,
            },
        }
    }

    /// Largest index a todo may be dropped at on board `board_idx`.
    fn max_index(&self, state: &BoardState, board_idx: usize) -> usize {
        match state.board_at(board_idx) {
            Some((name, board)) if name == self.source.board => board.todos.len().saturating_sub(1),
            Some((_, board)) => board.todos.len(),
            None => 0,
        }
    }

    fn step_board(&mut self, state: &BoardState, delta: isize) {
        let boards = state.len();
        if boards == 0 {
            return;
        }
        // positions 0..boards are real boards, `boards` is the trash
        let current = match self.hover {
            Hover::Board { board, .. } => board,
            Hover::Trash => boards,
        };
        let target = (current as isize + delta).clamp(0, boards as isize) as usize;
        self.hover = if target == boards {
            Hover::Trash
        } else {
            let index = match (self.kind, self.hover) {
                (DragKind::Board, _) => target,
                (DragKind::Todo, Hover::Board { index, .. }) => {
                    index.min(self.max_index(state, target))
                }
                (DragKind::Todo, Hover::Trash) => 0,
            };
            Hover::Board {
                board: target,
                index,
            }
        };
    }

    fn step_index(&mut self, state: &BoardState, delta: isize) {
        if self.kind == DragKind::Board {
            return;
        }
        if let Hover::Board { board, index } = self.hover {
            let max = self.max_index(state, board) as isize;
            let next = (index as isize + delta).clamp(0, max) as usize;
            self.hover = Hover::Board { board, index: next };
        }
    }

    fn drop_target(&self, state: &BoardState) -> Option<DropTarget> {
        match self.hover {
            Hover::Trash => Some(DropTarget::Trash),
            Hover::Board { board, index } => {
                state.board_at(board).map(|(name, _)| DropTarget::Board {
                    board: name.to_string(),
                    index: if self.kind == DragKind::Board { board } else { index },
                })
            }
        }
    }

    fn finish(self, destination: Option<DropTarget>) -> DragEnd {
        DragEnd {
            kind: self.kind,
            source: self.source,
            destination,
        }
    }
}

#[derive(Clone, Debug)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl App {
    fn new(
        store: Store,
        tasks: TaskList,
        session: Session,
        tasks_key: String,
        last_save: Rc<Cell<Instant>>,
    ) -> Self {
        let status = format!("Loaded boards from {}", session.location.dir.display());
        let board_count = store.state().len();
        App {
            store,
            tasks,
            files: session.files,
            location: session.location,
            tasks_key,
            selected_board: 0,
            selected_todo: 0,
            scroll_offsets: vec![0; board_count],
            category: Category::ToDo,
            selected_task: 0,
            last_save,
            status,
            mode: Mode::Normal,
            view: ViewMode::Boards,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Input { .. } => self.handle_input_key(key),
            Mode::Dragging(_) => self.handle_drag_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('1') => {
                self.set_view(ViewMode::Boards);
                return Ok(false);
            }
            KeyCode::Char('2') => {
                self.set_view(ViewMode::Tasks);
                return Ok(false);
            }
            _ => {}
        }
        match self.view {
            ViewMode::Boards => self.handle_board_key(key),
            ViewMode::Tasks => self.handle_tasks_key(key),
        }
    }

    fn handle_board_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.prev_board(),
            KeyCode::Right | KeyCode::Char('l') => self.next_board(),
            KeyCode::Up | KeyCode::Char('k') => self.prev_todo(),
            KeyCode::Down | KeyCode::Char('j') => self.next_todo(),
            KeyCode::Char('n') => {
                if self.current_board_name().is_some() {
                    self.open_input(InputPurpose::NewTodo);
                } else {
                    self.status = "Create a board first (B)".into();
                }
            }
            KeyCode::Char('B') => self.open_input(InputPurpose::NewBoard),
            KeyCode::Char(' ') | KeyCode::Char('g') => self.grab_todo(),
            KeyCode::Char('G') => self.grab_board(),
            KeyCode::Char('d') => {
                if let Some((board, _)) = self.current_todo() {
                    let board = board.to_string();
                    self.status = "Trash this todo? (y to confirm, n/Esc to cancel)".into();
                    self.mode = Mode::ConfirmDelete {
                        board,
                        index: self.selected_todo,
                    };
                } else {
                    self.status = "No todo selected to delete".into();
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => {
                self.category = self.category.prev();
                self.selected_task = 0;
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => {
                self.category = self.category.next();
                self.selected_task = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_task = self.selected_task.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.tasks.in_category(self.category).count();
                if self.selected_task + 1 < len {
                    self.selected_task += 1;
                }
            }
            KeyCode::Char('n') => self.open_input(InputPurpose::NewTask),
            KeyCode::Char('m') => self.recategorize_selected(self.category.next())?,
            KeyCode::Char('M') => self.recategorize_selected(self.category.prev())?,
            KeyCode::Char('d') | KeyCode::Char('x') => self.delete_selected_task()?,
            _ => {}
        }
        Ok(false)
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Result<bool> {
        let (purpose, mut field) = match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Input { purpose, field } => (purpose, field),
            other => {
                self.mode = other;
                return Ok(false);
            }
        };
        let mut close = false;
        match key.code {
            KeyCode::Esc => {
                close = true;
                self.status = "Canceled".into();
            }
            KeyCode::Enter => close = self.submit(purpose, &field.value)?,
            KeyCode::Left => field.move_left(),
            KeyCode::Right => field.move_right(),
            KeyCode::Backspace => field.backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    field.insert_char(c);
                }
            }
            _ => {}
        }
        if !close {
            self.mode = Mode::Input { purpose, field };
        }
        Ok(false)
    }

    fn handle_drag_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut grab = match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Dragging(grab) => grab,
            other => {
                self.mode = other;
                return Ok(false);
            }
        };
        let state = self.store.state();
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => grab.step_board(state, -1),
            KeyCode::Right | KeyCode::Char('l') => grab.step_board(state, 1),
            KeyCode::Up | KeyCode::Char('k') => grab.step_index(state, -1),
            KeyCode::Down | KeyCode::Char('j') => grab.step_index(state, 1),
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('g') => {
                let destination = grab.drop_target(state);
                let hover = grab.hover;
                self.finish_drag(grab.finish(destination), hover);
                return Ok(false);
            }
            KeyCode::Esc => {
                self.finish_drag(grab.finish(None), Hover::Trash);
                return Ok(false);
            }
            _ => {}
        }
        self.mode = Mode::Dragging(grab);
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let (board, index) = match &self.mode {
            Mode::ConfirmDelete { board, index } => (board.clone(), *index),
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.mode = Mode::Normal;
                let drag = DragEnd {
                    kind: DragKind::Todo,
                    source: DragSource { board, index },
                    destination: Some(DropTarget::Trash),
                };
                self.finish_drag(drag, Hover::Trash);
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.status = format!("Switched to {} view", view.label());
        }
    }

    fn open_input(&mut self, purpose: InputPurpose) {
        self.mode = Mode::Input {
            purpose,
            field: FieldValue::new(""),
        };
        self.status = format!("{} (Enter save, Esc cancel)", purpose.title());
    }

    /// Returns whether the input dialog should close.
    fn submit(&mut self, purpose: InputPurpose, text: &str) -> Result<bool> {
        match purpose {
            InputPurpose::NewTodo => {
                let Some(board) = self.current_board_name() else {
                    return Ok(true);
                };
                let outcome = self.store.dispatch(Action::AddTodo {
                    board: board.clone(),
                    text: text.to_string(),
                });
                match outcome {
                    Ok(true) => {
                        self.selected_todo = 0;
                        self.status = format!("Added todo to {}", board);
                        Ok(true)
                    }
                    Ok(false) => {
                        self.status = "Nothing changed".into();
                        Ok(true)
                    }
                    Err(err) => {
                        self.status = format!("Could not add: {}", err);
                        Ok(false)
                    }
                }
            }
            InputPurpose::NewBoard => {
                let outcome = self.store.dispatch(Action::CreateBoard {
                    name: text.to_string(),
                });
                match outcome {
                    Ok(_) => {
                        self.selected_board = self.store.state().len().saturating_sub(1);
                        self.selected_todo = 0;
                        self.sync_offsets();
                        self.status = format!("Created board {}", text.trim());
                        Ok(true)
                    }
                    Err(err) => {
                        self.status = format!("Could not create board: {}", err);
                        Ok(false)
                    }
                }
            }
            InputPurpose::NewTask => match self.tasks.add(text, self.category) {
                Ok(_) => {
                    self.selected_task = 0;
                    self.save_tasks(format!("Added task to {}", self.category.label()))?;
                    Ok(true)
                }
                Err(err) => {
                    self.status = format!("Could not add: {}", err);
                    Ok(false)
                }
            },
        }
    }

    fn grab_todo(&mut self) {
        let grab = match self.current_todo() {
            Some((board, _)) => {
                Grab::new(DragKind::Todo, self.selected_board, board, self.selected_todo)
            }
            None => {
                self.status = "No todo selected to grab".into();
                return;
            }
        };
        self.status = "Carrying todo: arrows choose a spot, Enter drops, Esc cancels".into();
        self.mode = Mode::Dragging(grab);
    }

    fn grab_board(&mut self) {
        let Some(name) = self.current_board_name() else {
            self.status = "No board to grab".into();
            return;
        };
        let grab = Grab::new(DragKind::Board, self.selected_board, &name, self.selected_board);
        self.status = format!(
            "Carrying board {}: ←→ choose a spot, Enter drops, Esc cancels",
            name
        );
        self.mode = Mode::Dragging(grab);
    }

    fn finish_drag(&mut self, drag: DragEnd, hover: Hover) {
        let kind = drag.kind;
        let cancelled = drag.destination.is_none();
        match self.store.dispatch(Action::DragEnd(drag)) {
            Ok(true) => {
                match (kind, hover) {
                    (_, Hover::Board { board, index }) => {
                        self.selected_board = board;
                        self.selected_todo = if kind == DragKind::Todo { index } else { 0 };
                    }
                    (_, Hover::Trash) => self.clamp_selection(),
                }
                self.status = match (kind, hover) {
                    (_, Hover::Trash) => "Trashed todo".into(),
                    (DragKind::Board, _) => "Moved board".into(),
                    (DragKind::Todo, _) => "Moved todo".into(),
                };
            }
            Ok(false) if cancelled => self.status = "Drag cancelled".into(),
            Ok(false) => self.status = "Nothing to drop there".into(),
            Err(err) => self.status = format!("Drop failed: {}", err),
        }
        self.sync_offsets();
    }

    fn recategorize_selected(&mut self, category: Category) -> Result<()> {
        let Some(id) = self.current_task().map(|t| t.id) else {
            self.status = "No task selected".into();
            return Ok(());
        };
        if let Err(err) = self.tasks.recategorize(id, category) {
            self.status = format!("Could not move task: {}", err);
            return Ok(());
        }
        self.clamp_task_selection();
        self.save_tasks(format!("Moved task to {}", category.label()))
    }

    fn delete_selected_task(&mut self) -> Result<()> {
        let Some(id) = self.current_task().map(|t| t.id) else {
            self.status = "No task selected".into();
            return Ok(());
        };
        if let Err(err) = self.tasks.remove(id) {
            self.status = format!("Delete failed: {}", err);
            return Ok(());
        }
        self.clamp_task_selection();
        self.save_tasks("Deleted task".to_string())
    }

    fn save_tasks(&mut self, message: String) -> Result<()> {
        if let Err(err) = save_task_list(&mut self.files, &self.tasks_key, &self.tasks) {
            warn!("saving task list failed: {err:#}");
            self.status = format!("Save failed: {}", err);
            return Ok(());
        }
        self.last_save.set(Instant::now());
        self.status = message;
        Ok(())
    }

    fn prev_board(&mut self) {
        if self.selected_board > 0 {
            self.selected_board -= 1;
            self.selected_todo = 0;
        }
    }

    fn next_board(&mut self) {
        if self.selected_board + 1 < self.store.state().len() {
            self.selected_board += 1;
            self.selected_todo = 0;
        }
    }

    fn prev_todo(&mut self) {
        if self.selected_todo > 0 {
            self.selected_todo -= 1;
        }
    }

    fn next_todo(&mut self) {
        if let Some((_, board)) = self.store.state().board_at(self.selected_board) {
            if self.selected_todo + 1 < board.todos.len() {
                self.selected_todo += 1;
            }
        }
    }

    fn clamp_selection(&mut self) {
        let state = self.store.state();
        self.selected_board = self.selected_board.min(state.len().saturating_sub(1));
        let len = state
            .board_at(self.selected_board)
            .map(|(_, b)| b.todos.len())
            .unwrap_or(0);
        self.selected_todo = self.selected_todo.min(len.saturating_sub(1));
    }

    fn clamp_task_selection(&mut self) {
        let len = self.tasks.in_category(self.category).count();
        self.selected_task = self.selected_task.min(len.saturating_sub(1));
    }

    fn sync_offsets(&mut self) {
        let len = self.store.state().len();
        self.scroll_offsets.resize(len, 0);
    }

    fn current_board_name(&self) -> Option<String> {
        self.store
            .state()
            .board_at(self.selected_board)
            .map(|(name, _)| name.to_string())
    }

    fn current_todo(&self) -> Option<(&str, &Todo)> {
        let (name, board) = self.store.state().board_at(self.selected_board)?;
        board.todos.get(self.selected_todo).map(|todo| (name, todo))
    }

    fn current_task(&self) -> Option<&CategorizedTodo> {
        self.tasks.in_category(self.category).nth(self.selected_task)
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            ViewMode::Boards => self.draw_boards(f, layout[1]),
            ViewMode::Tasks => self.draw_tasks(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Input { purpose, field } => self.draw_input(f, purpose.title(), field),
            Mode::ConfirmDelete { board, index } => self.draw_confirm(f, board, *index),
            Mode::Normal | Mode::Dragging(_) => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "todoboard ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.location.scope.label(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.dir.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save.get())),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_boards(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let count = self.store.state().len();
        if count == 0 {
            let msg = Paragraph::new("No boards yet. Press B to create one.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("todoboard"));
            f.render_widget(Clear, area);
            f.render_widget(msg, area);
            return;
        }
        self.sync_offsets();

        let mut constraints = (0..count)
            .map(|_| Constraint::Ratio(1, count as u32))
            .collect::<Vec<_>>();
        constraints.push(Constraint::Length(TRASH_WIDTH));
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let grab = match &self.mode {
            Mode::Dragging(grab) => Some(grab.clone()),
            _ => None,
        };

        for idx in 0..count {
            let Some((name, board)) = self.store.state().board_at(idx) else {
                continue;
            };
            let accent = color_for_index(idx);
            let todo_width = chunks[idx].width.saturating_sub(2);
            let mut items = board
                .todos
                .iter()
                .enumerate()
                .map(|(t_idx, todo)| {
                    let lifted = grab.as_ref().is_some_and(|g| {
                        g.kind == DragKind::Todo
                            && g.source.board == name
                            && g.source.index == t_idx
                    });
                    let selected = grab.is_none()
                        && idx == self.selected_board
                        && t_idx == self.selected_todo;
                    todo_item(todo, todo_width, selected, lifted)
                })
                .collect::<Vec<_>>();

            let mut highlight = if grab.is_none() && idx == self.selected_board {
                Some(self.selected_todo)
            } else {
                None
            };
            let mut board_hovered = false;
            if let Some(g) = &grab {
                if let Hover::Board { board: hovered, index } = g.hover {
                    if hovered == idx {
                        match g.kind {
                            DragKind::Todo => {
                                let same = g.source.board == name;
                                let at = if same && index >= g.source.index {
                                    index + 1
                                } else {
                                    index
                                };
                                let at = at.min(items.len());
                                items.insert(at, drop_slot(todo_width));
                                highlight = Some(at);
                            }
                            DragKind::Board => board_hovered = true,
                        }
                    }
                }
            }

            let mut state = ListState::default();
            let offset = *self.scroll_offsets.get(idx).unwrap_or(&0);
            let viewport = (chunks[idx].height.saturating_sub(2) / TODO_HEIGHT) as usize;
            match highlight {
                Some(sel) => {
                    let offset = adjust_offset(sel, offset, viewport, 1, items.len());
                    self.scroll_offsets[idx] = offset;
                    state.select(Some(sel));
                    *state.offset_mut() = offset;
                }
                None => *state.offset_mut() = offset.min(items.len().saturating_sub(1)),
            }

            let lifted_board = grab
                .as_ref()
                .is_some_and(|g| g.kind == DragKind::Board && g.source.index == idx);
            let mut title = format!("{} ({})", name, board.todos.len());
            if board_hovered {
                title.push_str(" ⇣ drop");
            }
            let border = if board_hovered {
                Color::Yellow
            } else if lifted_board {
                Color::DarkGray
            } else {
                accent
            };

            let block = Block::default()
                .title(Span::styled(
                    title,
                    Style::default()
                        .fg(border)
                        .add_modifier(if idx == self.selected_board {
                            Modifier::BOLD | Modifier::UNDERLINED
                        } else {
                            Modifier::BOLD
                        }),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .style(Style::default().bg(Color::Rgb(16, 18, 24)));

            let list = List::new(items).block(block);
            f.render_stateful_widget(list, chunks[idx], &mut state);
        }

        let trash_hovered = grab.as_ref().is_some_and(|g| g.hover == Hover::Trash);
        let trash_color = if trash_hovered {
            Color::LightRed
        } else {
            Color::Red
        };
        let trash = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "🗑",
                Style::default().fg(trash_color).add_modifier(Modifier::BOLD),
            )),
            Line::from(if trash_hovered { "release" } else { "" }),
        ])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title("Trash")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(trash_color))
                .style(if trash_hovered {
                    Style::default().bg(Color::Rgb(60, 16, 16))
                } else {
                    Style::default()
                }),
        );
        f.render_widget(trash, chunks[count]);
    }

    fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
            ])
            .split(area);

        let titles = Category::ALL
            .iter()
            .map(|c| format!("{} ({})", c.label(), self.tasks.in_category(*c).count()))
            .collect::<Vec<_>>();
        let selected = Category::ALL
            .iter()
            .position(|c| *c == self.category)
            .unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(selected)
            .block(Block::default().borders(Borders::ALL).title("Category"))
            .highlight_style(
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            );
        f.render_widget(tabs, rows[0]);

        let progress = self.tasks.progress();
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::LightGreen).bg(Color::Rgb(22, 24, 30)))
            .percent(progress.percent().round().clamp(0.0, 100.0) as u16)
            .label(format!(
                "{}/{} done ({:.0}%)",
                progress.completed,
                progress.total,
                progress.percent()
            ));
        f.render_widget(gauge, rows[1]);

        let items = self
            .tasks
            .in_category(self.category)
            .map(task_item)
            .collect::<Vec<_>>();
        let mut state = ListState::default();
        if !items.is_empty() {
            state.select(Some(self.selected_task.min(items.len() - 1)));
        }
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.category.label()),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, rows[2], &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.detail_line())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("1", Style::default().fg(Color::LightCyan)),
            Span::raw(" boards  "),
            Span::styled("2", Style::default().fg(Color::LightCyan)),
            Span::raw(" tasks  "),
        ];
        match (&self.mode, self.view) {
            (Mode::Dragging(_), _) => spans.extend([
                Span::styled("←↑↓→", Style::default().fg(Color::LightCyan)),
                Span::raw(" aim  "),
                Span::styled("Enter", Style::default().fg(Color::LightGreen)),
                Span::raw(" drop  "),
                Span::styled("Esc", Style::default().fg(Color::LightRed)),
                Span::raw(" cancel"),
            ]),
            (_, ViewMode::Boards) => spans.extend([
                Span::styled("←↑↓→ / h j k l", Style::default().fg(Color::LightCyan)),
                Span::raw(" select  "),
                Span::styled("g", Style::default().fg(Color::LightGreen)),
                Span::raw(" grab todo  "),
                Span::styled("G", Style::default().fg(Color::LightGreen)),
                Span::raw(" grab board  "),
                Span::styled("n", Style::default().fg(Color::LightMagenta)),
                Span::raw(" new  "),
                Span::styled("B", Style::default().fg(Color::LightMagenta)),
                Span::raw(" board  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" trash  "),
                Span::styled("q", Style::default().fg(Color::LightRed)),
                Span::raw(" quit"),
            ]),
            (_, ViewMode::Tasks) => spans.extend([
                Span::styled("←→", Style::default().fg(Color::LightCyan)),
                Span::raw(" category  "),
                Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                Span::raw(" browse  "),
                Span::styled("m/M", Style::default().fg(Color::LightGreen)),
                Span::raw(" next/prev category  "),
                Span::styled("n", Style::default().fg(Color::LightMagenta)),
                Span::raw(" new  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
                Span::styled("q", Style::default().fg(Color::LightRed)),
                Span::raw(" quit"),
            ]),
        }
        Line::from(spans)
    }

    fn detail_line(&self) -> Line<'static> {
        let (text, id) = match self.view {
            ViewMode::Boards => match self.current_todo() {
                Some((_, todo)) => (todo.text.clone(), todo.id),
                None => return Line::from("No todo selected"),
            },
            ViewMode::Tasks => match self.current_task() {
                Some(task) => (task.text.clone(), task.id),
                None => return Line::from("No task selected"),
            },
        };
        Line::from(vec![
            Span::styled(
                text,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(format_created(id), Style::default().fg(Color::Gray)),
        ])
    }

    fn draw_input(&self, f: &mut ratatui::Frame<'_>, title: &str, field: &FieldValue) {
        let area = centered_rect(60, 20, f.size());
        let lines = vec![
            Line::from(Span::styled(
                field.with_caret(),
                Style::default().fg(Color::Cyan),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to save • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, board: &str, index: usize) {
        let area = centered_rect(50, 30, f.size());
        let text = self
            .store
            .state()
            .board(board)
            .and_then(|b| b.todos.get(index))
            .map(|t| t.text.clone())
            .unwrap_or_default();
        let body = vec![
            Line::from(Span::styled(
                format!("Trash \"{}\"?", truncate_text(&text, 40)),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

const TODO_HEIGHT: u16 = 3;

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn color_for_index(idx: usize) -> Color {
    let palette = [
        Color::Cyan,
        Color::LightGreen,
        Color::LightMagenta,
        Color::LightBlue,
        Color::LightYellow,
        Color::LightRed,
    ];
    palette[idx % palette.len()]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn format_created(id: i64) -> String {
    match Utc.timestamp_millis_opt(id).single() {
        Some(dt) => format!("created {}", dt.format("%Y-%m-%d %H:%M")),
        None => format!("#{}", id),
    }
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(cursor)
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn todo_item(todo: &Todo, width: u16, selected: bool, lifted: bool) -> ListItem<'static> {
    let inner_width = width.saturating_sub(4).max(10) as usize;
    let border_char = if selected { "=" } else { "-" };
    let top = format!("+{}+", border_char.repeat(inner_width));
    let text = truncate_text(&todo.text, inner_width.saturating_sub(2));
    let lines = vec![
        Line::raw(top.clone()),
        Line::raw(format!("| {:width$} |", text, width = inner_width.saturating_sub(2))),
        Line::raw(top),
    ];
    let style = if lifted {
        Style::default()
            .bg(Color::Rgb(22, 24, 30))
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM)
    } else if selected {
        Style::default()
            .bg(Color::Rgb(252, 214, 112))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::Rgb(22, 24, 30)).fg(Color::Gray)
    };
    ListItem::new(lines).style(style)
}

fn drop_slot(width: u16) -> ListItem<'static> {
    let inner_width = width.saturating_sub(4).max(10) as usize;
    let edge = format!("+{}+", "~".repeat(inner_width));
    ListItem::new(vec![
        Line::raw(edge.clone()),
        Line::raw(format!("| {:^width$} |", "drop here", width = inner_width.saturating_sub(2))),
        Line::raw(edge),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

fn task_item(task: &CategorizedTodo) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::styled(format!("[{}]", task.id), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            truncate_text(&task.text, 60),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ]))
    .style(Style::default().fg(Color::Gray))
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
