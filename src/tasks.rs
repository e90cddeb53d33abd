//! Flat task list where each todo carries a category tag instead of living
//! inside a named board. Stored separately from [`crate::model::BoardState`]
//! and never converted into it.

use crate::model::TodoId;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    ToDo,
    Doing,
    Done,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::ToDo, Category::Doing, Category::Done];

    pub fn label(&self) -> &'static str {
        match self {
            Category::ToDo => "To Do",
            Category::Doing => "Doing",
            Category::Done => "Done",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Category::ToDo => Category::Doing,
            Category::Doing => Category::Done,
            Category::Done => Category::ToDo,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Category::ToDo => Category::Done,
            Category::Doing => Category::ToDo,
            Category::Done => Category::Doing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedTodo {
    pub text: String,
    pub id: TodoId,
    pub category: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList {
    todos: Vec<CategorizedTodo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task text must not be empty")]
    EmptyText,
    #[error("task not found: {0}")]
    NotFound(TodoId),
    #[error("no task id left after {0}")]
    IdsExhausted(TodoId),
}

impl TaskList {
    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn all(&self) -> &[CategorizedTodo] {
        &self.todos
    }

    pub fn get(&self, id: TodoId) -> Option<&CategorizedTodo> {
        self.todos.iter().find(|t| t.id == id)
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &CategorizedTodo> {
        self.todos.iter().filter(move |t| t.category == category)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            total: self.len(),
            completed: self.in_category(Category::Done).count(),
        }
    }

    pub fn add(&mut self, text: &str, category: Category) -> Result<TodoId, TaskError> {
        self.add_at(text, category, Utc::now().timestamp_millis())
    }

    pub fn add_at(
        &mut self,
        text: &str,
        category: Category,
        now_ms: i64,
    ) -> Result<TodoId, TaskError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskError::EmptyText);
        }
        let id = match self.todos.iter().map(|t| t.id).max() {
            Some(max) if max >= now_ms => {
                max.checked_add(1).ok_or(TaskError::IdsExhausted(max))?
            }
            _ => now_ms,
        };
        self.todos.insert(
            0,
            CategorizedTodo {
                text: text.to_string(),
                id,
                category,
            },
        );
        Ok(id)
    }

    /// Retags a todo in place; its position in the list does not change.
    pub fn recategorize(&mut self, id: TodoId, category: Category) -> Result<(), TaskError> {
        let todo = self
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;
        todo.category = category;
        Ok(())
    }

    pub fn remove(&mut self, id: TodoId) -> Result<CategorizedTodo, TaskError> {
        let idx = self
            .todos
            .iter()
            .position(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;
        Ok(self.todos.remove(idx))
    }
}
