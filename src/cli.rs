use crate::tasks::Category;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "todoboard", version, about = "Terminal todo boards with drag-and-drop")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project store in the current directory
    Init {
        /// Boards to start with (repeatable, defaults from config)
        #[arg(long = "board", short = 'b')]
        boards: Vec<String>,
    },
    /// List boards and their todos
    List {
        /// Only show this board
        #[arg(long)]
        board: Option<String>,
    },
    /// Add a todo to the top of a board
    Add {
        /// Todo text
        text: String,
        /// Board name (defaults to the first board)
        #[arg(long)]
        board: Option<String>,
    },
    /// Move a todo within or between boards
    Move {
        /// Board holding the todo
        board: String,
        /// Position of the todo in that board
        index: usize,
        /// Destination board (defaults to the same board)
        #[arg(long)]
        to: Option<String>,
        /// Position in the destination board
        #[arg(long, default_value_t = 0)]
        at: usize,
    },
    /// Throw a todo in the trash
    Rm {
        /// Board holding the todo
        board: String,
        /// Position of the todo in that board
        index: usize,
    },
    /// Manage boards
    Board {
        #[command(subcommand)]
        command: BoardCommand,
    },
    /// Flat task list tagged by category
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Create a new empty board
    Add {
        /// Unique board name
        name: String,
    },
    /// Change a board's display position
    Move {
        /// Current position
        from: usize,
        /// New position
        to: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// List tasks with overall progress
    List {
        /// Only show this category
        #[arg(long, value_enum)]
        category: Option<Category>,
    },
    /// Add a task
    Add {
        /// Task text
        text: String,
        #[arg(long, value_enum, default_value_t = Category::ToDo)]
        category: Category,
    },
    /// Change a task's category
    Mark {
        /// Task id
        id: i64,
        #[arg(value_enum)]
        category: Category,
    },
    /// Delete a task
    Rm {
        /// Task id
        id: i64,
    },
    /// Forget every task
    Reset,
}
