mod cli;
mod commands;
mod config;
mod logging;
mod model;
mod storage;
mod store;
mod tasks;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = config::Config::load()?;
    logging::init(&config);
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init { boards } => commands::init(&config, boards),
        cli::Command::List { board } => commands::list(&config, board),
        cli::Command::Add { text, board } => commands::add(&config, text, board),
        cli::Command::Move {
            board,
            index,
            to,
            at,
        } => commands::move_todo(&config, board, index, to, at),
        cli::Command::Rm { board, index } => commands::remove(&config, board, index),
        cli::Command::Board { command } => match command {
            cli::BoardCommand::Add { name } => commands::board_add(&config, name),
            cli::BoardCommand::Move { from, to } => commands::board_move(&config, from, to),
        },
        cli::Command::Tasks { command } => match command {
            cli::TasksCommand::List { category } => commands::tasks_list(&config, category),
            cli::TasksCommand::Add { text, category } => {
                commands::tasks_add(&config, text, category)
            }
            cli::TasksCommand::Mark { id, category } => {
                commands::tasks_mark(&config, id, category)
            }
            cli::TasksCommand::Rm { id } => commands::tasks_remove(&config, id),
            cli::TasksCommand::Reset => commands::tasks_reset(&config),
        },
        cli::Command::Tui => commands::tui(&config),
    }
}
