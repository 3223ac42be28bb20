// src/main.rs
use anyhow::Context;
use log::info;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use textileguard::build_app_from_config;
use textileguard::config::Config;
use textileguard::handlers::{App, HELP, Intent, parse_intent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Starting TextileGuard client against {}", config.api_url);

    let mut app = build_app_from_config(&config).context("Failed to start client")?;
    if let Err(e) = app.initialize().await {
        eprintln!("! {}", e);
    }

    println!("{}", app.render());
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&app)?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let intent = match parse_intent(&line) {
            Ok(intent) => intent,
            Err(e) => {
                eprintln!("! {}", e);
                continue;
            }
        };

        match &intent {
            Intent::Quit => break,
            Intent::Help => {
                println!("{}", HELP);
                continue;
            }
            Intent::Delete(_) if !confirm(&mut lines, "Delete this report permanently?").await? => {
                continue;
            }
            _ => {}
        }

        match app.dispatch(intent).await {
            Ok(Some(notice)) => println!("* {}", notice),
            Ok(None) => {}
            Err(e) => eprintln!("! {}", e),
        }
        println!("{}", app.render());
    }

    info!("Bye");
    Ok(())
}

fn prompt(app: &App) -> std::io::Result<()> {
    print!("{}> ", app.route().path());
    std::io::stdout().flush()
}

async fn confirm(lines: &mut Lines<BufReader<Stdin>>, question: &str) -> std::io::Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
