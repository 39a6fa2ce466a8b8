use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use boxchat::api::AppState;
use boxchat::config::Settings;
use boxchat::major::Major;

#[derive(Parser, Debug)]
#[command(name = "boxchat-chat")]
#[command(about = "Chat with the curriculum assistant from the terminal")]
struct Args {
    /// Major label or code (ai, ktpm, cntt); asked interactively when omitted
    #[arg(long)]
    major: Option<String>,
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    boxchat::init_tracing();
    let settings = Settings::load()?;
    let args = Args::parse();

    let state = AppState::from_settings(&settings)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("=== Chat với AI HSU (gõ 'exit' để thoát) ===");
    let label = match args.major {
        Some(label) => label,
        None => {
            let choices: Vec<&str> = Major::ALL.iter().map(|m| m.label()).collect();
            prompt(&format!("Bạn học ngành gì ({})? ", choices.join(" / ")))?;
            lines.next_line().await?.unwrap_or_default()
        }
    };

    let index = match state.registry.get_or_build_label(&label).await {
        Ok(index) => index,
        Err(e) => {
            println!("[LỖI KHỞI TẠO]: {}", e);
            return Ok(());
        }
    };
    let major = index.major();

    loop {
        prompt("\nBạn: ")?;
        let Some(line) = lines.next_line().await? else {
            println!("\nTạm biệt!");
            break;
        };

        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            println!("Tạm biệt!");
            break;
        }
        if question.is_empty() {
            continue;
        }

        match state.answers.answer(&index, question, major).await {
            Ok(answer) if !answer.is_empty() => println!("AI: {}", answer),
            Ok(_) => {}
            Err(e) => println!("[LỖI]: {}", e),
        }
    }

    Ok(())
}
