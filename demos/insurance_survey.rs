//! Health insurance intake survey example
//!
//! This example drives the intake flow from the terminal:
//! 1. Asks whether the respondent is ready to start
//! 2. Collects who needs coverage, zip code and household size
//! 3. Asks about children only when children are covered
//! 4. Collects income, skipping the budget question for lower incomes
//! 5. Offers a call with an expert
//!
//! Type `restart` to start over, `quit` to exit.
//!
//! Run with: cargo run --example insurance_survey

use std::sync::Arc;
use survey::flow::{self, IntakeConfig, StaticServiceArea};
use survey::{ConversationId, LogLevel, OutboundMessage, TurnResult, WizardConfig, WizardEngine};
use tokio::io::{AsyncBufReadExt, BufReader};

fn print_turn(turn: &TurnResult) {
    for message in &turn.outbound {
        match message {
            OutboundMessage::Text { text } => println!("Bot: {}", text),
            OutboundMessage::Prompt(prompt) => {
                println!("Bot: {}", prompt.text);
                for (i, choice) in prompt.choices.iter().enumerate() {
                    println!("     {}. {}", i + 1, choice);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WizardConfig {
        max_attempts: Some(5),
        log_level: LogLevel::Warn,
        ..WizardConfig::default()
    };

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(config.log_level))
        .init();

    println!("🩺 Health Insurance Intake");
    println!("==========================\n");

    let graph = flow::reference_graph(
        Arc::new(StaticServiceArea::default()),
        &IntakeConfig::default(),
    )?;
    println!(
        "✓ Flow built: {} steps in {} sub-sequences\n",
        graph.step_count(),
        graph.sequence_names().count()
    );

    let engine = WizardEngine::builder().graph(graph).config(config).build()?;
    let id = ConversationId::new();

    print_turn(&engine.on_conversation_start(&id).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "quit" | "exit" => break,
            "restart" => {
                print_turn(&engine.on_conversation_start(&id).await?);
                continue;
            }
            _ => {}
        }

        let turn = engine.on_inbound_answer(&id, input).await?;
        print_turn(&turn);

        if turn.is_ended() {
            println!("\n📋 Answers collected:");
            println!("{}", serde_json::to_string_pretty(&turn.state.answers)?);
            println!("\n(type `restart` to go again or `quit` to exit)");
        }
    }

    Ok(())
}
