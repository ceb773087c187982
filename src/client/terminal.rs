use log::info;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };

use super::transport::HttpRelayTransport;
use super::{ ChatSession, ScrollTracker, SubmitState };
use crate::cli::ChatArgs;
use crate::models::stream::StreamPart;

const QUIT_COMMAND: &str = "/quit";

fn print_part(part: &StreamPart) {
    match part {
        StreamPart::TextDelta { text } => print!("{}", text),
        StreamPart::ToolCall { tool_name, arguments, .. } => {
            println!("\n[{} {}]", tool_name, arguments);
        }
        StreamPart::ToolResult { tool_name, result, .. } => {
            println!("[{} -> {}]", tool_name, result);
        }
        StreamPart::Finish { .. } => println!(),
        StreamPart::Error { .. } => {}
    }
    let _ = std::io::stdout().flush();
}

/// Interactive chat against a running relay. Replies stream to stdout as
/// they arrive; `/quit` or end of input leaves.
pub async fn run(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = HttpRelayTransport::new(&args.relay_url)?;
    info!("Chatting through relay at {}", transport.url());

    let mut session = ChatSession::new(transport).with_initial_question(args.question);
    let mut scroll = ScrollTracker::default();

    if let Some(question) = session.pending_question() {
        println!("User: {}", question.trim());
        print!("AI: ");
    }
    if session.mount_with(print_part).await.is_some() {
        report_failure(&session, &mut scroll);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == QUIT_COMMAND {
            break;
        }
        if line.is_empty() {
            continue;
        }

        print!("AI: ");
        let _ = std::io::stdout().flush();
        session.submit_with(line, print_part).await;
        report_failure(&session, &mut scroll);
    }

    info!("Chat ended after {} message(s)", session.conversation().len());
    Ok(())
}

fn report_failure<T: super::transport::RelayTransport>(
    session: &ChatSession<T>,
    scroll: &mut ScrollTracker
) {
    let Some(latest) = scroll.observe(session.conversation()) else {
        return;
    };
    if session.state() == SubmitState::Failed {
        println!("\n{}", latest.content.text());
    }
}
