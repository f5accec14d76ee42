//! stdio transport: one embedded client, one session per process.
//! Newline-delimited JSON frames on stdin/stdout.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use tmws_core::constants::SESSION_IDLE_TIMEOUT_SECS;

use crate::protocol;
use crate::state::AppState;
use crate::transport::handle_frame;

const SESSION_ID: &str = "stdio";

/// Run the stdio loop until EOF or idle timeout.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let agent = state.default_session_agent()?;
    tracing::info!(agent_id = %agent.agent_id, "stdio session starting");
    state.sessions.create(SESSION_ID, agent)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let idle = std::time::Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS);

    loop {
        let line = match tokio::time::timeout(idle, lines.next_line()).await {
            Err(_) => {
                let note = protocol::notification("session_expired", serde_json::json!({
                    "idle_secs": SESSION_IDLE_TIMEOUT_SECS,
                }));
                stdout.write_all(note.to_string().as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
                break;
            }
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) | Ok(Err(_)) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_frame(state.clone(), SESSION_ID.to_string(), line).await;
        stdout.write_all(response.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    state.sessions.remove(SESSION_ID);
    tracing::info!("stdio session closed");
    Ok(())
}
