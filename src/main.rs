//! Diagnostic client for test agents.
//!
//! Connects to one agent, optionally sends a command with an attachment,
//! and prints the reply header and attachment size.

mod cli;

use std::process::ExitCode;

use agentwire::{
    CommError,
    Connection,
    EngineConfig,
    Received,
    config::ConnectRetry,
    encode_message,
    reconnect::{ReconnectConfig, connect_agent, parse_agent_pid},
};
use bytes::BytesMut;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "agentwire failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: cli::Cli) -> agentwire::Result<()> {
    let config = EngineConfig::default().with_connect_retry(ConnectRetry {
        attempts: cli.connect_attempts,
        ..ConnectRetry::default()
    });
    let mut buf = vec![0u8; cli.buffer];

    if cli.wait_greeting {
        let session = connect_agent(
            &cli.host,
            &cli.port,
            &ReconnectConfig::default(),
            &config,
            &mut buf,
        )
        .await?;
        let pid = parse_agent_pid(&buf)?;
        println!("agent pid {pid}");
        return session.connection.close();
    }

    let mut conn = Connection::connect_with(&cli.host, &cli.port, &config).await?;
    if let Some(command) = &cli.command {
        let attachment = cli.attach.as_deref().map(std::fs::read).transpose()?;
        let wire = encode_message(command, attachment.as_deref())?;
        conn.send(&wire).await?;
    }

    let first = conn.receive(&mut buf).await?;
    let (header_end, attachment) = collect_reply(&mut conn, &mut buf, first).await?;
    let header_len = buf[..header_end]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(header_end);
    println!("{}", String::from_utf8_lossy(&buf[..header_len]));
    if let Some(attachment) = attachment {
        println!("attachment: {} bytes", attachment.len());
    }
    conn.close()
}

/// Drain a reply, returning where its header ends and its attachment.
async fn collect_reply(
    conn: &mut Connection,
    buf: &mut [u8],
    first: Received,
) -> agentwire::Result<(usize, Option<BytesMut>)> {
    let (header_end, mut attachment) = match first {
        Received::Complete {
            len,
            attachment: None,
        } => return Ok((len, None)),
        Received::Complete {
            len,
            attachment: Some(offset),
        } => return Ok((offset, Some(BytesMut::from(&buf[offset..len])))),
        Received::AttachmentPending {
            attachment: offset, ..
        } => (offset, BytesMut::from(&buf[offset..])),
        Received::BufferTooSmall => return Err(too_small()),
    };

    // Later chunks overwrite the header, so keep a copy of it.
    let header = buf[..header_end].to_vec();
    loop {
        match conn.receive(buf).await? {
            Received::AttachmentPending { .. } => attachment.extend_from_slice(buf),
            Received::Complete { len, .. } => {
                attachment.extend_from_slice(&buf[..len]);
                break;
            }
            Received::BufferTooSmall => return Err(too_small()),
        }
    }
    buf[..header_end].copy_from_slice(&header);
    Ok((header_end, Some(attachment)))
}

fn too_small() -> CommError { CommError::InvalidArgument("reply header does not fit --buffer") }
