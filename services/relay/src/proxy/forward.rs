//! Bidirectional byte pump between the client and the destination.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const PUMP_BUFFER_SIZE: usize = 8192;

/// Which direction finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToRemote,
    RemoteToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientToRemote => "client_to_remote",
            Self::RemoteToClient => "remote_to_client",
        }
    }
}

/// Summary of a finished pump.
#[derive(Debug)]
pub struct PumpOutcome {
    /// Bytes copied from the client to the destination.
    pub to_remote: u64,
    /// Bytes copied from the destination to the client.
    pub to_client: u64,
    /// Direction whose end (EOF or error) terminated the session.
    pub ended_by: Direction,
    /// I/O error that ended the session, if it was not a clean EOF.
    pub error: Option<io::Error>,
}

/// Pump bytes both ways until either direction reaches end-of-stream or
/// fails, then shut down and drop both legs.
///
/// Data still in flight in the other direction is discarded.
pub async fn pump<A, B>(client: A, remote: B) -> PumpOutcome
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let mut to_remote = 0u64;
    let mut to_client = 0u64;

    let (ended_by, result) = {
        let upstream = copy_half(&mut client_read, &mut remote_write, &mut to_remote);
        let downstream = copy_half(&mut remote_read, &mut client_write, &mut to_client);

        tokio::select! {
            result = upstream => (Direction::ClientToRemote, result),
            result = downstream => (Direction::RemoteToClient, result),
        }
    };

    let _ = client_write.shutdown().await;
    let _ = remote_write.shutdown().await;

    PumpOutcome {
        to_remote,
        to_client,
        ended_by,
        error: result.err(),
    }
}

async fn copy_half<R, W>(reader: &mut R, writer: &mut W, total: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        *total += n as u64;
    }
}
