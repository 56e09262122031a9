// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use russh::ChannelMsg;
use russh::client::Handle;

use crate::app::ports::SessionError;

use super::ClientHandler;

const FAILURE_TAIL_BYTES: usize = 4096;

/// Forwards stdout and stderr chunks, tracks the exit status and reports
/// whether the channel is done.
fn handle_exec_message(
    msg: &ChannelMsg,
    on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
    tail: &mut Vec<u8>,
    code: &mut Option<u32>,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            keep_tail(tail, data);
            on_chunk(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            keep_tail(tail, data);
            on_chunk(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = Some(*exit_status);
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

fn keep_tail(tail: &mut Vec<u8>, data: &[u8]) {
    tail.extend_from_slice(data);
    if tail.len() > FAILURE_TAIL_BYTES {
        let excess = tail.len() - FAILURE_TAIL_BYTES;
        tail.drain(..excess);
    }
}

pub(super) async fn run_command(
    handle: &Handle<ClientHandler>,
    host: &str,
    command: &str,
    on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
) -> Result<(), SessionError> {
    let transport = |err: russh::Error| SessionError::ConnectionFailed {
        host: host.to_string(),
        reason: err.to_string(),
    };
    let mut chan = handle.channel_open_session().await.map_err(transport)?;
    tracing::debug!("executing '{command}'");
    chan.exec(true, command).await.map_err(transport)?;

    let mut tail = Vec::new();
    let mut code = None;
    while let Some(msg) = chan.wait().await {
        if handle_exec_message(&msg, on_chunk, &mut tail, &mut code) {
            break;
        }
    }
    let _ = chan.close().await;

    match code {
        Some(0) => Ok(()),
        exit_code => Err(SessionError::CommandFailed {
            command: command.to_string(),
            exit_code,
            output: String::from_utf8_lossy(&tail).into_owned(),
        }),
    }
}
