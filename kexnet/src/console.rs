//! Line-oriented operator console for an agent.
//!
//! ```text
//! connect bob          run a handshake with bob
//! send bob hello       send "hello" over the session with bob
//! inbox bob            print and clear messages received from bob
//! peers                list established sessions
//! quit
//! ```

use std::io::{self, BufRead, Write};

use kextrust::Agent;

const HELP: &str = "commands: connect <peer> | send <peer> <message> | inbox <peer> | peers | help | quit";

#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Connect(&'a str),
    Send(&'a str, &'a str),
    Inbox(&'a str),
    Peers,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

pub fn parse(line: &str) -> Line<'_> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();
    match (word, rest) {
        ("", _) => Line::Empty,
        ("connect", peer) if !peer.is_empty() => Line::Connect(peer),
        ("send", rest) => match rest.split_once(char::is_whitespace) {
            Some((peer, message)) => Line::Send(peer, message.trim_start()),
            None => Line::Unknown(line),
        },
        ("inbox", peer) if !peer.is_empty() => Line::Inbox(peer),
        ("peers", _) => Line::Peers,
        ("help", _) => Line::Help,
        ("quit" | "exit", _) => Line::Quit,
        _ => Line::Unknown(line),
    }
}

/// Read commands from `input` until EOF or `quit`. Engine errors are printed,
/// not returned.
pub fn run(agent: &Agent, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
    writeln!(out, "{} ready; {HELP}", agent.id())?;
    for line in input.lines() {
        let line = line?;
        match parse(&line) {
            Line::Connect(peer) => match agent.initiate(peer) {
                Ok(()) => writeln!(
                    out,
                    "session with {peer} established ({})",
                    agent.session_key_fingerprint(peer).unwrap_or_default()
                )?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Line::Send(peer, message) => match agent.send(peer, message.as_bytes()) {
                Ok(()) => writeln!(out, "sent")?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Line::Inbox(peer) => {
                let messages = agent.drain_inbox(peer);
                if messages.is_empty() {
                    writeln!(out, "no messages from {peer}")?;
                }
                for message in messages {
                    writeln!(out, "{peer}: {}", String::from_utf8_lossy(&message))?;
                }
            }
            Line::Peers => writeln!(out, "{}", agent.established_peers().join(" "))?,
            Line::Help | Line::Unknown(_) => writeln!(out, "{HELP}")?,
            Line::Quit => break,
            Line::Empty => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse("connect bob"), Line::Connect("bob"));
        assert_eq!(parse("  send bob hello there "), Line::Send("bob", "hello there"));
        assert_eq!(parse("inbox alice"), Line::Inbox("alice"));
        assert_eq!(parse("peers"), Line::Peers);
        assert_eq!(parse("exit"), Line::Quit);
        assert_eq!(parse(""), Line::Empty);
        assert_eq!(parse("send bob"), Line::Unknown("send bob"));
        assert_eq!(parse("connect"), Line::Unknown("connect"));
    }
}
