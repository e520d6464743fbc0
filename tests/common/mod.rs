//! Scripted SMTP server for integration tests.
//!
//! Speaks just enough ESMTP for lettre's client, records every command line
//! and every DATA payload, and can be told to advertise STARTTLS/AUTH or to
//! refuse credentials and recipients. It never speaks TLS: a STARTTLS
//! request is acknowledged and the connection dropped.

#![allow(dead_code)]

use mailsender::SmtpConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const GREETING: &[u8] = b"220 scripted.test ESMTP ready\r\n";
const OK: &str = "250 2.0.0 Ok\r\n";

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub starttls: bool,
    pub auth: bool,
    pub reject_auth: bool,
    pub reject_rcpt: Vec<String>,
    /// Answer MAIL with 530, as servers that insist on STARTTLS do
    pub require_tls_for_mail: bool,
}

/// Everything the server saw, across all connections
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub connections: usize,
    pub commands: Vec<String>,
    pub messages: Vec<String>,
}

impl Transcript {
    /// Upper-cased first word of each command
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|c| c.split_whitespace().next().unwrap_or("").to_uppercase())
            .collect()
    }

    pub fn has_verb(&self, verb: &str) -> bool {
        self.verbs().iter().any(|v| v == verb)
    }

    pub fn position(&self, verb: &str) -> Option<usize> {
        self.verbs().iter().position(|v| v == verb)
    }

    /// Addresses given to RCPT TO, in order
    pub fn recipients(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| {
                let upper = c.to_uppercase();
                upper
                    .starts_with("RCPT TO:")
                    .then(|| c["RCPT TO:".len()..].trim().trim_start_matches('<'))
                    .map(|addr| addr.split('>').next().unwrap_or("").to_string())
            })
            .collect()
    }
}

pub struct ScriptedSmtpServer {
    addr: SocketAddr,
    transcript: Arc<Mutex<Transcript>>,
}

impl ScriptedSmtpServer {
    pub async fn start(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let transcript = Arc::new(Mutex::new(Transcript::default()));

        let shared = transcript.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let options = options.clone();
                let shared = shared.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, options, shared).await;
                });
            }
        });

        Self { addr, transcript }
    }

    /// Plain configuration pointing at this server
    pub fn config(&self) -> SmtpConfig {
        SmtpConfig::new("127.0.0.1", self.addr.port()).with_timeout(Duration::from_secs(5))
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.lock().unwrap().clone()
    }
}

fn ehlo_reply(options: &ServerOptions) -> String {
    let mut lines = vec!["scripted.test", "8BITMIME"];
    if options.starttls {
        lines.push("STARTTLS");
    }
    if options.auth {
        lines.push("AUTH PLAIN LOGIN");
    }

    let last = lines.len() - 1;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let sep = if i == last { ' ' } else { '-' };
            format!("250{}{}\r\n", sep, line)
        })
        .collect()
}

async fn serve(
    stream: TcpStream,
    options: ServerOptions,
    transcript: Arc<Mutex<Transcript>>,
) -> std::io::Result<()> {
    transcript.lock().unwrap().connections += 1;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    writer.write_all(GREETING).await?;

    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }

        let command = String::from_utf8_lossy(&line).trim_end().to_string();
        transcript.lock().unwrap().commands.push(command.clone());
        let verb = command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();

        let reply = match verb.as_str() {
            "EHLO" => ehlo_reply(&options),
            "HELO" => "250 scripted.test\r\n".to_string(),
            "STARTTLS" => {
                writer.write_all(b"220 2.0.0 Ready to start TLS\r\n").await?;
                return Ok(());
            }
            "AUTH" if options.reject_auth => {
                "535 5.7.8 Authentication credentials invalid\r\n".to_string()
            }
            "AUTH" => "235 2.7.0 Authentication successful\r\n".to_string(),
            "MAIL" if options.require_tls_for_mail => {
                "530 5.7.0 Must issue a STARTTLS command first\r\n".to_string()
            }
            "MAIL" => "250 2.1.0 Ok\r\n".to_string(),
            "RCPT" if options.reject_rcpt.iter().any(|r| command.contains(r.as_str())) => {
                "550 5.1.1 Recipient address rejected\r\n".to_string()
            }
            "RCPT" => "250 2.1.5 Ok\r\n".to_string(),
            "DATA" => {
                writer
                    .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await?;
                let data = read_data(&mut reader).await?;
                transcript.lock().unwrap().messages.push(data);
                "250 2.0.0 Ok: queued as SCRIPTED\r\n".to_string()
            }
            "RSET" | "NOOP" => OK.to_string(),
            "QUIT" => {
                writer.write_all(b"221 2.0.0 Bye\r\n").await?;
                return Ok(());
            }
            _ => "502 5.5.2 Error: command not recognized\r\n".to_string(),
        };

        writer.write_all(reply.as_bytes()).await?;
    }
}

/// Read a DATA payload up to the lone "." line
async fn read_data<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut data = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line == b".\r\n" {
            break;
        }
        data.push_str(&String::from_utf8_lossy(&line));
    }
    Ok(data)
}

/// A port nothing is listening on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
