//! Live SMTP deliverability probe.
//!
//! Resolves the candidate domain's MX records, connects to the
//! highest-priority exchange, and walks the envelope up to `RCPT TO`
//! without ever sending `DATA`. The reply code to `RCPT TO` classifies
//! the address.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::ProbeResult;

use super::traits::{DeliverabilityProbe, VerifyError, VerifyResult};

/// SMTP-handshake deliverability prober.
pub struct SmtpProber {
    resolver: TokioResolver,
    /// Envelope sender used for `MAIL FROM`.
    probe_from: String,
    timeout: Duration,
}

impl SmtpProber {
    pub fn new(probe_from: impl Into<String>, timeout: Duration) -> VerifyResult<Self> {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| VerifyError::Dns(e.to_string()))?
            .build();
        Ok(Self {
            resolver,
            probe_from: probe_from.into(),
            timeout,
        })
    }

    /// MX exchanges sorted by preference, falling back to the domain itself
    /// when no MX records exist (implicit MX per RFC 5321).
    async fn mail_hosts(&self, domain: &str) -> VerifyResult<Vec<String>> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut exchanges: Vec<(u16, String)> = lookup
                    .iter()
                    .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
                    .collect();
                if exchanges.is_empty() {
                    return Ok(vec![domain.to_string()]);
                }
                exchanges.sort_by_key(|(pref, _)| *pref);
                Ok(exchanges.into_iter().map(|(_, host)| host).collect())
            }
            Err(err) if err.is_no_records_found() => Ok(vec![domain.to_string()]),
            Err(err) => Err(VerifyError::Dns(err.to_string())),
        }
    }

    async fn rcpt_reply_code(&self, host: &str, email: &str) -> VerifyResult<u16> {
        let stream = TcpStream::connect((host.trim_end_matches('.'), 25)).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        read_reply(&mut reader).await?;

        write_half
            .write_all(b"EHLO verifier.localdomain\r\n")
            .await?;
        read_reply(&mut reader).await?;

        write_half
            .write_all(format!("MAIL FROM:<{}>\r\n", self.probe_from).as_bytes())
            .await?;
        read_reply(&mut reader).await?;

        write_half
            .write_all(format!("RCPT TO:<{email}>\r\n").as_bytes())
            .await?;
        let code = read_reply(&mut reader).await?;

        // Best-effort goodbye; the verdict is already in hand.
        let _ = write_half.write_all(b"QUIT\r\n").await;

        Ok(code)
    }
}

/// Reads one (possibly multi-line) SMTP reply and returns its code.
async fn read_reply<R>(reader: &mut BufReader<R>) -> VerifyResult<u16>
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(VerifyError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-reply",
            )));
        }
        if line.len() >= 4 && line.as_bytes()[3] != b'-' {
            let code = line[..3]
                .parse()
                .map_err(|_| VerifyError::Dns(format!("unparseable reply: {line}")))?;
            return Ok(code);
        }
    }
}

#[async_trait]
impl DeliverabilityProbe for SmtpProber {
    async fn probe(&self, email: &str) -> VerifyResult<ProbeResult> {
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .ok_or_else(|| VerifyError::MalformedAddress(email.to_string()))?;

        let hosts = match self.mail_hosts(domain).await {
            Ok(hosts) => hosts,
            Err(err) => {
                debug!(domain, error = %err, "mx resolution failed, probe inconclusive");
                return Ok(ProbeResult::unknown());
            }
        };

        for host in &hosts {
            let attempt = tokio::time::timeout(self.timeout, self.rcpt_reply_code(host, email));
            match attempt.await {
                Ok(Ok(code)) => {
                    debug!(email, host, code, "rcpt probe reply");
                    return Ok(classify_reply(code));
                }
                Ok(Err(err)) => {
                    debug!(email, host, error = %err, "probe attempt failed, trying next host");
                }
                Err(_) => {
                    debug!(email, host, "probe timed out, trying next host");
                }
            }
        }

        Ok(ProbeResult::unknown())
    }
}

/// Maps an `RCPT TO` reply code to a probe verdict.
fn classify_reply(code: u16) -> ProbeResult {
    match code {
        250 | 251 | 252 => ProbeResult::valid(),
        500..=599 => ProbeResult::invalid(),
        _ => ProbeResult::unknown(),
    }
}
