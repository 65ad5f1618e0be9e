// Log por tentativa (nível via RUST_LOG)
use log::{debug, info, trace, warn};

// Erros e saída de progresso
use std::fmt;
use std::io::{self, Write};

// Flag de interrupção compartilhada com o handler de Ctrl+C
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Prazo e medição de tempo (RTT)
use std::time::{Duration, Instant};

// Módulos locais
use crate::icmp::{self, EchoReply};
use crate::stats::{Report, RunStatistics};
use crate::transport::{self, EchoTransport, RawIcmpSocket};

/// Cabe qualquer datagrama IPv4.
const RECV_BUFFER_SIZE: usize = 1 << 16;

pub const DEFAULT_COUNT: u32 = 4;
pub const DEFAULT_PAYLOAD_SIZE: usize = 32;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Maior payload aceito por `-l`.
pub const MAX_PAYLOAD_SIZE: usize = 65500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingConfig {
    pub host: String,
    pub count: u32,
    pub payload_size: usize,
    pub timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            host: String::new(),
            count: DEFAULT_COUNT,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// O transporte não abriu; a execução para antes de qualquer requisição.
    HostNotFound { host: String, source: io::Error },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostNotFound { host, .. } => write!(
                f,
                "Ping request could not find host {host}. Please check the name and try again."
            ),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HostNotFound { source, .. } => Some(source),
        }
    }
}

/// Faz ping em `config.host` por um socket ICMP RAW.
pub fn ping<W: Write>(
    config: &PingConfig,
    running: &AtomicBool,
    out: &mut W,
) -> Result<Report, SessionError> {
    ping_via(config, RawIcmpSocket::open, running, out)
}

/// Abre o transporte com `open` e executa a sessão sobre ele.
///
/// O transporte vive a execução inteira e é descartado antes do retorno.
pub fn ping_via<T, F, W>(
    config: &PingConfig,
    open: F,
    running: &AtomicBool,
    out: &mut W,
) -> Result<Report, SessionError>
where
    T: EchoTransport,
    F: FnOnce(&str) -> io::Result<T>,
    W: Write,
{
    let transport = open(&config.host).map_err(|source| SessionError::HostNotFound {
        host: config.host.clone(),
        source,
    })?;
    info!("resolved {} to {}", config.host, transport.remote_addr());

    // Cabeçalho antes da primeira requisição
    let mut session = EchoSession::new(transport, config);
    let _ = writeln!(
        out,
        "Pinging {} [{}] with {} bytes of data:",
        config.host,
        session.transport.remote_addr(),
        config.payload_size
    );
    Ok(session.run(running, out))
}

/// Conduz o ciclo envio / espera / timeout, uma requisição por vez.
pub struct EchoSession<T> {
    transport: T,
    count: u32,
    payload_size: usize,
    timeout: Duration,
    buf: Vec<u8>,
}

impl<T: EchoTransport> EchoSession<T> {
    pub fn new(transport: T, config: &PingConfig) -> Self {
        EchoSession {
            transport,
            count: config.count,
            payload_size: config.payload_size,
            timeout: config.timeout,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    /// Executa até `count` requisições e devolve as estatísticas.
    ///
    /// Com `running` em `false` o laço para antes de montar a próxima requisição.
    /// As linhas de progresso vão para `out`; falha ao escrever nelas não afeta a execução.
    pub fn run<W: Write>(&mut self, running: &AtomicBool, out: &mut W) -> Report {
        let mut stats = RunStatistics::new();

        for i in 0..self.count {
            // Verifica se foi interrompido
            if !running.load(Ordering::SeqCst) {
                debug!("interrupted after {} requests", stats.sent);
                break;
            }
            // Identificador e sequência dão a volta depois de 65535
            let seq = i as u16;
            let line = self.attempt(seq, &mut stats);
            let _ = writeln!(out, "{line}");
        }

        Report {
            remote: self.transport.remote_addr(),
            stats,
        }
    }

    fn attempt(&mut self, seq: u16, stats: &mut RunStatistics) -> String {
        // Constrói o Echo Request via módulo icmp
        let pkt = match icmp::build_echo_request(seq, self.payload_size) {
            Ok(pkt) => pkt,
            Err(e) => {
                // Nada foi enviado nem medido: conta só a falha
                warn!("seq={seq}: {e}");
                stats.record_unsent();
                return "Request failed.".to_string();
            }
        };

        // Marca o instante do envio para calcular o RTT depois
        let t_start = Instant::now();

        // Um único prazo cobre o envio e a leitura seguinte
        let sent = self
            .transport
            .set_deadline(t_start + self.timeout)
            .and_then(|()| self.transport.send(&pkt));
        if let Err(e) = sent {
            // Falhou o envio: não aguardamos resposta, mas conta como perda
            warn!("seq={seq}: send failed: {e}");
            stats.record(elapsed_ms(t_start), false);
            return "Request failed.".to_string();
        }

        // Uma só leitura: o que chegar primeiro é a resposta desta requisição
        let received = self.transport.recv(&mut self.buf);
        let t_spend = elapsed_ms(t_start);

        let n = match received {
            Ok(n) => n,
            Err(e) => {
                // Timeout ou erro de leitura, o tempo gasto entra na estatística
                if transport::is_timeout(&e) {
                    debug!("seq={seq}: no reply within {:?}", self.timeout);
                } else {
                    warn!("seq={seq}: read failed: {e}");
                }
                stats.record(t_spend, false);
                return "Request timed out.".to_string();
            }
        };

        // TTL e origem vêm do cabeçalho IPv4 que acompanha a resposta
        match EchoReply::parse(&self.buf[..n]) {
            Ok(reply) => {
                trace!("seq={seq}: {n} bytes {reply:?}");
                debug!("seq={seq}: reply in {t_spend}ms");
                stats.record(t_spend, true);
                format!(
                    "Reply from {}: bytes={} time={}ms TTL={}",
                    reply.source, reply.payload_len, t_spend, reply.ttl
                )
            }
            Err(e) => {
                warn!("seq={seq}: {e}");
                stats.record(t_spend, false);
                "Request timed out.".to_string()
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Flag de parada compartilhada, posta em `false` pelo handler de Ctrl+C.
pub fn running_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}
