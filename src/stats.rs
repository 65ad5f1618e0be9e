// Formatação do bloco de resumo
use std::fmt;
use std::net::Ipv4Addr;

/// Valor inicial do mínimo, acima de qualquer latência observável.
const MIN_SENTINEL_MS: u64 = i32::MAX as u64;

/// Totais acumulados de uma execução de ping.
///
/// Toda tentativa medida contribui com seu tempo, tendo resposta ou não.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatistics {
    pub sent: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub total_latency_ms: u64,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    pub fn new() -> Self {
        RunStatistics {
            sent: 0,
            succeeded: 0,
            failed: 0,
            min_latency_ms: MIN_SENTINEL_MS,
            max_latency_ms: 0,
            total_latency_ms: 0,
        }
    }

    pub fn record(&mut self, elapsed_ms: u64, succeeded: bool) {
        self.sent += 1;
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        // Mínimo só desce, máximo só sobe
        self.total_latency_ms = self.total_latency_ms.saturating_add(elapsed_ms);
        self.min_latency_ms = self.min_latency_ms.min(elapsed_ms);
        self.max_latency_ms = self.max_latency_ms.max(elapsed_ms);
    }

    /// Tentativa que falhou antes do envio: conta a falha sem tempo medido.
    pub fn record_unsent(&mut self) {
        self.sent += 1;
        self.failed += 1;
    }

    /// Números finais. Sem nada enviado, todos os campos ficam zerados.
    pub fn summarize(&self) -> Summary {
        if self.sent == 0 {
            return Summary::default();
        }
        Summary {
            sent: self.sent,
            succeeded: self.succeeded,
            failed: self.failed,
            loss_percent: self.failed as f64 / self.sent as f64 * 100.0,
            // Sem nenhuma medição o sentinela não aparece no resumo
            min_ms: if self.min_latency_ms == MIN_SENTINEL_MS {
                0
            } else {
                self.min_latency_ms
            },
            max_ms: self.max_latency_ms,
            avg_ms: self.total_latency_ms / self.sent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub sent: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub loss_percent: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: u64,
}

/// Bloco de resumo impresso ao fim da execução.
pub struct Report {
    pub remote: Ipv4Addr,
    pub stats: RunStatistics,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.stats.summarize();
        writeln!(f, "Ping statistics for {}:", self.remote)?;
        writeln!(
            f,
            "    Packets: Sent = {}, Received = {}, Lost = {} ({:.2}% loss),",
            s.sent, s.succeeded, s.failed, s.loss_percent
        )?;
        writeln!(f, "Approximate round trip times in milli-seconds:")?;
        write!(
            f,
            "    Minimum = {}ms, Maximum = {}ms, Average = {}ms",
            s.min_ms, s.max_ms, s.avg_ms
        )
    }
}
