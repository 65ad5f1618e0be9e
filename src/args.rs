// Tratamento de erros ergonômico
use anyhow::{Context, Result, bail, ensure};

// Timeout por requisição
use std::time::Duration;

// Configuração da execução
use crate::session::{MAX_PAYLOAD_SIZE, PingConfig};

pub const USAGE: &str = "\
Usage: pingrs [-n count] [-l size] [-w timeout] target_name

Options:
    -n count       Number of echo requests to send.
    -l size        Send buffer size.
    -w timeout     Timeout in milliseconds to wait for each reply.";

pub fn parse() -> Result<PingConfig> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    parse_from(&args)
}

/// Opções vêm antes; o host de destino é sempre o último argumento.
pub fn parse_from(args: &[String]) -> Result<PingConfig> {
    let (host, flags) = args.split_last().context("Missing target host")?;
    ensure!(!host.starts_with('-'), "Missing target host");

    let mut config = PingConfig {
        host: host.clone(),
        ..PingConfig::default()
    };

    // Cada opção consome o valor seguinte
    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i].as_str();
        let value = flags
            .get(i + 1)
            .with_context(|| format!("Missing value for {flag}"))?;
        match flag {
            "-n" => {
                config.count = value.parse().context("Invalid value for -n")?;
            }
            "-l" => {
                let size: usize = value.parse().context("Invalid value for -l")?;
                ensure!(size <= MAX_PAYLOAD_SIZE, "-l must be at most {MAX_PAYLOAD_SIZE}");
                config.payload_size = size;
            }
            "-w" => {
                let ms: u64 = value.parse().context("Invalid value for -w")?;
                config.timeout = Duration::from_millis(ms);
            }
            other => bail!("Unknown option {other}"),
        }
        i += 2;
    }

    Ok(config)
}
