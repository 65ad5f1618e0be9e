// Tratamento de erros ergonômico
use anyhow::{Context, Result};

// Saída padrão
use std::io::{self, Write};

// Flag de interrupção (Ctrl+C)
use std::sync::atomic::Ordering;

// Módulos locais
mod args;
mod icmp;
mod session;
mod stats;
mod transport;

/// Programa principal: envia Echo Requests, imprime cada resposta e o resumo.
/// Requer root/CAP_NET_RAW no Unix ou Administrador no Windows (Raw Sockets).
fn main() -> Result<()> {
    // Log desligado por padrão; RUST_LOG=debug mostra cada tentativa
    env_logger::init();

    // Uso inválido imprime a ajuda e sai com status 0
    let config = match args::parse() {
        Ok(config) => config,
        Err(e) => {
            log::debug!("bad command line: {e:#}");
            println!("{}", args::USAGE);
            return Ok(());
        }
    };

    // Ctrl+C para após a requisição em curso e ainda imprime as estatísticas
    let running = session::running_flag();
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Host não encontrado é fatal: só a mensagem, sem estatísticas
    let mut stdout = io::stdout().lock();
    match session::ping(&config, &running, &mut stdout) {
        Ok(report) => writeln!(stdout, "\n{report}")?,
        Err(e) => {
            log::debug!("{e:?}");
            writeln!(stdout, "{e}")?;
        }
    }

    Ok(())
}
