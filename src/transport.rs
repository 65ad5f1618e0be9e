// Criação e configuração de sockets de baixo nível
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

// Erros de I/O e leitura do socket
use std::io::{self, Read};

// Endereços e resolução de nomes
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

// Prazo de cada requisição
use std::time::{Duration, Instant};

/// Um destino ICMP conectado, reutilizado em todas as requisições da execução.
pub trait EchoTransport {
    fn remote_addr(&self) -> Ipv4Addr;

    /// Prazo absoluto que limita o próximo `send` e o `recv` seguinte juntos.
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()>;

    fn send(&mut self, pkt: &[u8]) -> io::Result<usize>;

    /// Lê um único datagrama, com o cabeçalho IPv4 incluído.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: EchoTransport + ?Sized> EchoTransport for &mut T {
    fn remote_addr(&self) -> Ipv4Addr {
        (**self).remote_addr()
    }

    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        (**self).set_deadline(deadline)
    }

    fn send(&mut self, pkt: &[u8]) -> io::Result<usize> {
        (**self).send(pkt)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }
}

/// Socket ICMP RAW (`SOCK_RAW`/`IPPROTO_ICMP`) conectado ao destino.
///
/// Requer root (ou CAP_NET_RAW) no Unix e Administrador no Windows.
/// O socket é fechado quando o valor é descartado.
pub struct RawIcmpSocket {
    sock: Socket,
    remote: Ipv4Addr,
    deadline: Option<Instant>,
}

impl RawIcmpSocket {
    /// Resolve `host` para o primeiro endereço IPv4 e conecta um socket RAW a ele.
    pub fn open(host: &str) -> io::Result<Self> {
        let remote = resolve_ipv4(host)?;

        // Domain::IPV4 -> AF_INET
        // Type::from(3) -> SOCK_RAW (libc::SOCK_RAW pode não existir no Windows)
        // Protocol::ICMPV4 -> IPPROTO_ICMP
        let sock = Socket::new(Domain::IPV4, Type::from(3), Some(Protocol::ICMPV4))?;

        // Porta 0 é ignorada para ICMP
        let dst = SockAddr::from(SocketAddr::new(IpAddr::V4(remote), 0));
        sock.connect(&dst)?;

        Ok(RawIcmpSocket {
            sock,
            remote,
            deadline: None,
        })
    }

    /// Tempo que falta até o prazo atual, ou `None` se não houver prazo.
    fn time_left(&self) -> io::Result<Option<Duration>> {
        match self.deadline {
            Some(deadline) => remaining(deadline, Instant::now()).map(Some),
            None => Ok(None),
        }
    }
}

impl EchoTransport for RawIcmpSocket {
    fn remote_addr(&self) -> Ipv4Addr {
        self.remote
    }

    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        // Só guarda o instante; send/recv recalculam o que sobra
        remaining(deadline, Instant::now())?;
        self.deadline = Some(deadline);
        Ok(())
    }

    fn send(&mut self, pkt: &[u8]) -> io::Result<usize> {
        let left = self.time_left()?;
        self.sock.set_write_timeout(left)?;
        self.sock.send(pkt)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // O tempo gasto no envio já saiu do prazo
        let left = self.time_left()?;
        self.sock.set_read_timeout(left)?;
        self.sock.read(buf)
    }
}

/// Tempo restante até `deadline`. Prazo vencido vira `TimedOut`, pois um
/// timeout zero significa "bloquear para sempre" para o SO.
fn remaining(deadline: Instant, now: Instant) -> io::Result<Duration> {
    let left = deadline.saturating_duration_since(now);
    if left.is_zero() {
        return Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "prazo já expirou",
        ));
    }
    Ok(left)
}

fn resolve_ipv4(host: &str) -> io::Result<Ipv4Addr> {
    // Endereço literal dispensa consulta DNS
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    (host, 0)
        .to_socket_addrs()?
        // Só IPv4: o primeiro endereço encontrado vence
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("nenhum endereço IPv4 para {host}"),
            )
        })
}

/// Timeout de leitura aparece como `WouldBlock` no Unix e `TimedOut` no Windows.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_quad_resolves_without_lookup() {
        assert_eq!(
            resolve_ipv4("192.0.2.7").unwrap(),
            Ipv4Addr::new(192, 0, 2, 7)
        );
    }

    #[test]
    fn ipv6_literal_has_no_ipv4_address() {
        let err = resolve_ipv4("::1").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn remaining_counts_down_to_deadline() {
        let now = Instant::now();
        let deadline = now + Duration::from_millis(300);
        assert_eq!(
            remaining(deadline, now).unwrap(),
            Duration::from_millis(300)
        );
        assert_eq!(
            remaining(deadline, now + Duration::from_millis(250)).unwrap(),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn passed_deadline_times_out() {
        let now = Instant::now();
        for late in [now, now + Duration::from_millis(1)] {
            let err = remaining(now, late).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        }
    }

    #[test]
    fn read_wait_is_bounded_by_the_absolute_deadline() {
        // Socket RAW exige privilégio; sem ele não há o que medir
        let Ok(mut sock) = RawIcmpSocket::open("192.0.2.1") else {
            return;
        };
        let start = Instant::now();
        sock.set_deadline(start + Duration::from_millis(300)).unwrap();

        // Simula um envio lento consumindo quase todo o prazo
        std::thread::sleep(Duration::from_millis(250));

        let mut buf = [0u8; 1500];
        let err = sock.recv(&mut buf).unwrap_err();
        assert!(is_timeout(&err), "{err}");
        assert!(
            start.elapsed() < Duration::from_millis(450),
            "elapsed {:?}",
            start.elapsed()
        );

        // Depois do prazo nem chega a bloquear
        let err = sock.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        let err = sock.send(&[8, 0, 0xf7, 0xff, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn timeout_kinds() {
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::ConnectionRefused)));
    }
}
