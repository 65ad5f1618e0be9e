// Mensagens de erro
use std::fmt;

// Endereço de origem da resposta
use std::net::Ipv4Addr;

/// Tipo ICMP Echo Request.
pub const ECHO_REQUEST: u8 = 8;

/// Cabeçalho ICMP fixo: type, code, checksum, identifier, sequence.
pub const ICMP_HEADER_LEN: usize = 8;

/// Cabeçalho IPv4 mínimo (sem opções) que precede a resposta no socket RAW.
pub const IPV4_HEADER_LEN: usize = 20;

const TTL_OFFSET: usize = 8;
const SOURCE_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer não comporta um cabeçalho ICMP, não há o que somar.
    BufferTooShort { len: usize },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort { len } => write!(
                f,
                "ICMP buffer of {len} bytes is shorter than the {ICMP_HEADER_LEN}-byte header"
            ),
        }
    }
}

impl std::error::Error for PacketError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    /// Datagrama curto demais para o cabeçalho IPv4 de onde vêm TTL e origem.
    Truncated { len: usize },
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { len } => {
                write!(f, "reply of {len} bytes has no complete IPv4 header")
            }
        }
    }
}

impl std::error::Error for ReplyError {}

/// Calcula o checksum da Internet (RFC 1071).
///
/// Os bytes são somados como palavras de 16 bits big-endian. Um byte ímpar no
/// final entra como está, sem deslocamento para a metade alta.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    // Bytes vizinhos formam uma palavra de 16 bits
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    // Comprimento ímpar: o último byte soma sozinho
    if let Some(&last) = words.remainder().first() {
        sum = sum.wrapping_add(last as u32);
    }
    // Dobra os 16 bits altos sobre os baixos até zerar a parte alta
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Calcula o checksum de `pkt` com o campo zerado e o grava nos bytes 2..4
/// (byte alto primeiro).
pub fn write_checksum(pkt: &mut [u8]) -> Result<u16, PacketError> {
    if pkt.len() < ICMP_HEADER_LEN {
        return Err(PacketError::BufferTooShort { len: pkt.len() });
    }
    pkt[2..4].copy_from_slice(&[0, 0]);
    let csum = checksum(pkt);
    pkt[2..4].copy_from_slice(&csum.to_be_bytes());
    Ok(csum)
}

/// Monta um pacote ICMPv4 Echo Request (type=8, code=0) com payload zerado.
///
/// O número de sequência também serve de identificador.
pub fn build_echo_request(seq: u16, payload_size: usize) -> Result<Vec<u8>, PacketError> {
    let mut pkt = Vec::with_capacity(ICMP_HEADER_LEN + payload_size);

    // Type=8 (Echo Request), Code=0, checksum placeholder (2 bytes)
    pkt.extend_from_slice(&[ECHO_REQUEST, 0, 0, 0]);

    // Identifier e Sequence (big-endian)
    pkt.extend_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(&seq.to_be_bytes());

    // Payload zerado do tamanho pedido
    pkt.resize(ICMP_HEADER_LEN + payload_size, 0);

    // Calcula e escreve o checksum
    write_checksum(&mut pkt)?;
    Ok(pkt)
}

/// Campos lidos de um datagrama IPv4 bruto recebido no socket ICMP.
///
/// Type, identifier e sequence não são conferidos: o que chegar primeiro é
/// tomado como a resposta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub source: Ipv4Addr,
    pub ttl: u8,
    pub payload_len: usize,
}

impl EchoReply {
    pub fn parse(datagram: &[u8]) -> Result<Self, ReplyError> {
        if datagram.len() < IPV4_HEADER_LEN {
            return Err(ReplyError::Truncated {
                len: datagram.len(),
            });
        }
        let src = &datagram[SOURCE_OFFSET..SOURCE_OFFSET + 4];
        Ok(EchoReply {
            source: Ipv4Addr::new(src[0], src[1], src[2], src[3]),
            ttl: datagram[TTL_OFFSET],
            payload_len: datagram
                .len()
                .saturating_sub(IPV4_HEADER_LEN + ICMP_HEADER_LEN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_empty_is_all_ones() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn checksum_of_single_word() {
        assert_eq!(checksum(&[0x00, 0x01]), 0xFFFE);
    }

    #[test]
    fn odd_trailing_byte_is_not_shifted() {
        // 0xFFFF + 0x01 dobra para 0x0001
        assert_eq!(checksum(&[0xFF, 0xFF, 0x01]), 0xFFFE);
        assert_eq!(checksum(&[0x01]), 0xFFFE);
    }

    #[test]
    fn rfc1071_example_sum() {
        // RFC 1071 seção 3: a soma em complemento de um destes bytes é 0xddf2
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), !0xddf2);
    }

    #[test]
    fn embedded_checksum_verifies_to_zero() {
        for size in [0, 1, 31, 32, 1472] {
            let pkt = build_echo_request(7, size).unwrap();
            assert_eq!(checksum(&pkt), 0, "payload size {size}");
        }
    }

    #[test]
    fn echo_request_layout() {
        let pkt = build_echo_request(0x0102, 32).unwrap();
        assert_eq!(pkt.len(), ICMP_HEADER_LEN + 32);
        assert_eq!(&pkt[..2], &[ECHO_REQUEST, 0]);
        assert_eq!(&pkt[4..8], &[0x01, 0x02, 0x01, 0x02]);
        assert!(pkt[ICMP_HEADER_LEN..].iter().all(|&b| b == 0));

        let mut zeroed = pkt.clone();
        zeroed[2] = 0;
        zeroed[3] = 0;
        assert_eq!(u16::from_be_bytes([pkt[2], pkt[3]]), checksum(&zeroed));
    }

    #[test]
    fn first_request_checksum() {
        // só o type 8: soma 0x0800, complemento 0xf7ff
        let pkt = build_echo_request(0, 0).unwrap();
        assert_eq!(pkt, vec![8, 0, 0xf7, 0xff, 0, 0, 0, 0]);
    }

    #[test]
    fn write_checksum_rejects_short_buffers() {
        assert_eq!(
            write_checksum(&mut []),
            Err(PacketError::BufferTooShort { len: 0 })
        );
        assert_eq!(
            write_checksum(&mut [8, 0, 0]),
            Err(PacketError::BufferTooShort { len: 3 })
        );
    }

    #[test]
    fn write_checksum_ignores_stale_checksum_field() {
        let mut pkt = build_echo_request(3, 4).unwrap();
        let expected = u16::from_be_bytes([pkt[2], pkt[3]]);
        pkt[2] = 0xAB;
        pkt[3] = 0xCD;
        assert_eq!(write_checksum(&mut pkt), Ok(expected));
    }

    #[test]
    fn reply_fields_come_from_ip_header() {
        let mut datagram = vec![0u8; 28 + 32];
        datagram[0] = 0x45;
        datagram[8] = 117;
        datagram[12..16].copy_from_slice(&[8, 8, 4, 4]);

        let reply = EchoReply::parse(&datagram).unwrap();
        assert_eq!(reply.source, Ipv4Addr::new(8, 8, 4, 4));
        assert_eq!(reply.ttl, 117);
        assert_eq!(reply.payload_len, 32);
    }

    #[test]
    fn reply_shorter_than_both_headers_has_no_payload() {
        let reply = EchoReply::parse(&[0u8; 24]).unwrap();
        assert_eq!(reply.payload_len, 0);
    }

    #[test]
    fn truncated_reply_is_rejected() {
        assert_eq!(
            EchoReply::parse(&[0u8; 19]),
            Err(ReplyError::Truncated { len: 19 })
        );
    }
}
