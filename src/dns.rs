//! DNS message parsing and synthetic answer construction.

const HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;

/// A parsed DNS query.
///
/// `question` holds the question section exactly as received so a
/// synthetic answer can embed it unmodified.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    pub id: u16,
    pub domain: String,
    question: Vec<u8>,
}

impl DnsQuery {
    /// Parse a DNS query from raw bytes.
    ///
    /// Returns `None` for responses, compressed or oversized labels,
    /// truncated packets, and empty names; the caller forwards such
    /// payloads untouched instead of evaluating them.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN + 1 {
            return None;
        }

        let id = u16::from_be_bytes([data[0], data[1]]);

        // QR bit set means this is a response, not a query
        let flags = u16::from_be_bytes([data[2], data[3]]);
        if flags & 0x8000 != 0 {
            return None;
        }

        // Parse domain name
        let mut pos = HEADER_LEN;
        let mut domain_parts = Vec::new();

        while pos < data.len() {
            let label_len = data[pos] as usize;
            if label_len == 0 {
                pos += 1;
                break;
            }
            if label_len > MAX_LABEL_LEN {
                // Compression pointer or garbage; neither belongs in a question name
                return None;
            }
            pos += 1;
            if pos + label_len > data.len() {
                return None;
            }
            let label = std::str::from_utf8(&data[pos..pos + label_len]).ok()?;
            domain_parts.push(label.to_string());
            pos += label_len;
        }

        if domain_parts.is_empty() {
            return None;
        }

        // QTYPE + QCLASS close the question section
        if pos + 4 > data.len() {
            return None;
        }
        pos += 4;

        Some(Self {
            id,
            domain: domain_parts.join(".").to_lowercase(),
            question: data[HEADER_LEN..pos].to_vec(),
        })
    }

    /// Encode a blocked response: the original question byte for byte,
    /// one A record answering it with 0.0.0.0.
    pub fn blocked_response(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.question.len() + 16);

        // Header
        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&[0x81, 0x80]); // standard response, recursion available
        data.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        data.extend_from_slice(&[0x00, 0x01]); // ANCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

        // Question section, unmodified
        data.extend_from_slice(&self.question);

        // Answer
        data.extend_from_slice(&[0xC0, 0x0C]); // pointer to the name at offset 12
        data.extend_from_slice(&[0x00, 0x01]); // type A
        data.extend_from_slice(&[0x00, 0x01]); // class IN
        data.extend_from_slice(&300u32.to_be_bytes()); // TTL
        data.extend_from_slice(&[0x00, 0x04]); // RDLENGTH
        data.extend_from_slice(&[0, 0, 0, 0]); // 0.0.0.0

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_query(domain: &str, qtype: u16) -> Vec<u8> {
        let mut packet = vec![0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        for label in domain.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0);
        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x01]);
        packet
    }

    #[test]
    fn parse_extracts_domain() {
        let query = DnsQuery::parse(&build_query("ads.example.com", 1)).unwrap();
        assert_eq!(query.id, 0x1234);
        assert_eq!(query.domain, "ads.example.com");
    }

    #[test]
    fn parse_lowercases_domain() {
        let query = DnsQuery::parse(&build_query("AdS.Tracker.NET", 1)).unwrap();
        assert_eq!(query.domain, "ads.tracker.net");
    }

    #[test]
    fn parse_rejects_responses() {
        let mut packet = build_query("example.com", 1);
        packet[2] |= 0x80; // QR bit
        assert!(DnsQuery::parse(&packet).is_none());
    }

    #[test]
    fn parse_rejects_compressed_names() {
        let mut packet = vec![0x00, 0x01, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        packet.extend_from_slice(&[0xC0, 0x0C]); // pointer instead of labels
        packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        assert!(DnsQuery::parse(&packet).is_none());
    }

    #[test]
    fn parse_rejects_oversized_labels() {
        let mut packet = vec![0x00, 0x01, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        packet.push(64);
        packet.extend_from_slice(&[b'a'; 64]);
        packet.push(0);
        packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        assert!(DnsQuery::parse(&packet).is_none());
    }

    #[test]
    fn parse_rejects_truncated_packets() {
        let packet = build_query("example.com", 1);
        assert!(DnsQuery::parse(&packet[..packet.len() - 3]).is_none());
        assert!(DnsQuery::parse(&packet[..14]).is_none());
        assert!(DnsQuery::parse(&[0u8; 12]).is_none());
    }

    #[test]
    fn parse_rejects_empty_name() {
        let mut packet = vec![0x00, 0x01, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        packet.push(0); // root name
        packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        assert!(DnsQuery::parse(&packet).is_none());
    }

    #[test]
    fn blocked_response_layout() {
        let query = DnsQuery::parse(&build_query("ads.example.com", 1)).unwrap();
        let response = query.blocked_response();

        // name (domain + length bytes + terminator) + QTYPE + QCLASS
        let question_len = "ads.example.com".len() + 2 + 4;
        assert_eq!(response.len(), HEADER_LEN + question_len + 16);
        assert_eq!(&response[..2], &[0x12, 0x34]);
        assert_eq!(&response[2..4], &[0x81, 0x80]);
        assert_eq!(&response[4..12], &[0, 1, 0, 1, 0, 0, 0, 0]);

        let answer = &response[HEADER_LEN + question_len..];
        assert_eq!(&answer[..2], &[0xC0, 0x0C]);
        assert_eq!(&answer[2..4], &[0x00, 0x01]); // type A
        assert_eq!(&answer[4..6], &[0x00, 0x01]); // class IN
        let ttl = u32::from_be_bytes([answer[6], answer[7], answer[8], answer[9]]);
        assert_eq!(ttl, 300);
        assert_eq!(&answer[10..12], &[0x00, 0x04]);
        assert_eq!(&answer[12..], &[0, 0, 0, 0]);
    }

    #[test]
    fn blocked_response_preserves_question_bytes() {
        let packet = build_query("AdBlock.Example.COM", 28);
        let query = DnsQuery::parse(&packet).unwrap();
        let response = query.blocked_response();

        let question = &packet[HEADER_LEN..];
        assert_eq!(&response[HEADER_LEN..HEADER_LEN + question.len()], question);

        // the answer stays an A record even for an AAAA question
        let rtype_at = HEADER_LEN + question.len() + 2;
        assert_eq!(&response[rtype_at..rtype_at + 2], &[0x00, 0x01]);
    }
}
