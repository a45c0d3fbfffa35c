//! Builds response packets from resolved answers

use crate::dns::protocol::{DnsPacket, DnsRecord, ResultCode};
use crate::dns::resolver::{Answer, RecordData};

/// What to answer when a lookup matched nothing.
///
/// The baseline keeps NOERROR with an empty answer section; NXDOMAIN is an
/// opt-in policy for deployments that want proper negative signaling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NegativeAnswerPolicy {
    NoError,
    NxDomain,
}

impl Default for NegativeAnswerPolicy {
    fn default() -> Self {
        NegativeAnswerPolicy::NoError
    }
}

impl NegativeAnswerPolicy {
    pub fn from_name(name: &str) -> Option<NegativeAnswerPolicy> {
        match name.to_ascii_lowercase().as_str() {
            "noerror" => Some(NegativeAnswerPolicy::NoError),
            "nxdomain" => Some(NegativeAnswerPolicy::NxDomain),
            _ => None,
        }
    }
}

/// Projects a query and its resolved answers into a response packet
#[derive(Copy, Clone, Debug, Default)]
pub struct ResponseBuilder {
    policy: NegativeAnswerPolicy,
}

impl ResponseBuilder {
    pub fn new(policy: NegativeAnswerPolicy) -> ResponseBuilder {
        ResponseBuilder { policy }
    }

    /// Build the response for `query`.
    ///
    /// The question section is echoed verbatim and every resource record is
    /// owned by the query name, carrying the zone's minimum ttl. Counts for
    /// the authority and additional sections are always zero.
    pub fn build(&self, query: &DnsPacket, answers: Vec<Answer>) -> DnsPacket {
        let mut packet = DnsPacket::new();

        packet.header.id = query.header.id;
        packet.header.response = true;
        packet.header.rescode = self.rescode(query, &answers);
        packet.header.questions = query.questions.len() as u16;
        packet.header.answers = answers.len() as u16;

        let name = match query.questions.first() {
            Some(question) => {
                packet.questions.push(question.clone());
                question.name.clone()
            }
            None => String::new(),
        };

        for answer in answers {
            packet.answers.push(Self::to_record(&name, answer));
        }

        packet
    }

    fn rescode(&self, query: &DnsPacket, answers: &[Answer]) -> ResultCode {
        // an unsupported question type was flagged at decode time
        if query.header.rescode == ResultCode::NXDOMAIN {
            return ResultCode::NXDOMAIN;
        }

        if answers.is_empty() {
            match self.policy {
                NegativeAnswerPolicy::NoError => ResultCode::NOERROR,
                NegativeAnswerPolicy::NxDomain => ResultCode::NXDOMAIN,
            }
        } else {
            ResultCode::NOERROR
        }
    }

    fn to_record(name: &str, answer: Answer) -> DnsRecord {
        let domain = name.to_string();
        let ttl = answer.ttl;

        match answer.data {
            RecordData::A { address } => DnsRecord::A {
                domain,
                addr: address,
                ttl,
            },
            RecordData::Ns { server } => DnsRecord::Ns {
                domain,
                host: server,
                ttl,
            },
            RecordData::Cname { cname } => DnsRecord::Cname {
                domain,
                host: cname,
                ttl,
            },
            RecordData::Txt { text } => DnsRecord::Txt {
                domain,
                data: text,
                ttl,
            },
            RecordData::Mx {
                preference,
                exchange,
            } => DnsRecord::Mx {
                domain,
                priority: preference,
                host: exchange,
                ttl,
            },
            RecordData::Soa {
                nameserver,
                hostemail,
                serial,
                refresh,
                retry,
                expire,
                minttl,
            } => DnsRecord::Soa {
                domain,
                m_name: nameserver,
                r_name: hostemail,
                serial,
                refresh,
                retry,
                expire,
                minimum: minttl,
                ttl,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::{DnsQuestion, QueryType};
    use std::net::Ipv4Addr;

    fn query(name: &str, qtype: QueryType) -> DnsPacket {
        let mut packet = DnsPacket::new();
        packet.header.id = 0xABCD;
        packet.header.recursion_desired = true;
        packet.header.questions = 1;
        packet
            .questions
            .push(DnsQuestion::new(name.to_string(), qtype));
        packet
    }

    fn a_answer(ttl: u32, a: u8) -> Answer {
        Answer {
            ttl,
            data: RecordData::A {
                address: Ipv4Addr::new(10, 0, 0, a),
            },
        }
    }

    #[test]
    fn test_build_sets_header_fields() {
        let builder = ResponseBuilder::default();
        let response = builder.build(
            &query("www.example.com", QueryType::A),
            vec![a_answer(3600, 1), a_answer(3600, 2)],
        );

        assert_eq!(response.header.id, 0xABCD);
        assert!(response.header.response);
        assert_eq!(response.header.opcode, 0);
        assert!(!response.header.authoritative_answer);
        assert!(!response.header.truncated_message);
        assert!(!response.header.recursion_desired);
        assert!(!response.header.recursion_available);
        assert_eq!(response.header.z, 0);
        assert_eq!(response.header.rescode, ResultCode::NOERROR);
        assert_eq!(response.header.questions, 1);
        assert_eq!(response.header.answers, 2);
        assert_eq!(response.header.authoritative_entries, 0);
        assert_eq!(response.header.resource_entries, 0);
    }

    #[test]
    fn test_build_echoes_question_and_owns_answers() {
        let builder = ResponseBuilder::default();
        let response = builder.build(
            &query("www.example.com", QueryType::A),
            vec![a_answer(1234, 1)],
        );

        assert_eq!(response.questions[0].name, "www.example.com");
        assert_eq!(
            response.answers[0],
            DnsRecord::A {
                domain: "www.example.com".to_string(),
                addr: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 1234,
            }
        );
    }

    #[test]
    fn test_empty_answer_is_noerror_by_default() {
        let builder = ResponseBuilder::default();
        let response = builder.build(&query("www.example.com", QueryType::A), Vec::new());

        assert_eq!(response.header.rescode, ResultCode::NOERROR);
        assert_eq!(response.header.answers, 0);
    }

    #[test]
    fn test_empty_answer_with_nxdomain_policy() {
        let builder = ResponseBuilder::new(NegativeAnswerPolicy::NxDomain);
        let response = builder.build(&query("www.example.com", QueryType::A), Vec::new());

        assert_eq!(response.header.rescode, ResultCode::NXDOMAIN);
    }

    #[test]
    fn test_unsupported_type_rcode_propagates() {
        let mut q = query("www.example.com", QueryType::Unknown(28));
        q.header.rescode = ResultCode::NXDOMAIN;

        let builder = ResponseBuilder::default();
        let response = builder.build(&q, Vec::new());

        assert_eq!(response.header.rescode, ResultCode::NXDOMAIN);
        assert_eq!(response.header.answers, 0);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(
            NegativeAnswerPolicy::from_name("NXDOMAIN"),
            Some(NegativeAnswerPolicy::NxDomain)
        );
        assert_eq!(
            NegativeAnswerPolicy::from_name("noerror"),
            Some(NegativeAnswerPolicy::NoError)
        );
        assert_eq!(NegativeAnswerPolicy::from_name("bogus"), None);
    }
}
