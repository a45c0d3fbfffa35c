//! UDP server implementation for DNS

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::Builder;

use derive_more::{Display, Error, From};

use crate::dns::context::{ServerContext, ServerHandle};
use crate::dns::protocol::{DnsPacket, ResultCode};
use crate::dns::response::ResponseBuilder;

#[derive(Debug, Display, From, Error)]
pub enum ServerError {
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ServerError>;

macro_rules! return_or_report {
    ( $x:expr, $message:expr ) => {
        match $x {
            Ok(res) => res,
            Err(_) => {
                log::info!($message);
                return;
            }
        }
    };
}

macro_rules! ignore_or_report {
    ( $x:expr, $message:expr ) => {
        match $x {
            Ok(_) => {}
            Err(_) => {
                log::info!($message);
                return;
            }
        };
    };
}

/// Common trait for DNS servers
pub trait DnsServer {
    /// Initialize the server and start listening
    ///
    /// This method should _NOT_ block. Rather, servers are expected to spawn
    /// threads to handle requests and return immediately.
    fn run_server(self) -> Result<()>;
}

/// Run one lookup pipeline for a decoded request against a context snapshot.
///
/// This function always returns a packet, even when the lookup failed, since
/// we still want to send something back to the client.
pub fn execute_query(context: Arc<ServerContext>, request: &DnsPacket) -> DnsPacket {
    let builder = ResponseBuilder::new(context.policy);

    let question = match request.questions.first() {
        Some(question) => question,
        None => {
            let mut packet = builder.build(request, Vec::new());
            packet.header.rescode = ResultCode::FORMERR;
            return packet;
        }
    };

    match context.store.lookup(&question.name, question.qtype) {
        Ok(answers) => {
            log::info!("{} answered with {} records", question, answers.len());
            builder.build(request, answers)
        }
        Err(err) => {
            log::warn!("Failed to resolve {}: {}", question, err);
            let mut packet = builder.build(request, Vec::new());
            packet.header.rescode = ResultCode::SERVFAIL;
            packet
        }
    }
}

/// The UDP server
///
/// Accepts DNS queries through UDP, and uses the current `ServerContext`
/// snapshot to service each request. Packets are read on a single thread,
/// and a pool of worker threads runs the decode already done for them
/// through lookup, response building and encoding.
pub struct DnsUdpServer {
    handle: Arc<ServerHandle>,
    request_queue: Arc<Mutex<VecDeque<(SocketAddr, DnsPacket)>>>,
    request_cond: Arc<Condvar>,
    thread_count: usize,
}

impl DnsUdpServer {
    pub fn new(handle: Arc<ServerHandle>, thread_count: usize) -> DnsUdpServer {
        DnsUdpServer {
            handle,
            request_queue: Arc::new(Mutex::new(VecDeque::new())),
            request_cond: Arc::new(Condvar::new()),
            thread_count,
        }
    }

    /// Service a single request and send the response
    fn process_request(
        socket: &UdpSocket,
        context: Arc<ServerContext>,
        src: SocketAddr,
        request: &DnsPacket,
    ) {
        let packet = execute_query(context, request);

        let data = return_or_report!(packet.to_datagram(), "Failed to encode response packet");
        ignore_or_report!(socket.send_to(&data, src), "Failed to send response packet");
    }
}

impl DnsServer for DnsUdpServer {
    fn run_server(self) -> Result<()> {
        let context = self.handle.current();
        let socket = UdpSocket::bind((context.host.as_str(), context.port))?;

        log::info!("Listening on {}:{}", context.host, context.port);

        // spawn the worker threads draining the request queue
        for thread_id in 0..self.thread_count {
            let socket_clone = match socket.try_clone() {
                Ok(x) => x,
                Err(e) => {
                    log::info!("Failed to clone socket when starting UDP server: {:?}", e);
                    continue;
                }
            };

            let handle = self.handle.clone();
            let request_cond = self.request_cond.clone();
            let request_queue = self.request_queue.clone();

            let name = format!("DnsUdpServer-request-{}", thread_id);
            let _ = Builder::new().name(name).spawn(move || {
                loop {
                    // wait until a request lands in the queue
                    let (src, request) = match request_queue
                        .lock()
                        .ok()
                        .and_then(|x| request_cond.wait(x).ok())
                        .and_then(|mut x| x.pop_front())
                    {
                        Some(x) => x,
                        None => {
                            log::info!("Not expected to happen!");
                            continue;
                        }
                    };

                    // each request pins one immutable context snapshot
                    let context = handle.current();
                    DnsUdpServer::process_request(&socket_clone, context, src, &request);
                }
            })?;
        }

        // the receive loop decodes datagrams and enqueues them
        let request_queue = self.request_queue;
        let request_cond = self.request_cond;
        let _ = Builder::new()
            .name("DnsUdpServer-incoming".into())
            .spawn(move || {
                let mut buf = [0u8; 512];
                loop {
                    let (len, src) = match socket.recv_from(&mut buf) {
                        Ok(x) => x,
                        Err(e) => {
                            log::info!("Failed to read from UDP socket: {:?}", e);
                            continue;
                        }
                    };

                    // malformed packets are dropped without a response
                    let request = match DnsPacket::from_datagram(&buf[..len]) {
                        Ok(packet) => packet,
                        Err(e) => {
                            log::info!("Dropping packet from {}: {}", src, e);
                            continue;
                        }
                    };

                    match request_queue.lock() {
                        Ok(mut queue) => {
                            queue.push_back((src, request));
                            request_cond.notify_one();
                        }
                        Err(e) => {
                            log::info!("Failed to send UDP request for processing: {}", e);
                        }
                    }
                }
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::{DnsQuestion, QueryType};
    use crate::dns::response::NegativeAnswerPolicy;
    use crate::dns::store::{MemoryStore, RecordStore};
    use crate::dns::zone::{Zone, ZoneRecord};
    use std::path::PathBuf;

    fn test_context(zones: Vec<Zone>) -> Arc<ServerContext> {
        let store = MemoryStore::new();
        store.bulk_import(zones).unwrap();

        Arc::new(ServerContext {
            store: Box::new(store),
            policy: NegativeAnswerPolicy::NoError,
            host: "127.0.0.1".to_string(),
            port: 0,
        })
    }

    fn www_zone() -> Zone {
        let mut zone = Zone::new(
            "example.com".to_string(),
            "master".to_string(),
            PathBuf::from("example.com.zone"),
        );
        zone.add_record(ZoneRecord {
            owner: "www.example.com".to_string(),
            class: "IN".to_string(),
            rtype: "A".to_string(),
            rdata: "10.0.0.1".to_string(),
        });
        zone
    }

    fn query(name: &str, qtype: QueryType) -> DnsPacket {
        let mut packet = DnsPacket::new();
        packet.header.id = 99;
        packet.header.questions = 1;
        packet
            .questions
            .push(DnsQuestion::new(name.to_string(), qtype));
        packet
    }

    #[test]
    fn test_execute_query_answers() {
        let context = test_context(vec![www_zone()]);
        let response = execute_query(context, &query("www.example.com", QueryType::A));

        assert_eq!(response.header.id, 99);
        assert!(response.header.response);
        assert_eq!(response.header.rescode, ResultCode::NOERROR);
        assert_eq!(response.answers.len(), 1);
    }

    #[test]
    fn test_execute_query_empty_result() {
        let context = test_context(vec![www_zone()]);
        let response = execute_query(context, &query("gone.example.com", QueryType::A));

        assert_eq!(response.header.rescode, ResultCode::NOERROR);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn test_execute_query_servfail_on_bad_rdata() {
        let mut zone = www_zone();
        zone.records[0].rdata = "not-an-ip".to_string();
        let context = test_context(vec![zone]);

        let response = execute_query(context, &query("www.example.com", QueryType::A));
        assert_eq!(response.header.rescode, ResultCode::SERVFAIL);
    }
}
