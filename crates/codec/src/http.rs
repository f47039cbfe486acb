//! HTTP/1.x payload summaries.
//!
//! The "Host: " and "Server: " headers double as direction markers: a
//! payload carrying a Host header is a request, one carrying a Server
//! header is a response. The first marker found wins.

use crate::{Packet, PayloadDecoder};

pub struct HttpDecoder;

impl PayloadDecoder for HttpDecoder {
    fn decode(&self, packet: &mut Packet) {
        let text = packet.payload_text().into_owned();
        let lines: Vec<&str> = text.split("\r\n").collect();

        let mut request = packet.request;
        let mut host = "";
        for line in &lines {
            if line.contains("Host: ") {
                let info: Vec<&str> = line.split(' ').collect();
                if info.len() == 2 {
                    request = true;
                    host = info[1];
                    break;
                }
            }
            if line.contains("Server: ") {
                let info: Vec<&str> = line.split(' ').collect();
                if info.len() == 2 {
                    request = false;
                    host = info[1];
                    break;
                }
            }
        }

        let mut kind = String::new();
        let mut path = "";
        if lines.len() > 2 {
            let info: Vec<&str> = lines[0].split(' ').collect();
            if request {
                // "GET /index.html HTTP/1.1" -> "[HTTP/1.1 GET] host/index.html"
                if info.len() >= 3 {
                    kind = format!("[{} {}]", info[2], info[0]);
                    path = info[1];
                }
            } else if info.len() >= 2 {
                // "HTTP/1.1 200 OK" -> "[HTTP/1.1 200] host"
                kind = format!("[{} {}]", info[0], info[1]);
            }
        }

        let content = format!("{kind} {host}{path}");
        packet.request = request;
        packet.content = content;
    }
}
