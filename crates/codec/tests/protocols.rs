use tapline_codec::{ACK, PSH, Packet, PayloadDecoder, Protocol};

fn decode(protocol: Protocol, packet: &mut Packet) {
    protocol.decoder().decode(packet);
}

fn packet_with_payload(payload: &[u8]) -> Packet {
    Packet {
        payload: payload.to_vec(),
        payload_len: payload.len(),
        ..Default::default()
    }
}

#[test]
fn test_raw_summary() {
    let mut packet = packet_with_payload(b"anything");
    packet.sequence = Some(1000);
    packet.ack = Some(2000);
    packet.flags = PSH | ACK;
    packet.payload_len = 66;

    decode(Protocol::Raw, &mut packet);
    assert_eq!(packet.content, "Seq:1000 - Ack:2000 - PSH,ACK - PayLen:66");
}

#[test]
fn test_raw_summary_without_transport_numbers() {
    let mut packet = packet_with_payload(b"x");
    packet.payload_len = 9;

    decode(Protocol::Raw, &mut packet);
    assert_eq!(packet.content, "Seq: - Ack: -  - PayLen:9");
}

#[test]
fn test_redis_request_command() {
    let mut packet = packet_with_payload(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    decode(Protocol::Redis, &mut packet);

    assert_eq!(packet.content, "GET foo");
    assert!(!packet.ignore);
}

#[test]
fn test_redis_bulk_string_reply() {
    let mut packet = packet_with_payload(b"$3\r\nbar\r\n");
    decode(Protocol::Redis, &mut packet);

    assert_eq!(packet.content, "bar");
}

#[test]
fn test_redis_simple_types() {
    for (payload, content) in [
        (&b"+OK\r\n"[..], "OK"),
        (&b"-ERR unknown command\r\n"[..], "ERR unknown command"),
        (&b":42\r\n"[..], "42"),
    ] {
        let mut packet = packet_with_payload(payload);
        decode(Protocol::Redis, &mut packet);
        assert_eq!(packet.content, content);
    }
}

#[test]
fn test_redis_replconf_ack_is_ignored() {
    let mut packet = packet_with_payload(b"REPLCONF ACK 12345\r\n");
    decode(Protocol::Redis, &mut packet);

    assert!(packet.ignore);
    assert_eq!(packet.content, "");
}

#[test]
fn test_redis_reparse_is_idempotent() {
    let mut packet = packet_with_payload(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    decode(Protocol::Redis, &mut packet);

    let mut again = packet_with_payload(packet.content.as_bytes());
    decode(Protocol::Redis, &mut again);
    assert_eq!(again.content, packet.content);
}

#[test]
fn test_dns_question() {
    let mut payload = vec![
        0x12, 0x34, // id
        0x01, 0x00, // flags, qr = 0
        0x00, 0x01, // questions
        0x00, 0x00, // answers
        0x00, 0x00, // authority
        0x00, 0x00, // additional
    ];
    payload.extend_from_slice(b"\x03www\x07example\x03com\x00");
    payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A, IN

    let mut packet = packet_with_payload(&payload);
    packet.request = false;
    decode(Protocol::Dns, &mut packet);

    assert!(packet.request, "the qr bit overrides the classifier");
    assert_eq!(packet.content, "[A] www.example.com");
}

#[test]
fn test_dns_unknown_question_type_stays_numeric() {
    let mut payload = vec![
        0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    payload.extend_from_slice(b"\x03foo\x00");
    payload.extend_from_slice(&[0x00, 0x63, 0x00, 0x01]); // type 99

    let mut packet = packet_with_payload(&payload);
    decode(Protocol::Dns, &mut packet);

    assert_eq!(packet.content, "[99] foo");
}

#[test]
fn test_dns_answer_with_a_record() {
    let mut payload = vec![
        0x12, 0x34, // id
        0x81, 0x80, // flags, qr = 1
        0x00, 0x01, // questions
        0x00, 0x01, // answers
        0x00, 0x00, // authority
        0x00, 0x00, // additional
    ];
    payload.extend_from_slice(b"\x03www\x07example\x03com\x00");
    payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // question A, IN
    payload.extend_from_slice(&[0xc0, 0x0c]); // name pointer
    payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A, IN
    payload.extend_from_slice(&[0x00, 0x00, 0x0e, 0x10]); // ttl
    payload.extend_from_slice(&[0x00, 0x04]); // rdlength
    payload.extend_from_slice(&[93, 184, 216, 34]);

    let mut packet = packet_with_payload(&payload);
    decode(Protocol::Dns, &mut packet);

    assert!(!packet.request);
    assert!(packet.content.contains("[A] 93.184.216.34"));
}

#[test]
fn test_dns_truncated_answer_aborts_quietly() {
    let mut payload = vec![
        0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
    ];
    payload.extend_from_slice(b"\x03www\x07example\x03com\x00");
    payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    payload.extend_from_slice(&[0xc0, 0x0c, 0x00, 0x01]); // answer cut short

    let mut packet = packet_with_payload(&payload);
    decode(Protocol::Dns, &mut packet);

    assert!(!packet.request);
    assert_eq!(packet.content, "");
}

#[test]
fn test_dns_short_header_is_skipped() {
    let mut packet = packet_with_payload(b"\x12\x34\x01");
    decode(Protocol::Dns, &mut packet);

    assert_eq!(packet.content, "");
}

#[test]
fn test_http_request() {
    let mut packet =
        packet_with_payload(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n");
    packet.request = false;
    decode(Protocol::Http, &mut packet);

    assert!(packet.request);
    assert_eq!(packet.content, "[HTTP/1.1 GET] example.com/index.html");
}

#[test]
fn test_http_response() {
    let mut packet = packet_with_payload(b"HTTP/1.1 200 OK\r\nServer: nginx\r\n\r\n");
    decode(Protocol::Http, &mut packet);

    assert!(!packet.request);
    assert_eq!(packet.content, "[HTTP/1.1 200] nginx");
}

#[test]
fn test_http_without_markers_keeps_direction() {
    let mut packet = packet_with_payload(b"HTTP/1.1 404 NF\r\nX-Custom: y\r\nbody");
    packet.request = false;
    decode(Protocol::Http, &mut packet);

    assert!(!packet.request);
    assert_eq!(packet.content, "[HTTP/1.1 404] ");
}

#[test]
fn test_memcached_set_without_noreply() {
    let mut packet = packet_with_payload(b"set key 0 0 1\r\n1\r\n");
    decode(Protocol::Memcached, &mut packet);

    assert!(!packet.ignore);
    assert_eq!(packet.content, "set key 0 0 1 1 ");
}

#[test]
fn test_memcached_noreply_is_ignored() {
    let mut packet = packet_with_payload(b"set k 0 0 1 noreply\r\n1\r\n");
    decode(Protocol::Memcached, &mut packet);

    assert!(packet.ignore);
    assert_eq!(packet.content, "");
}

#[test]
fn test_mysql_query_request() {
    let mut payload = vec![9, 0, 0, 0, 0x03];
    payload.extend_from_slice(b"select 1");

    let mut packet = packet_with_payload(&payload);
    decode(Protocol::Mysql, &mut packet);

    assert_eq!(packet.content, "select 1");
}

#[test]
fn test_mysql_binary_statement_request_is_a_stub() {
    let mut payload = vec![3, 0, 0, 0, 0x17];
    payload.extend_from_slice(&[0x01, 0x02]);

    let mut packet = packet_with_payload(&payload);
    decode(Protocol::Mysql, &mut packet);

    assert_eq!(packet.content, "");
}

#[test]
fn test_mysql_response_status_bytes() {
    for (status, content) in [
        (0x00u8, "ok"),
        (0xff, "error"),
        (0xfe, ""),
        (0x01, "not find case"),
    ] {
        let mut packet = packet_with_payload(&[1, 0, 0, 0, status]);
        packet.request = false;
        decode(Protocol::Mysql, &mut packet);

        assert_eq!(packet.content, content, "status {status:#x}");
    }
}

#[test]
fn test_mysql_rejects_malformed_headers() {
    // Too short.
    let mut packet = packet_with_payload(&[1, 0, 0, 0]);
    decode(Protocol::Mysql, &mut packet);
    assert_eq!(packet.content, "");

    // Non-zero sequence id.
    let mut packet = packet_with_payload(&[1, 0, 0, 1, 0x0e]);
    decode(Protocol::Mysql, &mut packet);
    assert_eq!(packet.content, "");

    // Length header does not match the body.
    let mut packet = packet_with_payload(&[9, 0, 0, 0, 0x0e]);
    decode(Protocol::Mysql, &mut packet);
    assert_eq!(packet.content, "");
}
