use bytes::{Bytes, BytesMut};
use serde_json::json;
use tokio_util::codec::{Decoder, Encoder};

use mc_herd::status::codec::{get_string, get_varint, peek_varint, put_varint, PingFrameCodec, MAX_FRAME_BYTES};
use mc_herd::status::query::{
    flatten_motd, handshake_packet, parse_status_json, read_status_response,
    status_request_packet,
};
use mc_herd::AppError;

fn varint(value: i32) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_varint(&mut buf, value);
    buf.to_vec()
}

#[test]
fn varint_known_encodings() {
    assert_eq!(varint(0), [0x00]);
    assert_eq!(varint(1), [0x01]);
    assert_eq!(varint(127), [0x7f]);
    assert_eq!(varint(128), [0x80, 0x01]);
    assert_eq!(varint(300), [0xac, 0x02]);
    assert_eq!(varint(25565), [0xdd, 0xc7, 0x01]);
    assert_eq!(varint(-1), [0xff, 0xff, 0xff, 0xff, 0x0f]);
}

#[test]
fn varint_decoding_reports_partial_and_overlong_input() {
    assert_eq!(peek_varint(&[0xac, 0x02, 0xff]).expect("ok"), Some((300, 2)));
    assert_eq!(peek_varint(&[0x80]).expect("ok"), None);
    assert!(matches!(
        peek_varint(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
        Err(AppError::Status(_))
    ));

    let mut body = Bytes::from_static(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
    assert_eq!(get_varint(&mut body).expect("ok"), -1);
}

#[test]
fn frame_decoder_waits_for_complete_frame() {
    let mut codec = PingFrameCodec::new();
    let mut buf = BytesMut::from(&[0x03, 0x00, 0x01][..]);
    assert_eq!(codec.decode(&mut buf).expect("ok"), None);

    buf.extend_from_slice(&[0x02, 0x05]);
    let frame = codec.decode(&mut buf).expect("ok").expect("frame");
    assert_eq!(&frame[..], &[0x00, 0x01, 0x02]);
    assert_eq!(&buf[..], &[0x05]);
}

#[test]
fn frame_decoder_rejects_oversized_frames() {
    let mut codec = PingFrameCodec::new();
    let mut buf = BytesMut::new();
    put_varint(&mut buf, i32::try_from(MAX_FRAME_BYTES + 1).expect("fits"));
    assert!(matches!(codec.decode(&mut buf), Err(AppError::Status(_))));
}

#[test]
fn frame_encoder_prefixes_length() {
    let mut codec = PingFrameCodec::new();
    let mut dst = BytesMut::new();
    codec
        .encode(Bytes::from_static(b"abc"), &mut dst)
        .expect("encode");
    assert_eq!(&dst[..], &[0x03, b'a', b'b', b'c']);
}

#[test]
fn handshake_announces_status_state() {
    let packet = handshake_packet("mc.local", 25565);
    let mut expected = vec![0x00, 0xff, 0xff, 0xff, 0xff, 0x0f, 0x08];
    expected.extend_from_slice(b"mc.local");
    expected.extend_from_slice(&25565_u16.to_be_bytes());
    expected.push(0x01);
    assert_eq!(&packet[..], &expected[..]);

    assert_eq!(&status_request_packet()[..], &[0x00]);
}

#[test]
fn status_response_string_is_extracted() {
    let mut body = BytesMut::new();
    put_varint(&mut body, 0x00);
    put_varint(&mut body, 2);
    body.extend_from_slice(b"{}");
    assert_eq!(read_status_response(body.freeze()).expect("ok"), "{}");

    let mut wrong = BytesMut::new();
    put_varint(&mut wrong, 0x01);
    assert!(matches!(read_status_response(wrong.freeze()), Err(AppError::Status(_))));

    let mut truncated = Bytes::from_static(&[0x10, b'x']);
    assert!(get_string(&mut truncated).is_err());
}

#[test]
fn parses_status_document() {
    let doc = json!({
        "version": { "name": "1.20.4", "protocol": 765 },
        "players": {
            "max": 100,
            "online": 2,
            "sample": [ { "name": "alice", "id": "1" }, { "name": "bob", "id": "2" } ]
        },
        "description": { "text": "Hello ", "extra": [ { "text": "§aworld" }, "!" ] }
    });
    let status = parse_status_json(&doc.to_string()).expect("parse");
    assert_eq!(status.version, "1.20.4");
    assert_eq!(status.protocol, 765);
    assert_eq!((status.online, status.max), (2, 100));
    assert_eq!(status.sample, ["alice", "bob"]);
    assert_eq!(status.motd, "Hello world!");
}

#[test]
fn players_and_description_are_optional() {
    let status = parse_status_json(r#"{"version":{"name":"x","protocol":1}}"#).expect("parse");
    assert_eq!(status.online, 0);
    assert!(status.sample.is_empty());
    assert_eq!(status.motd, "");

    assert!(matches!(parse_status_json("{}"), Err(AppError::Status(_))));
}

#[test]
fn motd_accepts_plain_strings() {
    assert_eq!(flatten_motd(&json!("§6Gold §rserver")), "Gold server");
}
