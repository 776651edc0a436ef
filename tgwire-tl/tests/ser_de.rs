use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use tgwire_tl::callbacks::{
    ready, DecodeHook, HookFuture, HookProvider, OutgoingLookup, PendingCall, SerializeHook,
};
use tgwire_tl::{Cursor, Error, Origin, Param, Record, Schema, Tl, Value};

// ── Fixture schema ────────────────────────────────────────────────────────────
//
// Every declared id below is the CRC32 of the declaration's normalized
// signature; `id_matches_signature_crc` asserts this for the whole fixture.

const MTPROTO_TL: &str = "
vector#1cb5c415 {t:Type} # [ t ] = Vector t;
int ? = Int;

rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult;
rpc_error#2144ca19 error_code:int error_message:string = RpcError;
ping#7abe77ec ping_id:long = Pong;
pong#347773c5 msg_id:long ping_id:long = Pong;
msgs_ack#62d6b459 msg_ids:Vector<long> = MsgsAck;
gzip_packed#3072cfa1 packed_data:bytes = Object;
future_salt#0949d9dc valid_since:int valid_until:int salt:long = FutureSalt;
new_session_created#9ec20908 first_msg_id:long unique_id:long server_salt:long = NewSession;
http_wait#9299359f max_delay:int wait_after:int max_wait:int = HttpWait;
resPQ#05162463 nonce:int128 server_nonce:int128 pq:bytes server_public_key_fingerprints:Vector<long> = ResPQ;
";

const API_TL: &str = "
boolFalse#bc799737 = Bool;
boolTrue#997275b5 = Bool;
error#c4b9f9bb code:int text:string = Error;
inputPeerEmpty#7f3b18ea = InputPeer;
inputPeerSelf#7da07ec9 = InputPeer;
inputPeerUser#dde8a54c user_id:long access_hash:long = InputPeer;
inputUserEmpty#b98886cf = InputUser;
peerUser#59511722 user_id:long = Peer;
userEmpty#d3bc4b7a id:long = User;
user#86675cac flags:# self:flags.10?true id:long first_name:flags.1?string = User;
userStatusEmpty#09d05049 = UserStatus;
dataJSON#7d748d04 data:string = DataJSON;
jsonNull#3f6d7b68 = JSONValue;
jsonBool#c7345e6a value:Bool = JSONValue;
jsonNumber#2be0dfa4 value:double = JSONValue;
jsonString#b71e767a value:string = JSONValue;
jsonArray#f7444763 value:Vector<JSONValue> = JSONValue;
jsonObject#99c1d49d value:Vector<JSONObjectValue> = JSONValue;
jsonObjectValue#c0de1bd9 key:string value:JSONValue = JSONObjectValue;
photoStrippedSize#e0b0bc2e type:string bytes:bytes = PhotoSize;
messageEntityMentionName#dc7b1140 offset:int length:int user_id:long = MessageEntity;
inputMessageEntityMentionName#208e68c9 offset:int length:int user_id:InputUser = MessageEntity;
keyboardButton#a2fa4880 text:string = KeyboardButton;
keyboardButtonRow#77608b83 buttons:Vector<KeyboardButton> = KeyboardButtonRow;
replyKeyboardMarkup#85dd99d1 flags:# rows:Vector<KeyboardButtonRow> placeholder:flags.3?string = ReplyMarkup;
message#65376a46 flags:# id:int peer_id:Peer message:string reply_markup:flags.6?ReplyMarkup entities:flags.7?Vector<MessageEntity> = Message;
inputEncryptedChat#f141b5e1 chat_id:int access_hash:long = InputEncryptedChat;
inputFile#f52ff27f id:long parts:int name:string md5_checksum:string = InputFile;

---functions---

help.getConfig#c4f9186b = Config;
users.getUsers#0d91a548 id:Vector<InputUser> = Vector<User>;
messages.sendMessage#7de1d0e4 peer:InputPeer message:string random_id:long = Updates;
messages.getAllStickers#b8a0a1a8 hash:long = messages.AllStickers;
messages.sendEncrypted#44fa7a15 flags:# peer:InputEncryptedChat random_id:long data:bytes = messages.SentEncryptedMessage;
account.getNotifySettings#12b3ad31 peer:InputNotifyPeer = PeerNotifySettings;
";

const SECRET_TL: &str = "
===8===
decryptedMessage#1f814f1f random_id:long random_bytes:bytes message:string media:DecryptedMessageMedia = DecryptedMessage;
decryptedMessageMediaEmpty#089f5c4a = DecryptedMessageMedia;
";

fn fixture() -> Tl {
    let mut schema = Schema::new();
    schema.add_tl(MTPROTO_TL, Origin::Mtproto).unwrap();
    schema.add_tl(API_TL, Origin::Api).unwrap();
    schema.add_tl(SECRET_TL, Origin::Secret).unwrap();
    Tl::new(schema)
}

fn decode(tl: &Tl, bytes: &[u8], ty: &str) -> Value {
    let mut cur = Cursor::from_slice(bytes);
    let (value, hooks) = tl.deserialize(&mut cur, &Param::of_type(ty)).unwrap();
    assert!(hooks.is_empty(), "unexpected deferred hooks");
    assert_eq!(cur.remaining(), 0, "trailing bytes after decode");
    value
}

// ── Spec scenarios: literal bytes ────────────────────────────────────────────

#[tokio::test]
async fn int_one_is_four_le_bytes() {
    let tl = fixture();
    let bytes = tl.serialize(&Param::of_type("int"), Value::Int(1), -1).await.unwrap();
    assert_eq!(bytes, [0x01, 0x00, 0x00, 0x00]);
}

#[tokio::test]
async fn string_abc_framing() {
    let tl = fixture();
    let bytes = tl.serialize(&Param::of_type("string"), "abc".into(), -1).await.unwrap();
    assert_eq!(bytes, [0x03, 0x61, 0x62, 0x63]);
}

#[tokio::test]
async fn fourteen_bytes_get_one_pad_byte() {
    let tl = fixture();
    let bytes = tl
        .serialize(&Param::of_type("bytes"), Value::Bytes(vec![0xAA; 14]), -1)
        .await
        .unwrap();
    let mut expected = vec![0x0E];
    expected.extend([0xAA; 14]);
    expected.push(0x00);
    assert_eq!(bytes, expected);
}

#[test]
fn boxed_vector_of_ints_decodes() {
    let tl = fixture();
    let bytes = [
        0x15, 0xC4, 0xB5, 0x1C, // vector#1cb5c415
        0x03, 0x00, 0x00, 0x00, // count
        0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
    ];
    let value = decode(&tl, &bytes, "Vector<int>");
    assert_eq!(value, Value::Vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
}

#[tokio::test]
async fn input_peer_user_roundtrip() {
    let tl = fixture();
    let peer = Record::new("inputPeerUser")
        .field("user_id", 12345i64)
        .field("access_hash", Value::Bytes(0x0102030405060708i64.to_le_bytes().to_vec()));

    let bytes = tl.serialize(&Param::of_type("InputPeer"), peer.into(), -1).await.unwrap();
    assert_eq!(&bytes[..4], &0xdde8a54cu32.to_le_bytes());

    // Raw 8-byte longs on input come back as host integers
    let expected = Record::new("inputPeerUser")
        .field("user_id", 12345i64)
        .field("access_hash", 0x0102030405060708i64);
    assert_eq!(decode(&tl, &bytes, "InputPeer"), Value::Record(expected));
}

// ── Boxed/bare discipline ────────────────────────────────────────────────────

#[tokio::test]
async fn bare_requested_omits_constructor_id() {
    let tl = fixture();
    let peer = Record::new("inputPeerUser")
        .field("user_id", 1i64)
        .field("access_hash", 2i64);

    let boxed = tl.serialize(&Param::of_type("InputPeer"), peer.clone().into(), -1).await.unwrap();
    let bare = tl.serialize(&Param::of_type("%InputPeer"), peer.into(), -1).await.unwrap();
    assert_eq!(boxed.len(), bare.len() + 4);
    assert_eq!(&boxed[4..], &bare[..]);
}

#[tokio::test]
async fn predicate_as_target_type_is_bare() {
    let tl = fixture();
    let salt = Record::new("future_salt")
        .field("valid_since", 10)
        .field("valid_until", 20)
        .field("salt", 42i64);
    let bytes = tl.serialize(&Param::of_type("future_salt"), salt.into(), -1).await.unwrap();
    assert_eq!(bytes.len(), 4 + 4 + 8);

    let value = decode(&tl, &bytes, "future_salt");
    let record = value.as_record().unwrap();
    assert_eq!(record.get("salt"), Some(&Value::Long(42)));
}

#[tokio::test]
async fn untagged_record_adopts_representative() {
    let tl = fixture();
    let salt = Record::untagged()
        .field("valid_since", 1)
        .field("valid_until", 2)
        .field("salt", 3i64);
    // %FutureSalt forces bare encoding of the type's sole constructor
    let bytes = tl.serialize(&Param::of_type("%FutureSalt"), salt.into(), -1).await.unwrap();
    assert_eq!(bytes.len(), 16);
}

// ── Flags ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn flag_word_is_or_of_present_optionals() {
    let tl = fixture();
    let user = Record::new("user")
        .field("self", true)
        .field("id", 7i64)
        .field("first_name", "Ada");
    let bytes = tl.serialize(&Param::of_type("User"), user.into(), -1).await.unwrap();

    let flags = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(flags, (1 << 10) | (1 << 1));

    let value = decode(&tl, &bytes, "User");
    let record = value.as_record().unwrap();
    assert_eq!(record.predicate(), "user");
    assert_eq!(record.get("self"), Some(&Value::Bool(true)));
    assert_eq!(record.get("first_name"), Some(&Value::Str("Ada".into())));
    // Bitfields are stripped from decoded values
    assert!(!record.contains("flags"));
}

#[tokio::test]
async fn clear_bits_skip_fields_and_decode_false() {
    let tl = fixture();
    let user = Record::new("user").field("id", 7i64);
    let bytes = tl.serialize(&Param::of_type("User"), user.into(), -1).await.unwrap();

    // id prefix + zero flags + id long
    assert_eq!(bytes.len(), 4 + 4 + 8);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);

    let value = decode(&tl, &bytes, "User");
    let record = value.as_record().unwrap();
    assert_eq!(record.get("self"), Some(&Value::Bool(false)));
    assert!(!record.contains("first_name"));
}

// ── Schema invariants ────────────────────────────────────────────────────────

#[test]
fn id_matches_signature_crc() {
    for src in [MTPROTO_TL, API_TL, SECRET_TL] {
        for def in tgwire_tl_parser::parse_tl_file(src) {
            let Ok(def) = def else { continue };
            assert_eq!(
                def.id, def.computed_id,
                "declared id of {} disagrees with its signature",
                def.full_name(),
            );
        }
    }
}

#[test]
fn secret_layer_is_max_seen() {
    let tl = fixture();
    assert_eq!(tl.schema().secret_layer(), 8);
}

// ── Discovery mode ───────────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_resolves_constructors_by_id() {
    let tl = fixture();
    let err = Record::new("error").field("code", 400).field("text", "BAD_REQUEST");
    let bytes = tl.serialize(&Param::of_type("Error"), err.into(), -1).await.unwrap();

    let value = decode(&tl, &bytes, "");
    assert_eq!(value.as_record().unwrap().predicate(), "error");
}

#[test]
fn discovery_rejects_unknown_ids() {
    let tl = fixture();
    let mut cur = Cursor::from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let err = match tl.deserialize(&mut cur, &Param::of_type("")) {
        Ok(_) => panic!("expected deserialize to fail"),
        Err(e) => e,
    };
    assert_eq!(err, Error::UnknownConstructor(0xEFBEADDE));
}

#[tokio::test]
async fn discovery_synthesizes_method_predicates() {
    let tl = fixture();
    let args = Record::untagged().field("hash", 5i64);
    let bytes = tl.serialize_method("messages.getAllStickers", args.into(), -1).await.unwrap();

    let value = decode(&tl, &bytes, "");
    let record = value.as_record().unwrap();
    assert_eq!(record.predicate(), "method_messages.getAllStickers");
    assert_eq!(record.get("hash"), Some(&Value::Long(5)));
}

// ── gzip envelopes ───────────────────────────────────────────────────────────

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn frame_gzip_packed(payload: &[u8]) -> Vec<u8> {
    let mut bytes = 0x3072cfa1u32.to_le_bytes().to_vec();
    let compressed = gzip(payload);
    // TL string framing of the compressed payload
    assert!(compressed.len() <= 253);
    bytes.push(compressed.len() as u8);
    bytes.extend_from_slice(&compressed);
    let pad = (4 - (1 + compressed.len()) % 4) % 4;
    bytes.extend(std::iter::repeat(0).take(pad));
    bytes
}

#[tokio::test]
async fn gzip_envelope_around_composite() {
    let tl = fixture();
    let err = Record::new("error").field("code", 420).field("text", "FLOOD_WAIT_3");
    let inner = tl.serialize(&Param::of_type("Error"), err.clone().into(), -1).await.unwrap();

    let value = decode(&tl, &frame_gzip_packed(&inner), "Error");
    assert_eq!(value, Value::Record(err));
}

#[tokio::test]
async fn gzip_envelope_around_vector() {
    let tl = fixture();
    let inner = tl
        .serialize(
            &Param::of_type("Vector<int>"),
            Value::Vector(vec![Value::Int(4), Value::Int(5)]),
            -1,
        )
        .await
        .unwrap();

    let value = decode(&tl, &frame_gzip_packed(&inner), "Vector<int>");
    assert_eq!(value, Value::Vector(vec![Value::Int(4), Value::Int(5)]));
}

// ── rpc_result return-type recovery ──────────────────────────────────────────

struct PendingTable(HashMap<i64, PendingCall>);

impl OutgoingLookup for PendingTable {
    fn find(&self, msg_id: i64) -> Option<PendingCall> {
        self.0.get(&msg_id).cloned()
    }
}

#[tokio::test]
async fn rpc_result_recovers_vector_subtype() {
    let tl = fixture();

    // users.getUsers → Vector<User>, so the result must decode element-wise
    let users = vec![
        Value::Record(Record::new("userEmpty").field("id", 9i64)),
    ];
    let result_bytes = tl
        .serialize(&Param::of_type("Vector<User>"), Value::Vector(users.clone()), -1)
        .await
        .unwrap();

    let req_msg_id = 0x1122334455667788i64;
    let mut wire = 0xf35c6d01u32.to_le_bytes().to_vec();
    wire.extend(req_msg_id.to_le_bytes());
    wire.extend(&result_bytes);

    let table = PendingTable(HashMap::from([(
        req_msg_id,
        PendingCall { msg_id: req_msg_id, name: "users.getUsers".into(), ty: "Vector<User>".into() },
    )]));

    let mut cur = Cursor::from_slice(&wire);
    let (value, hooks) = tl.deserialize_with(&mut cur, &Param::of_type(""), &table).unwrap();
    assert!(hooks.is_empty());

    let record = value.as_record().unwrap();
    assert_eq!(record.predicate(), "rpc_result");
    // req_msg_id stays a raw 8-byte id
    assert_eq!(
        record.get("req_msg_id"),
        Some(&Value::Bytes(req_msg_id.to_le_bytes().to_vec())),
    );
    assert_eq!(record.get("result"), Some(&Value::Vector(users)));
}

// ── Raw-long and forced-string field rules ───────────────────────────────────

#[tokio::test]
async fn service_longs_stay_raw() {
    let tl = fixture();
    let pong = Record::new("pong")
        .field("msg_id", Value::Bytes(vec![1, 2, 3, 4, 5, 6, 7, 8]))
        .field("ping_id", Value::Bytes(vec![8, 7, 6, 5, 4, 3, 2, 1]));
    let bytes = tl.serialize(&Param::of_type("Pong"), pong.clone().into(), -1).await.unwrap();

    // Raw ids survive the round trip bit-for-bit
    assert_eq!(decode(&tl, &bytes, "Pong"), Value::Record(pong));
}

// ── dataJSON and JSONValue ───────────────────────────────────────────────────

#[tokio::test]
async fn data_json_wraps_and_parses() {
    let tl = fixture();
    let json: serde_json::Value = serde_json::json!({"emojies_send_dice": ["🎲"]});

    let bytes = tl
        .serialize(&Param::of_type("DataJSON"), Value::Json(json.clone()), -1)
        .await
        .unwrap();
    assert_eq!(&bytes[..4], &0x7d748d04u32.to_le_bytes());

    assert_eq!(decode(&tl, &bytes, "DataJSON"), Value::Json(json));
}

#[tokio::test]
async fn json_value_tree_decodes_idiomatically() {
    let tl = fixture();
    let wire = Record::new("jsonObject").field(
        "value",
        Value::Vector(vec![
            Value::Record(
                Record::new("jsonObjectValue")
                    .field("key", "limit")
                    .field("value", Record::new("jsonNumber").field("value", 10.0)),
            ),
            Value::Record(
                Record::new("jsonObjectValue")
                    .field("key", "premium")
                    .field("value", Record::new("jsonBool").field("value", true)),
            ),
        ]),
    );
    let bytes = tl.serialize(&Param::of_type("JSONValue"), wire.into(), -1).await.unwrap();

    let value = decode(&tl, &bytes, "JSONValue");
    assert_eq!(value, Value::Json(serde_json::json!({"limit": 10.0, "premium": true})));
}

// ── photoStrippedSize inflation ──────────────────────────────────────────────

#[tokio::test]
async fn stripped_size_gains_inflated_jpeg() {
    let tl = fixture();
    let size = Record::new("photoStrippedSize")
        .field("type", "i")
        .field("bytes", Value::Bytes(vec![1, 40, 32, 0xAB]));
    let bytes = tl.serialize(&Param::of_type("PhotoSize"), size.into(), -1).await.unwrap();

    let value = decode(&tl, &bytes, "PhotoSize");
    let record = value.as_record().unwrap();
    let Some(Value::Bytes(jpeg)) = record.get("inflated") else {
        panic!("missing inflated field");
    };
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(jpeg[164], 40);
    assert_eq!(jpeg[166], 32);
    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
}

// ── Reply-markup button wrapping ─────────────────────────────────────────────

#[tokio::test]
async fn message_buttons_are_wrapped() {
    let tl = fixture();
    let msg = Record::new("message")
        .field("id", 1)
        .field("peer_id", Record::new("peerUser").field("user_id", 3i64))
        .field("message", "pick one")
        .field(
            "reply_markup",
            Record::new("replyKeyboardMarkup").field(
                "rows",
                Value::Vector(vec![Value::Record(Record::new("keyboardButtonRow").field(
                    "buttons",
                    Value::Vector(vec![Value::Record(
                        Record::new("keyboardButton").field("text", "Go"),
                    )]),
                ))]),
            ),
        );
    let bytes = tl.serialize(&Param::of_type("Message"), msg.into(), -1).await.unwrap();

    let value = decode(&tl, &bytes, "Message");
    let record = value.as_record().unwrap();
    let markup = record.get("reply_markup").unwrap().as_record().unwrap();
    let Some(Value::Vector(rows)) = markup.get("rows") else { panic!("rows missing") };
    let row = rows[0].as_record().unwrap();
    let Some(Value::Vector(buttons)) = row.get("buttons") else { panic!("buttons missing") };

    let wrapped = buttons[0].as_record().unwrap();
    assert_eq!(wrapped.predicate(), "button");
    let inner = wrapped.get("button").unwrap().as_record().unwrap();
    assert_eq!(inner.predicate(), "keyboardButton");
    assert_eq!(inner.get("text"), Some(&Value::Str("Go".into())));
}

// ── Default synthesis ────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_random_id_and_peer_are_synthesized() {
    let tl = fixture();
    let args = Record::untagged().field("message", "hi");
    let bytes = tl.serialize_method("messages.sendMessage", args.into(), -1).await.unwrap();

    // method id + inputPeerEmpty + "hi" string + random 8-byte id
    assert_eq!(bytes.len(), 4 + 4 + 4 + 8);
    assert_eq!(&bytes[..4], &0x7de1d0e4u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &0x7f3b18eau32.to_le_bytes());
    assert_eq!(&bytes[8..12], [0x02, b'h', b'i', 0x00]);
}

#[tokio::test]
async fn missing_hash_is_zeroed() {
    let tl = fixture();
    let bytes = tl
        .serialize_method("messages.getAllStickers", Value::Null, -1)
        .await
        .unwrap();
    assert_eq!(&bytes[4..], &[0u8; 8]);
}

#[tokio::test]
async fn missing_required_param_fails() {
    let tl = fixture();
    let err = tl
        .serialize_method("account.getNotifySettings", Value::Null, -1)
        .await
        .unwrap_err();
    assert_eq!(err, Error::MissingParam("peer".into()));
}

#[tokio::test]
async fn random_bytes_default_meets_entropy_floor() {
    let tl = fixture();
    let msg = Record::new("decryptedMessage")
        .field("random_id", 5i64)
        .field("message", "psst")
        .field("media", Record::new("decryptedMessageMediaEmpty"));
    let bytes = tl
        .serialize(&Param::of_type("DecryptedMessage"), msg.into(), 8)
        .await
        .unwrap();

    // Round-trip: padding is validated (≥ 15 bytes) then discarded
    let value = decode(&tl, &bytes, "DecryptedMessage");
    let record = value.as_record().unwrap();
    assert!(!record.contains("random_bytes"));
    assert_eq!(record.get("message"), Some(&Value::Str("psst".into())));
}

#[test]
fn short_random_bytes_are_rejected() {
    let tl = fixture();
    let mut wire = 0x1f814f1fu32.to_le_bytes().to_vec();
    wire.extend(5i64.to_le_bytes()); // random_id
    wire.extend([0x04, 1, 2, 3, 4, 0, 0, 0]); // 4-byte random_bytes, padded

    let mut cur = Cursor::from_slice(&wire);
    let err = match tl.deserialize(&mut cur, &Param::of_type("DecryptedMessage")) {
        Ok(_) => panic!("expected deserialize to fail"),
        Err(e) => e,
    };
    assert_eq!(err, Error::InsecureRandom);
}

// ── Collaborators ────────────────────────────────────────────────────────────

#[tokio::test]
async fn collaborators_fill_secret_chat_arguments() {
    let mut tl = fixture();
    let mut collaborators = tgwire_tl::Collaborators::default();
    collaborators.encrypted_chat = Some(Arc::new(|req| {
        assert_eq!(req.param, "peer");
        ready(Value::Record(
            Record::new("inputEncryptedChat").field("chat_id", 99).field("access_hash", 7i64),
        ))
    }));
    collaborators.encrypt = Some(Arc::new(|req| {
        assert_eq!(req.method, "messages.sendEncrypted");
        ready(Value::Bytes(vec![0xEE; 16]))
    }));
    tl.set_collaborators(collaborators);

    let bytes = tl.serialize_method("messages.sendEncrypted", Value::Null, -1).await.unwrap();

    let value = decode(&tl, &bytes, "");
    let record = value.as_record().unwrap();
    assert_eq!(record.predicate(), "method_messages.sendEncrypted");
    let peer = record.get("peer").unwrap().as_record().unwrap();
    assert_eq!(peer.get("chat_id"), Some(&Value::Int(99)));
    assert_eq!(record.get("data"), Some(&Value::Bytes(vec![0xEE; 16])));
}

// ── Hooks ────────────────────────────────────────────────────────────────────

struct CoerceUserIds;

impl HookProvider for CoerceUserIds {
    fn type_mismatch(&self) -> Vec<(String, SerializeHook)> {
        vec![(
            "InputPeer".into(),
            Arc::new(|value: Value| match value {
                Value::Long(user_id) => ready(Value::Record(
                    Record::new("inputPeerUser")
                        .field("user_id", user_id)
                        .field("access_hash", 0i64),
                )),
                other => ready(other),
            }) as SerializeHook,
        )]
    }

    fn constructor(&self) -> Vec<(String, DecodeHook)> {
        vec![(
            "error".into(),
            Arc::new(|value: &mut Value| -> Option<HookFuture> {
                if let Value::Record(r) = value {
                    r.set("seen", true);
                }
                let deferred: HookFuture = Box::pin(std::future::ready(Ok(())));
                Some(deferred)
            }) as DecodeHook,
        )]
    }
}

#[tokio::test]
async fn type_mismatch_hook_coerces_bare_ids() {
    let mut tl = fixture();
    tl.update_callbacks(&[&CoerceUserIds]);

    let bytes = tl
        .serialize(&Param::of_type("InputPeer"), Value::Long(12345), -1)
        .await
        .unwrap();
    let value = decode(&tl, &bytes, "InputPeer");
    let record = value.as_record().unwrap();
    assert_eq!(record.predicate(), "inputPeerUser");
    assert_eq!(record.get("user_id"), Some(&Value::Long(12345)));
}

#[tokio::test]
async fn constructor_hooks_mutate_and_defer() {
    let mut tl = fixture();
    tl.update_callbacks(&[&CoerceUserIds]);

    let err = Record::new("error").field("code", 500).field("text", "INTERNAL");
    let bytes = tl.serialize(&Param::of_type("Error"), err.into(), -1).await.unwrap();

    let mut cur = Cursor::from_slice(&bytes);
    let (value, hooks) = tl.deserialize(&mut cur, &Param::of_type("Error")).unwrap();
    assert_eq!(value.as_record().unwrap().get("seen"), Some(&Value::Bool(true)));

    // The deferred half runs after the parse, under the caller's control
    assert_eq!(hooks.len(), 1);
    for hook in hooks {
        hook.await.unwrap();
    }
}

// ── Mention-entity rewrite ───────────────────────────────────────────────────

#[tokio::test]
async fn mention_entities_serialize_as_input_form() {
    let tl = fixture();
    let entity = Record::new("messageEntityMentionName")
        .field("offset", 0)
        .field("length", 3)
        .field("user_id", Record::new("inputUserEmpty"));
    let bytes = tl.serialize(&Param::of_type("MessageEntity"), entity.into(), -1).await.unwrap();
    assert_eq!(&bytes[..4], &0x208e68c9u32.to_le_bytes());
}

// ── get_length ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_length_spans_one_value() {
    let tl = fixture();
    let err = Record::new("error").field("code", 1).field("text", "X");
    let mut bytes = tl.serialize(&Param::of_type("Error"), err.into(), -1).await.unwrap();
    let len = bytes.len();

    bytes.extend_from_slice(&[0xFF; 7]); // trailing garbage must not be touched
    assert_eq!(tl.get_length(&bytes, &Param::of_type("Error")).unwrap(), len);
}

// ── Pathological streams ─────────────────────────────────────────────────────

#[test]
fn oversized_vector_count_is_rejected() {
    let tl = fixture();
    let mut wire = 0x1cb5c415u32.to_le_bytes().to_vec();
    wire.extend(u32::MAX.to_le_bytes());

    let mut cur = Cursor::from_slice(&wire);
    let err = match tl.deserialize(&mut cur, &Param::of_type("Vector<int>")) {
        Ok(_) => panic!("expected deserialize to fail"),
        Err(e) => e,
    };
    assert_eq!(err, Error::UnexpectedEof);
}

#[test]
fn vector_with_wrong_constructor_is_rejected() {
    let tl = fixture();
    let mut wire = 0xbc799737u32.to_le_bytes().to_vec();
    wire.extend(0u32.to_le_bytes());

    let mut cur = Cursor::from_slice(&wire);
    let err = match tl.deserialize(&mut cur, &Param::of_type("Vector<int>")) {
        Ok(_) => panic!("expected deserialize to fail"),
        Err(e) => e,
    };
    assert_eq!(err, Error::InvalidVectorConstructor(0xbc799737));
}
