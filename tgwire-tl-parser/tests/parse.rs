use tgwire_tl_parser::{parse_tl_file, tl::Category};

#[test]
fn parses_simple_type() {
    let src = "boolFalse#bc799737 = Bool;";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name, "boolFalse");
    assert_eq!(defs[0].id, 0xbc799737);
    assert_eq!(defs[0].ty.name, "Bool");
}

#[test]
fn parses_function_category() {
    let src = "
---functions---
help.getConfig#c4f9186b = Config;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].category, Category::Functions);
    assert_eq!(defs[0].name, "getConfig");
    assert_eq!(defs[0].namespace, vec!["help"]);
}

#[test]
fn parses_flagged_parameter() {
    let src = "user#86675cac flags:# self:flags.10?true id:long first_name:flags.1?string = User;";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].params.len(), 4);
}

#[test]
fn skips_blank_lines_and_comments() {
    let src = "
// this is a comment
boolTrue#997275b5 = Bool;
// another comment

boolFalse#bc799737 = Bool;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 2);
}

#[test]
fn crc32_derived_id() {
    // Omit #id — the parser must derive the canonical value via CRC32
    let src = "boolFalse = Bool;";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs[0].id, 0xbc799737);
    assert_eq!(defs[0].computed_id, 0xbc799737);
}

#[test]
fn computed_id_detects_mismatched_declarations() {
    let src = "boolFalse#12345678 = Bool;";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs[0].id, 0x12345678);
    assert_eq!(defs[0].computed_id, 0xbc799737);
}

#[test]
fn layer_markers_apply_to_following_definitions() {
    let src = "
boolTrue#997275b5 = Bool;
===45===
decryptedMessage#fee4a9d3 flags:# random_id:long message:string = DecryptedMessage;
===73===
decryptedMessage#fee4a9d3 flags:# random_id:long message:string = DecryptedMessage;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs[0].layer, None);
    assert_eq!(defs[1].layer, Some(45));
    assert_eq!(defs[2].layer, Some(73));
}

#[test]
fn directives_attach_to_next_definition() {
    let src = "
//@description Sends a message //@peer Target peer //@message Text to send
messages.sendMessage#7de1d0e4 peer:InputPeer message:string random_id:long = Updates;
error#c4b9f9bb code:int text:string = Error;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs[0].description.as_deref(), Some("Sends a message"));
    assert_eq!(
        defs[0].params[0].description.as_deref(),
        Some("Target peer"),
    );
    assert_eq!(
        defs[0].params[1].description.as_deref(),
        Some("Text to send"),
    );
    // The batch must not leak onto the following declaration
    assert_eq!(defs[1].description, None);
}

#[test]
fn class_directive_batches_are_dropped() {
    let src = "
//@class AuthorizationState //@description Represents the authorization state
authorizationStateReady = AuthorizationState;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs[0].description, None);
}

#[test]
fn old_style_declarations_are_skipped() {
    let src = "
int128 4*[ int ] ?= Int128;
boolTrue#997275b5 = Bool;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name, "boolTrue");
}

#[test]
fn multiline_definitions_accumulate_until_semicolon() {
    let src = "
user#86675cac flags:#
    self:flags.10?true
    id:long
    first_name:flags.1?string = User;
";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].params.len(), 4);
    assert_eq!(defs[0].id, 0x86675cac);
}

#[test]
fn generic_definitions_parse() {
    let src = "invokeWithLayer#da9b0d0d {X:Type} layer:int query:!X = X;";
    let defs: Vec<_> = parse_tl_file(src).collect::<Result<_, _>>().unwrap();
    assert_eq!(defs.len(), 1);
    // `{X:Type}` introducers are dropped from the parameter list
    assert_eq!(defs[0].params.len(), 2);
    assert!(matches!(
        &defs[0].params[1].ty,
        tgwire_tl_parser::tl::ParameterType::Normal { ty, .. } if ty.generic_ref
    ));
}
