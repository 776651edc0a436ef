//! Signature normalization and CRC32-based constructor ID derivation.

/// Compute the 32-bit TL constructor ID for a declaration.
///
/// The ID is the CRC32 of [`normalize_signature`] applied to the raw
/// declaration text. `keep_bytes` controls whether `bytes` parameter types
/// survive normalization verbatim; the historical algorithm rewrites them to
/// `string` for most schema origins.
pub fn tl_id(declaration: &str, keep_bytes: bool) -> u32 {
    crc32(&normalize_signature(declaration, keep_bytes))
}

/// Normalize a raw TL declaration into the canonical form the constructor ID
/// is computed over.
///
/// The transformation mirrors Telegram's own: the trailing `;` and any
/// `#hexid` suffix are dropped, `flags.N?true` parameters are stripped
/// entirely, `<`/`>` become spaces, `{`/`}` are removed, `:bytes` /
/// `?bytes` become `:string` / `?string` (unless `keep_bytes`), and
/// whitespace collapses to single spaces.
///
/// ```
/// use tgwire_tl_parser::normalize_signature;
/// assert_eq!(
///     normalize_signature("msgs_ack#62d6b459 msg_ids:Vector<long> = MsgsAck;", false),
///     "msgs_ack msg_ids:Vector long = MsgsAck",
/// );
/// ```
pub fn normalize_signature(declaration: &str, keep_bytes: bool) -> String {
    let cleaned: String = declaration
        .chars()
        .map(|c| if c == '<' || c == '>' { ' ' } else { c })
        .filter(|c| !matches!(c, ';' | '{' | '}'))
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    for token in cleaned.split_whitespace() {
        if is_true_flag_param(token) {
            continue;
        }

        let mut token = token.to_owned();

        // Drop a `#hexid` suffix (but leave bare `#` bitfield tokens alone)
        if let Some(pos) = token.find('#') {
            let tail = &token[pos + 1..];
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_hexdigit()) {
                token.truncate(pos);
            }
        }

        if !keep_bytes {
            if let Some(head) = token.strip_suffix(":bytes") {
                token = format!("{head}:string");
            } else if let Some(head) = token.strip_suffix("?bytes") {
                token = format!("{head}?string");
            }
        }

        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&token);
    }
    out
}

/// `name:flags.N?true` — a flag-gated boolean carried entirely by its bit.
///
/// Only the field literally named `flags` participates; `flags2`-gated
/// booleans stay in the signature, matching the historical ID computation.
fn is_true_flag_param(token: &str) -> bool {
    let Some((name, rest)) = token.split_once(':') else {
        return false;
    };
    let Some(bit) = rest.strip_prefix("flags.") else {
        return false;
    };
    let Some(bit) = bit.strip_suffix("?true") else {
        return false;
    };
    !name.is_empty() && !bit.is_empty() && bit.bytes().all(|b| b.is_ascii_digit())
}

/// Standard CRC-32 (ISO 3309 / ITU-T V.42).
fn crc32(data: &str) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for byte in data.bytes() {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}
