use std::fmt::Write as _;

use relex_regex::{Enc, EncType};

pub fn prt_hex(out: &mut String, cu: u32, sz_code_unit: u32) {
    match sz_code_unit {
        1 => write!(out, "0x{:02X}", cu).unwrap(),
        2 => write!(out, "0x{:04X}", cu).unwrap(),
        _ => write!(out, "0x{:08X}", cu).unwrap(),
    }
}

/// Prints a code unit as a C character literal when that reads well (plain
/// printable ASCII), as hex otherwise. EBCDIC units never print as chars:
/// the unit value is not the glyph.
pub fn prt_ch_or_hex(out: &mut String, cu: u32, enc: &Enc) {
    let printable = (0x20..0x7F).contains(&cu);
    if printable && !enc.is(EncType::Ebcdic) {
        match char::from_u32(cu) {
            Some('\'') => out.push_str("'\\''"),
            Some('\\') => out.push_str("'\\\\'"),
            Some(c) => write!(out, "'{}'", c).unwrap(),
            None => prt_hex(out, cu, enc.sz_code_unit()),
        }
    } else {
        prt_hex(out, cu, enc.sz_code_unit());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_width_follows_unit_size() {
        let mut s = String::new();
        prt_hex(&mut s, 0xA, 1);
        assert_eq!(s, "0x0A");
        s.clear();
        prt_hex(&mut s, 0xA, 2);
        assert_eq!(s, "0x000A");
        s.clear();
        prt_hex(&mut s, 0x10FFFF, 4);
        assert_eq!(s, "0x0010FFFF");
    }

    #[test]
    fn printable_ascii_prints_as_char() {
        let enc = Enc::default();
        let mut s = String::new();
        prt_ch_or_hex(&mut s, 'a' as u32, &enc);
        assert_eq!(s, "'a'");
        s.clear();
        prt_ch_or_hex(&mut s, '\'' as u32, &enc);
        assert_eq!(s, "'\\''");
        s.clear();
        prt_ch_or_hex(&mut s, 0x0A, &enc);
        assert_eq!(s, "0x0A");
    }

    #[test]
    fn ebcdic_always_prints_hex() {
        let mut enc = Enc::default();
        assert!(enc.set(EncType::Ebcdic));
        let mut s = String::new();
        prt_ch_or_hex(&mut s, 0x81, &enc); // 'a' in EBCDIC
        assert_eq!(s, "0x81");
    }
}
