use std::fmt::{self, Display};

use crate::range::{Range, RangeSet};

mod ebcdic;
mod utf16;
mod utf8;

pub const SURR_MIN: u32 = 0xD800;
pub const SURR_MAX: u32 = 0xDFFF;
/// U+FFFD REPLACEMENT CHARACTER, substituted in Unicode encodings.
pub const UNICODE_ERROR: u32 = 0xFFFD;
/// ASCII SUB, substituted in byte encodings.
pub const ASCII_ERROR: u32 = 0x1A;

const UNICODE_MAX: u32 = 0x10FFFF;

/// Each encoding fixes two concepts: the *code point*, an abstract symbol
/// number, and the *code unit*, the smallest addressable unit of the encoded
/// text. Fixed-length encodings use one unit per point; UTF-16 and UTF-8 use
/// a variable number.
///
/// encoding | code points | code units | unit size | point size
/// ---------|-------------|------------|-----------|------------
/// ASCII    | 0x100       | 0x100      | 1         | 1, fixed
/// EBCDIC   | 0x100       | 0x100      | 1         | 1, fixed
/// UCS-2    | 0x10000     | 0x10000    | 2         | 2, fixed
/// UTF-16   | 0x110000    | 0x10000    | 2         | 2-4, variable
/// UTF-32   | 0x110000    | 0x110000   | 4         | 4, fixed
/// UTF-8    | 0x110000    | 0x100      | 1         | 1-4, variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncType {
    Ascii,
    Ebcdic,
    Ucs2,
    Utf16,
    Utf32,
    Utf8,
}

/// What to do with code points the encoding cannot represent (surrogates in
/// the Unicode encodings, 0x100 and above in the byte encodings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Fail,
    Substitute,
    Ignore,
}

/// A code-point range that the configured encoding rejects under
/// `Policy::Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCodePoint {
    pub lo: u32,
    pub hi: u32,
}

impl Display for InvalidCodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "invalid code point {:#x}", self.lo)
        } else {
            write!(f, "invalid code point range {:#x}-{:#x}", self.lo, self.hi)
        }
    }
}

impl std::error::Error for InvalidCodePoint {}

#[derive(Debug, Clone, Copy)]
pub struct Enc {
    ty: EncType,
    policy: Policy,
}

impl Default for Enc {
    fn default() -> Self {
        Enc {
            ty: EncType::Ascii,
            policy: Policy::Ignore,
        }
    }
}

impl Enc {
    pub fn n_code_points(&self) -> u32 {
        match self.ty {
            EncType::Ascii | EncType::Ebcdic => 0x100,
            EncType::Ucs2 => 0x1_0000,
            EncType::Utf16 | EncType::Utf32 | EncType::Utf8 => 0x11_0000,
        }
    }

    pub fn n_code_units(&self) -> u32 {
        match self.ty {
            EncType::Ascii | EncType::Ebcdic | EncType::Utf8 => 0x100,
            EncType::Ucs2 | EncType::Utf16 => 0x1_0000,
            EncType::Utf32 => 0x11_0000,
        }
    }

    pub fn sz_code_unit(&self) -> u32 {
        match self.ty {
            EncType::Ascii | EncType::Ebcdic | EncType::Utf8 => 1,
            EncType::Ucs2 | EncType::Utf16 => 2,
            EncType::Utf32 => 4,
        }
    }

    /// Maximal code-point size in bytes.
    pub fn sz_code_point_max(&self) -> u32 {
        match self.ty {
            EncType::Ascii | EncType::Ebcdic => 1,
            EncType::Ucs2 => 2,
            EncType::Utf16 | EncType::Utf32 | EncType::Utf8 => 4,
        }
    }

    pub fn ty(&self) -> EncType {
        self.ty
    }

    pub fn is(&self, ty: EncType) -> bool {
        self.ty == ty
    }

    /// The encoding is immutable once selected: switching is only allowed
    /// while it still holds the ASCII default.
    pub fn set(&mut self, ty: EncType) -> bool {
        if self.ty == ty {
            true
        } else if self.ty != EncType::Ascii {
            false
        } else {
            self.ty = ty;
            true
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    fn error_code_point(&self) -> u32 {
        match self.ty {
            EncType::Ascii | EncType::Ebcdic => ASCII_ERROR,
            _ => UNICODE_ERROR,
        }
    }

    fn is_valid(&self, cp: u32) -> bool {
        match self.ty {
            EncType::Ascii | EncType::Ebcdic => cp < 0x100,
            EncType::Ucs2 => cp < 0x1_0000 && !(SURR_MIN..=SURR_MAX).contains(&cp),
            EncType::Utf16 | EncType::Utf32 | EncType::Utf8 => {
                cp <= UNICODE_MAX && !(SURR_MIN..=SURR_MAX).contains(&cp)
            }
        }
    }

    /// Normalizes a single code point into the encoding. Returns false when
    /// the point is dropped (invalid under `Fail` or `Ignore`); under
    /// `Substitute` the point is replaced and the call succeeds.
    pub fn encode(&self, cp: &mut u32) -> bool {
        if !self.is_valid(*cp) {
            match self.policy {
                Policy::Fail | Policy::Ignore => return false,
                Policy::Substitute => *cp = self.error_code_point(),
            }
        }
        if self.ty == EncType::Ebcdic {
            *cp = ebcdic::ASC2EBC[*cp as usize] as u32;
        }
        true
    }

    /// Inverse of `encode` for 1-to-1 encodings; meaningless for UTF-8 and
    /// UTF-16 lead/trail units.
    pub fn decode_unsafe(&self, cu: u32) -> u32 {
        if self.ty == EncType::Ebcdic {
            ebcdic::EBC2ASC[cu as usize] as u32
        } else {
            cu
        }
    }

    /// Range covering the entire code-unit alphabet.
    pub fn full_range(&self) -> Range {
        Range::new(0, self.n_code_units())
    }

    /// Expands the closed code-point range `[lo, hi]` into a disjoint union
    /// of code-unit sequences: each element is a concatenation of unit
    /// ranges (one element long for fixed single-unit expansions, up to four
    /// for UTF-8). Invalid sub-ranges are resolved by the policy.
    pub fn encode_range(&self, lo: u32, hi: u32) -> Result<Vec<Vec<Range>>, InvalidCodePoint> {
        debug_assert!(lo <= hi);
        let mut out = Vec::new();
        let max = self.n_code_points() - 1;

        let invalid = |out: &mut Vec<Vec<Range>>, bad_lo: u32, bad_hi: u32| {
            match self.policy {
                Policy::Fail => {
                    return Err(InvalidCodePoint {
                        lo: bad_lo,
                        hi: bad_hi,
                    })
                }
                Policy::Substitute => {
                    let cp = self.error_code_point();
                    self.encode_valid(cp, cp, out);
                }
                Policy::Ignore => {}
            }
            Ok(())
        };

        if lo > max {
            invalid(&mut out, lo, hi)?;
            return Ok(out);
        }
        let orig_hi = hi;
        let (hi, over) = if hi > max { (max, true) } else { (hi, false) };

        // the surrogate gap splits Unicode ranges in up to three parts
        let gap = self.ty != EncType::Ascii && self.ty != EncType::Ebcdic;
        if gap && lo <= SURR_MAX && hi >= SURR_MIN {
            if lo < SURR_MIN {
                self.encode_valid(lo, SURR_MIN - 1, &mut out);
            }
            invalid(&mut out, lo.max(SURR_MIN), hi.min(SURR_MAX))?;
            if hi > SURR_MAX {
                self.encode_valid(SURR_MAX + 1, hi, &mut out);
            }
        } else {
            self.encode_valid(lo, hi, &mut out);
        }
        if over {
            invalid(&mut out, max + 1, orig_hi)?;
        }
        Ok(out)
    }

    // Expansion of a range already known to be representable.
    fn encode_valid(&self, lo: u32, hi: u32, out: &mut Vec<Vec<Range>>) {
        match self.ty {
            EncType::Ascii | EncType::Ucs2 | EncType::Utf32 => {
                out.push(vec![Range::new(lo, hi + 1)]);
            }
            EncType::Ebcdic => {
                let mut units = RangeSet::new();
                for cp in lo..=hi {
                    let cu = ebcdic::ASC2EBC[cp as usize] as u32;
                    units.add(cu, cu + 1);
                }
                for r in units.ranges() {
                    out.push(vec![*r]);
                }
            }
            EncType::Utf16 => utf16::encode_range(lo, hi, out),
            EncType::Utf8 => utf8::encode_range(lo, hi, out),
        }
    }
}
