//! SPL mint account layout parsing and Token-2022 TLV extension parsing
//! (spec.md 4.3 step 3, safety check algorithm; 8 round-trip/boundary tests).
//!
//! The 82-byte fixed mint layout matches `spl_token::state::Mint` exactly;
//! this module parses it manually per spec.md's explicit byte offsets rather
//! than depending on `spl_token::state::Mint::unpack` so the offsets stay
//! directly auditable against the spec text, the way the teacher's
//! `constants.rs` centralizes magic numbers instead of hiding them.

use crate::constants::{
    BLOCKED_EXTENSION_TYPES, MINT_AUTHORITY_OPTION_OFFSET, MINT_DECIMALS_OFFSET,
    MINT_FREEZE_AUTHORITY_OPTION_OFFSET, MINT_INITIALIZED_OFFSET, MINT_LAYOUT_LEN,
    MINT_SUPPLY_OFFSET,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintLayout {
    pub mint_authority_present: bool,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority_present: bool,
}

/// Parse the fixed 82-byte SPL mint account layout (spec.md 4.3 step 3):
/// 4-byte mint-authority option tag @0, 8-byte supply @36, 1-byte decimals
/// @44, 1-byte initialized flag @45, 4-byte freeze-authority option tag @46.
pub fn parse_mint_layout(data: &[u8]) -> Option<MintLayout> {
    if data.len() < MINT_LAYOUT_LEN {
        return None;
    }
    let mint_authority_tag =
        u32::from_le_bytes(data[MINT_AUTHORITY_OPTION_OFFSET..MINT_AUTHORITY_OPTION_OFFSET + 4].try_into().ok()?);
    let supply = u64::from_le_bytes(data[MINT_SUPPLY_OFFSET..MINT_SUPPLY_OFFSET + 8].try_into().ok()?);
    let decimals = data[MINT_DECIMALS_OFFSET];
    let is_initialized = data[MINT_INITIALIZED_OFFSET] != 0;
    let freeze_authority_tag = u32::from_le_bytes(
        data[MINT_FREEZE_AUTHORITY_OPTION_OFFSET..MINT_FREEZE_AUTHORITY_OPTION_OFFSET + 4]
            .try_into()
            .ok()?,
    );

    Some(MintLayout {
        mint_authority_present: mint_authority_tag != 0,
        supply,
        decimals,
        is_initialized,
        freeze_authority_present: freeze_authority_tag != 0,
    })
}

/// Build a synthesized 82-byte mint buffer for tests (spec.md 8's
/// round-trip boundary test) and for constructing safety-check fixtures.
pub fn build_mint_layout_bytes(layout: &MintLayout) -> Vec<u8> {
    let mut buf = vec![0u8; MINT_LAYOUT_LEN];
    buf[MINT_AUTHORITY_OPTION_OFFSET..MINT_AUTHORITY_OPTION_OFFSET + 4]
        .copy_from_slice(&(layout.mint_authority_present as u32).to_le_bytes());
    buf[MINT_SUPPLY_OFFSET..MINT_SUPPLY_OFFSET + 8].copy_from_slice(&layout.supply.to_le_bytes());
    buf[MINT_DECIMALS_OFFSET] = layout.decimals;
    buf[MINT_INITIALIZED_OFFSET] = layout.is_initialized as u8;
    buf[MINT_FREEZE_AUTHORITY_OPTION_OFFSET..MINT_FREEZE_AUTHORITY_OPTION_OFFSET + 4]
        .copy_from_slice(&(layout.freeze_authority_present as u32).to_le_bytes());
    buf
}

/// One parsed Token-2022 extension TLV entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionTlv {
    pub ext_type: u16,
    pub length: u16,
}

/// Parse the TLV suffix after offset 82 (spec.md 4.3 safety-check
/// algorithm): `[u16 type][u16 length][length bytes]...`. A truncated
/// TLV tail returns whatever complete entries were parsed so far (spec.md
/// 8: "malformed TLV (truncated) returns empty list" for the degenerate
/// all-truncated case, and in general never panics on short input).
pub fn parse_extension_tlv(data: &[u8]) -> Vec<ExtensionTlv> {
    let mut out = Vec::new();
    if data.len() <= MINT_LAYOUT_LEN {
        return out;
    }
    let mut cursor = MINT_LAYOUT_LEN;
    loop {
        if cursor + 4 > data.len() {
            break;
        }
        let ext_type = u16::from_le_bytes(data[cursor..cursor + 2].try_into().unwrap());
        let length = u16::from_le_bytes(data[cursor + 2..cursor + 4].try_into().unwrap());
        let value_start = cursor + 4;
        let value_end = value_start + length as usize;
        if value_end > data.len() {
            // truncated value — stop parsing, do not emit a partial entry.
            break;
        }
        out.push(ExtensionTlv { ext_type, length });
        cursor = value_end;
    }
    out
}

pub fn is_blocked_extension(ext_type: u16) -> bool {
    BLOCKED_EXTENSION_TYPES.contains(&ext_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_parses_every_option_combination() {
        for mint_authority_present in [true, false] {
            for freeze_authority_present in [true, false] {
                for supply in [0u64, 1, u64::MAX] {
                    for decimals in [0u8, 9] {
                        for is_initialized in [true, false] {
                            let layout = MintLayout {
                                mint_authority_present,
                                supply,
                                decimals,
                                is_initialized,
                                freeze_authority_present,
                            };
                            let bytes = build_mint_layout_bytes(&layout);
                            let parsed = parse_mint_layout(&bytes).unwrap();
                            assert_eq!(parsed, layout);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn too_short_buffer_returns_none() {
        assert!(parse_mint_layout(&[0u8; 10]).is_none());
    }

    #[test]
    fn well_formed_tlv_returns_exact_types() {
        let mut data = vec![0u8; MINT_LAYOUT_LEN];
        // extension type=1 (blocked), length=2, value=[0xAA, 0xBB]
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[0xAA, 0xBB]);
        // extension type=99 (not blocked), length=0
        data.extend_from_slice(&99u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let parsed = parse_extension_tlv(&data);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].ext_type, 1);
        assert_eq!(parsed[1].ext_type, 99);
        assert!(is_blocked_extension(parsed[0].ext_type));
        assert!(!is_blocked_extension(parsed[1].ext_type));
    }

    #[test]
    fn truncated_tlv_returns_empty_or_partial_not_panicking() {
        let mut data = vec![0u8; MINT_LAYOUT_LEN];
        // declares length=10 but only provides 2 bytes of value.
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&10u16.to_le_bytes());
        data.extend_from_slice(&[0xAA, 0xBB]);

        let parsed = parse_extension_tlv(&data);
        assert!(parsed.is_empty());
    }

    #[test]
    fn no_tlv_suffix_returns_empty() {
        let data = vec![0u8; MINT_LAYOUT_LEN];
        assert!(parse_extension_tlv(&data).is_empty());
    }
}
