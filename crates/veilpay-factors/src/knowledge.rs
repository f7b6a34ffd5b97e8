//! Knowledge-factor processors: PIN, colour sequence, emoji sequence,
//! word sequence. All exact-match; normalization is a fixed byte layout.

use veilpay_core::constants::{
    COLOUR_MAX_LEN, COLOUR_MIN_LEN, COLOUR_PALETTE_SIZE, EMOJI_MAX_LEN, EMOJI_MIN_LEN,
    EMOJI_SET_SIZE, PIN_MAX_LEN, PIN_MIN_LEN, WORDS_DICTIONARY_SIZE, WORDS_MAX_LEN, WORDS_MIN_LEN,
};
use veilpay_core::{AuthError, FactorDigest};
use veilpay_crypto::{sha256, wipe};

/// PIN digest: raw UTF-8 digit bytes.
pub fn process_pin(digits: &str) -> Result<FactorDigest, AuthError> {
    let len = digits.chars().count();
    if len < PIN_MIN_LEN || len > PIN_MAX_LEN {
        return Err(AuthError::validation(
            "pin",
            format!("length {len} outside [{PIN_MIN_LEN},{PIN_MAX_LEN}]"),
        ));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::validation("pin", "digits only"));
    }

    let mut buf = digits.as_bytes().to_vec();
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

/// Colour-sequence digest: palette index bytes concatenated in tap order.
pub fn process_colour(indices: &[u8]) -> Result<FactorDigest, AuthError> {
    if indices.len() < COLOUR_MIN_LEN || indices.len() > COLOUR_MAX_LEN {
        return Err(AuthError::validation(
            "colour",
            format!("length {} outside [{COLOUR_MIN_LEN},{COLOUR_MAX_LEN}]", indices.len()),
        ));
    }
    if let Some(bad) = indices.iter().find(|&&i| i >= COLOUR_PALETTE_SIZE) {
        return Err(AuthError::validation("colour", format!("index {bad} outside palette")));
    }
    if has_duplicates_u8(indices) {
        return Err(AuthError::validation("colour", "duplicate palette index"));
    }

    let mut buf = indices.to_vec();
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

/// Emoji-sequence digest: picker index bytes concatenated in order.
pub fn process_emoji(indices: &[u8]) -> Result<FactorDigest, AuthError> {
    if indices.len() < EMOJI_MIN_LEN || indices.len() > EMOJI_MAX_LEN {
        return Err(AuthError::validation(
            "emoji",
            format!("length {} outside [{EMOJI_MIN_LEN},{EMOJI_MAX_LEN}]", indices.len()),
        ));
    }
    if let Some(bad) = indices.iter().find(|&&i| u16::from(i) >= EMOJI_SET_SIZE) {
        return Err(AuthError::validation("emoji", format!("index {bad} outside emoji set")));
    }
    if has_duplicates_u8(indices) {
        return Err(AuthError::validation("emoji", "indices must be distinct"));
    }

    let mut buf = indices.to_vec();
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

/// Word-sequence digest: 2-byte LE dictionary index per word, in order.
pub fn process_words(indices: &[u16]) -> Result<FactorDigest, AuthError> {
    if indices.len() < WORDS_MIN_LEN || indices.len() > WORDS_MAX_LEN {
        return Err(AuthError::validation(
            "words",
            format!("length {} outside [{WORDS_MIN_LEN},{WORDS_MAX_LEN}]", indices.len()),
        ));
    }
    if let Some(bad) = indices.iter().find(|&&i| i >= WORDS_DICTIONARY_SIZE) {
        return Err(AuthError::validation("words", format!("index {bad} outside dictionary")));
    }
    let mut seen = std::collections::BTreeSet::new();
    if !indices.iter().all(|i| seen.insert(*i)) {
        return Err(AuthError::validation("words", "indices must be distinct"));
    }

    let mut buf = Vec::with_capacity(indices.len() * 2);
    for i in indices {
        buf.extend_from_slice(&i.to_le_bytes());
    }
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

fn has_duplicates_u8(indices: &[u8]) -> bool {
    let mut seen = [false; 256];
    for &i in indices {
        if seen[i as usize] {
            return true;
        }
        seen[i as usize] = true;
    }
    false
}
