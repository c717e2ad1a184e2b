//! Identifier and passcode generation

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// A numeric passcode of `digits` length (clamped to 4..=9), taken from the
/// random tail of a UUIDv7.
pub fn new_otp(digits: u32) -> String {
    let digits = digits.clamp(4, 9);
    let id = uuid7();
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&id.as_bytes()[8..]);

    let code = u64::from_be_bytes(tail) % 10u64.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}
