//! Tax map key formatting

/// Format a 13-digit parcel number as a hyphenated TMK.
///
/// `ZSPpppLLLCCCC` becomes `Z-S-P-ppp-LLL`, plus `-CCCC` when the
/// condominium (CPR) number is nonzero. Numeric groups lose leading zeros.
/// Anything that is not exactly 13 ASCII digits is returned unchanged.
pub fn format_tmk(parcel_number: &str) -> String {
    let bytes = parcel_number.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return parcel_number.to_string();
    }

    let digit = |i: usize| u32::from(bytes[i] - b'0');
    let group = |range: std::ops::Range<usize>| {
        bytes[range]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    };

    let zone = digit(0);
    let section = digit(1);
    let plat = digit(2);
    let parcel = group(3..6);
    let lot = group(6..9);
    let cpr = group(9..13);

    let mut tmk = format!("{zone}-{section}-{plat}-{parcel}-{lot}");
    if cpr != 0 {
        tmk.push_str(&format!("-{cpr}"));
    }
    tmk
}
