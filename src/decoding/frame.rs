/// Locating Ruuvi manufacturer data inside a BLE advertisement
///
/// An advertisement is a run of AD structures, each `[length][type][data...]`
/// where `length` counts the type byte and the data. Ruuvi sensor data sits in
/// a manufacturer-specific structure (type 0xFF) whose data starts with the
/// company identifier 0x0499 in little-endian order.
use crate::decoding::hex::hex_to_bytes;
use crate::error::DecodeError;

const RUUVITAG_MANUFACTURER_ID: u16 = 0x0499; // Ruuvi Innovations Ltd. manufacturer ID
const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// AD type followed by the company identifier, as it appears on the air
const MARKER: [u8; 3] = [
    AD_TYPE_MANUFACTURER_DATA,
    RUUVITAG_MANUFACTURER_ID.to_le_bytes()[0],
    RUUVITAG_MANUFACTURER_ID.to_le_bytes()[1],
];

/// Find the Ruuvi payload in a raw frame
///
/// Returns the bytes following the first marker, starting at the format
/// version byte. When the byte before the marker is a plausible AD length the
/// payload is clipped to that structure; otherwise it runs to the end of the
/// frame. `None` just means the frame is not a Ruuvi broadcast.
pub fn locate(frame: &[u8]) -> Option<&[u8]> {
    let start = frame
        .windows(MARKER.len())
        .position(|window| window == MARKER)?;
    let payload_start = start + MARKER.len();

    let payload_end = start
        .checked_sub(1)
        .map(|len_index| start + frame[len_index] as usize)
        .filter(|&end| end >= payload_start && end <= frame.len())
        .unwrap_or(frame.len());

    Some(&frame[payload_start..payload_end])
}

/// Hex-text variant of [`locate`]
///
/// Malformed hex is an error; a well-formed frame without the marker is
/// `Ok(None)`.
pub fn locate_hex(frame_hex: &str) -> Result<Option<Vec<u8>>, DecodeError> {
    let frame = hex_to_bytes(frame_hex.trim())?;
    Ok(locate(&frame).map(<[u8]>::to_vec))
}
