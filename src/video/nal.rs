//! H.264 Annex-B inspection

const NAL_TYPE_MASK: u8 = 0x1F;
const NAL_TYPE_IDR: u8 = 5;
const NAL_TYPE_SPS: u8 = 7;

/// Detect whether an access unit starts a decodable sequence.
///
/// Returns `Some(true)` if any NAL unit is an IDR slice or an SPS,
/// `Some(false)` for other Annex-B units, and `None` when no start code is
/// found.
pub fn is_keyframe(unit: &[u8]) -> Option<bool> {
    let mut framed = false;
    let mut i = 0;

    while i + 3 <= unit.len() {
        if unit[i] == 0 && unit[i + 1] == 0 && unit[i + 2] == 1 {
            framed = true;
            if let Some(header) = unit.get(i + 3) {
                let nal_type = header & NAL_TYPE_MASK;
                if nal_type == NAL_TYPE_IDR || nal_type == NAL_TYPE_SPS {
                    return Some(true);
                }
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    framed.then_some(false)
}
