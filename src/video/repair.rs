//! Best-effort salvage of structurally corrupt JPEG frames
//!
//! Assembled frames sometimes fail to decode: scan data shows up with
//! missing byte stuffing, and fragment loss cuts frames short. Whether that
//! is a firmware bug, capture loss, or an artifact of the recovered
//! deobfuscation formula is unconfirmed. These transforms salvage a
//! displayable image; none of them claims to reconstruct the original
//! bit-for-bit, and none may be applied to a frame the codec already
//! accepted.
//!
//! All transforms are pure `&[u8] -> Option<Vec<u8>>` functions; `None`
//! means "nothing to do here", never an error.

use super::{JPEG_EOI, JPEG_SOI};

const MARKER_SOF0: u8 = 0xC0;
const MARKER_SOS: u8 = 0xDA;

/// Salvage policy for frames the image codec rejects
#[derive(Debug, Clone)]
pub struct RepairPolicy {
    /// Master switch; when off, `candidates` yields nothing
    pub enabled: bool,
    /// Fraction of the scan data kept by truncation salvage
    pub truncation_fraction: f32,
    /// Optional replacement for the declared image height
    pub height_override: Option<u16>,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            truncation_fraction: 0.75,
            height_override: None,
        }
    }
}

impl RepairPolicy {
    /// Ordered salvage candidates for a rejected frame
    ///
    /// Least destructive first: re-stuffed scan data, then the height patch
    /// on top of it, then the truncated scan as a last resort. The caller
    /// tries each against the codec and keeps the first that decodes.
    pub fn candidates(&self, data: &[u8]) -> Vec<Vec<u8>> {
        if !self.enabled {
            return Vec::new();
        }

        let stuffed = restuff_scan(data);
        let base: &[u8] = stuffed.as_deref().unwrap_or(data);
        let patched = self
            .height_override
            .and_then(|height| patch_height(base, height));
        let truncated = truncate_scan(base, self.truncation_fraction);

        let mut out = Vec::new();
        out.extend(stuffed);
        out.extend(patched);
        out.extend(truncated);
        out
    }
}

/// Offset of the `0xFF` byte of the first `wanted` marker segment
///
/// Walks length-prefixed segments from SOI so table payloads that happen to
/// contain marker-looking bytes are not mistaken for real markers. Stops at
/// the start of scan: entropy-coded data is not segment-structured.
fn find_segment(data: &[u8], wanted: u8) -> Option<usize> {
    if !data.starts_with(&JPEG_SOI) {
        return None;
    }
    let mut i = JPEG_SOI.len();
    while i + 2 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        if marker == wanted {
            return Some(i);
        }
        match marker {
            // Fill byte before a marker
            0xFF => i += 1,
            // Standalone markers without a length field
            0x01 | 0xD0..=0xD9 => i += 2,
            _ => {
                if marker == MARKER_SOS {
                    return None;
                }
                if i + 4 > data.len() {
                    return None;
                }
                let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
                if len < 2 {
                    return None;
                }
                i += 2 + len;
            }
        }
    }
    None
}

/// Byte offset where the entropy-coded scan region starts (just past the
/// start-of-scan marker and its declared parameter block)
pub fn find_scan_start(data: &[u8]) -> Option<usize> {
    let sos = find_segment(data, MARKER_SOS)?;
    if sos + 4 > data.len() {
        return None;
    }
    let param_len = u16::from_be_bytes([data[sos + 2], data[sos + 3]]) as usize;
    let start = sos + 2 + param_len;
    (param_len >= 2 && start <= data.len()).then_some(start)
}

/// Scan region bounds; the end excludes a trailing EOI when present
fn scan_bounds(data: &[u8]) -> Option<(usize, usize)> {
    let start = find_scan_start(data)?;
    let end = if data.len() >= start + 2 && data[data.len() - 2..] == JPEG_EOI {
        data.len() - 2
    } else {
        data.len()
    };
    Some((start, end))
}

/// Re-insert missing JPEG byte stuffing in the scan region
///
/// A literal `0xFF` inside entropy-coded data must be followed by `0x00`;
/// `0xFF` followed by `0xD0..=0xD9` is a restart or end marker and is left
/// alone. Everything before the scan region and the trailing EOI are
/// untouched. Returns `None` when there is no locatable scan region or
/// nothing needed fixing.
pub fn restuff_scan(data: &[u8]) -> Option<Vec<u8>> {
    let (start, end) = scan_bounds(data)?;

    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(&data[..start]);

    let mut inserted = 0usize;
    for i in start..end {
        let byte = data[i];
        out.push(byte);
        if byte == 0xFF
            && let Some(&next) = data.get(i + 1)
            && next != 0x00
            && next < 0xD0
        {
            out.push(0x00);
            inserted += 1;
        }
    }
    out.extend_from_slice(&data[end..]);

    if inserted == 0 {
        return None;
    }
    log::debug!("Re-stuffed {} bare 0xFF bytes in scan data", inserted);
    Some(out)
}

/// Truncate the scan to `fraction` of its length and close with a clean EOI
///
/// Produces a partial but decodable image when the tail of the scan is
/// beyond saving. Returns `None` when there is no scan region or nothing
/// would be cut.
pub fn truncate_scan(data: &[u8], fraction: f32) -> Option<Vec<u8>> {
    let (start, end) = scan_bounds(data)?;
    let scan_len = end - start;
    let keep = (scan_len as f32 * fraction.clamp(0.0, 1.0)) as usize;
    if keep >= scan_len {
        return None;
    }

    let mut out = Vec::with_capacity(start + keep + 3);
    out.extend_from_slice(&data[..start + keep]);
    // Never end the scan on a bare 0xFF
    if out.last() == Some(&0xFF) {
        out.push(0x00);
    }
    out.extend_from_slice(&JPEG_EOI);
    log::debug!(
        "Truncated scan from {} to {} bytes",
        scan_len,
        out.len() - start - 2
    );
    Some(out)
}

/// Rewrite the declared image height in the SOF0 frame header
///
/// Used when fragment loss systematically delivers fewer scan lines than
/// declared, so the codec does not reject the whole frame. Returns `None`
/// when there is no SOF0 segment or the height already matches.
pub fn patch_height(data: &[u8], height: u16) -> Option<Vec<u8>> {
    let sof = find_segment(data, MARKER_SOF0)?;
    // SOF0 layout: FF C0, length u16, precision u8, height u16, width u16, ...
    let offset = sof + 5;
    if offset + 2 > data.len() {
        return None;
    }
    if u16::from_be_bytes([data[offset], data[offset + 1]]) == height {
        return None;
    }

    let mut out = data.to_vec();
    out[offset..offset + 2].copy_from_slice(&height.to_be_bytes());
    log::debug!("Patched declared height to {} scan lines", height);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal single-component JPEG skeleton around the given scan bytes.
    /// The quantization table payload deliberately contains `FF DA` to make
    /// sure the segment walk is not fooled by marker-looking table data.
    fn jpeg_with_scan(scan: &[u8]) -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(&JPEG_SOI);
        // DQT, 4 payload bytes that mimic an SOS marker
        d.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x06, 0xFF, 0xDA, 0x00, 0x00]);
        // SOF0: 8-bit precision, 480x640, one component
        d.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x01, 0xE0, 0x02, 0x80, 0x01, 0x01, 0x11, 0x00,
        ]);
        // SOS with a 6-byte parameter block
        d.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        d.extend_from_slice(scan);
        d.extend_from_slice(&JPEG_EOI);
        d
    }

    fn scan_start_of(data: &[u8]) -> usize {
        find_scan_start(data).expect("skeleton has a scan region")
    }

    #[test]
    fn test_find_scan_start_skips_table_data() {
        let jpeg = jpeg_with_scan(&[0x12, 0x34]);
        // SOI(2) + DQT(8) + SOF0(13) + SOS(10)
        assert_eq!(scan_start_of(&jpeg), 33);
    }

    #[test]
    fn test_find_scan_start_requires_soi() {
        assert_eq!(find_scan_start(&[0x00, 0x01, 0x02]), None);
        assert_eq!(find_scan_start(&[]), None);
    }

    #[test]
    fn test_restuff_inserts_missing_zero() {
        let jpeg = jpeg_with_scan(&[0x12, 0xFF, 0x2C, 0x34]);
        let start = scan_start_of(&jpeg);

        let fixed = restuff_scan(&jpeg).expect("one bare 0xFF to fix");

        // Header region is byte-identical
        assert_eq!(&fixed[..start], &jpeg[..start]);
        // FF 2C became FF 00 2C
        assert_eq!(&fixed[start..start + 5], &[0x12, 0xFF, 0x00, 0x2C, 0x34]);
        // EOI still closes the image
        assert_eq!(&fixed[fixed.len() - 2..], &JPEG_EOI);
        assert_eq!(fixed.len(), jpeg.len() + 1);
    }

    #[test]
    fn test_restuff_leaves_valid_scan_alone() {
        // Proper stuffing and a restart marker: nothing to fix
        let jpeg = jpeg_with_scan(&[0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56]);
        assert_eq!(restuff_scan(&jpeg), None);
    }

    #[test]
    fn test_restuff_ignores_trailing_eoi() {
        // The scan's last byte is 0xFF; the byte after it is the EOI's 0xFF
        // and must not trigger an insertion.
        let jpeg = jpeg_with_scan(&[0x12, 0xFF]);
        assert_eq!(restuff_scan(&jpeg), None);
    }

    #[test]
    fn test_truncate_appends_eoi() {
        let scan: Vec<u8> = (0..100u8).map(|b| b.wrapping_mul(3)).collect();
        let jpeg = jpeg_with_scan(&scan);
        let start = scan_start_of(&jpeg);

        let cut = truncate_scan(&jpeg, 0.5).expect("half the scan removed");

        assert_eq!(&cut[..start], &jpeg[..start]);
        assert_eq!(cut.len(), start + 50 + 2);
        assert_eq!(&cut[cut.len() - 2..], &JPEG_EOI);
    }

    #[test]
    fn test_truncate_never_ends_on_bare_ff() {
        let jpeg = jpeg_with_scan(&[0x01, 0xFF, 0x00, 0x02]);
        // fraction 0.5 of 4 bytes keeps [0x01, 0xFF]
        let cut = truncate_scan(&jpeg, 0.5).unwrap();
        let start = scan_start_of(&jpeg);
        assert_eq!(&cut[start..], &[0x01, 0xFF, 0x00, 0xFF, 0xD9]);
    }

    #[test]
    fn test_truncate_full_fraction_is_noop() {
        let jpeg = jpeg_with_scan(&[1, 2, 3, 4]);
        assert_eq!(truncate_scan(&jpeg, 1.0), None);
        assert_eq!(truncate_scan(&jpeg, 2.0), None);
    }

    #[test]
    fn test_patch_height_rewrites_sof0_only() {
        let jpeg = jpeg_with_scan(&[0x10, 0x20]);
        let patched = patch_height(&jpeg, 464).expect("height differs");

        // Only the two height bytes changed
        let diffs: Vec<usize> = patched
            .iter()
            .zip(&jpeg)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        let sof_height = 2 + 8 + 5; // SOI + DQT + (FF C0 len len precision)
        assert_eq!(diffs, vec![sof_height, sof_height + 1]);
        assert_eq!(
            u16::from_be_bytes([patched[sof_height], patched[sof_height + 1]]),
            464
        );

        // Same height requested again: nothing to do
        assert_eq!(patch_height(&patched, 464), None);
    }

    #[test]
    fn test_candidates_order_and_gating() {
        let corrupt = jpeg_with_scan(&[0x12, 0xFF, 0x2C, 0x34, 0x56, 0x78, 0x9A, 0xBC]);

        let policy = RepairPolicy {
            enabled: true,
            truncation_fraction: 0.5,
            height_override: Some(464),
        };
        let candidates = policy.candidates(&corrupt);
        assert_eq!(candidates.len(), 3);

        // First candidate: re-stuffed only
        assert_eq!(candidates[0].len(), corrupt.len() + 1);
        // Second: height patch applied on top of the re-stuffed buffer
        assert_ne!(candidates[1], candidates[0]);
        assert_eq!(candidates[1].len(), candidates[0].len());
        // Third: truncated, closed with EOI
        assert!(candidates[2].len() < corrupt.len());
        assert_eq!(&candidates[2][candidates[2].len() - 2..], &JPEG_EOI);

        let disabled = RepairPolicy {
            enabled: false,
            ..policy
        };
        assert!(disabled.candidates(&corrupt).is_empty());
    }

    #[test]
    fn test_non_jpeg_input_yields_nothing() {
        let policy = RepairPolicy::default();
        assert!(policy.candidates(&[0x00, 0x11, 0x22]).is_empty());
        assert_eq!(restuff_scan(b"not a jpeg"), None);
        assert_eq!(truncate_scan(&[], 0.5), None);
        assert_eq!(patch_height(&[0xFF], 480), None);
    }
}
