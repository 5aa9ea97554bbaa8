//! Icon decoding, including the legacy ICO multi-image container
//!
//! Downloaded icon bytes are turned into a raster image here. SVG is passed
//! through untouched. ICO files are parsed by hand: the directory is read,
//! the largest embedded image is picked and its payload is run through an
//! ordered chain of decode strategies (generic raster, PNG, bare DIB).

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, trace};

use crate::errors::{FaviconError, FaviconResult};
use crate::utils::url::UrlUtils;

const ICO_HEADER_LEN: usize = 6;
const ICO_DIR_ENTRY_LEN: usize = 16;
const ICO_TYPE_ICON: u16 = 1;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const BMP_FILE_HEADER_LEN: usize = 14;
const BITMAPINFOHEADER_LEN: usize = 40;
const MAX_DIB_DIMENSION: u32 = 1024;
const DIB_BIT_COUNTS: [u16; 5] = [1, 4, 8, 24, 32];

/// Result of decoding downloaded icon bytes
#[derive(Debug, Clone)]
pub enum DecodedIcon {
    /// SVG source, stored verbatim
    Vector(Bytes),
    Raster(DynamicImage),
}

/// One 16-byte ICO directory entry. Colour count, planes and bit count are
/// read past but not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcoDirEntry {
    pub width: u32,
    pub height: u32,
    pub image_size: u32,
    pub image_offset: u32,
}

impl IcoDirEntry {
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }
}

type DecodeStrategy = fn(&[u8]) -> Option<DynamicImage>;

/// Payload decoders tried in order; the first image produced wins
const PAYLOAD_STRATEGIES: &[(&str, DecodeStrategy)] = &[
    ("generic", decode_generic),
    ("png_signature", decode_png_signature),
    ("dib", decode_dib),
];

pub struct IconDecoder;

impl IconDecoder {
    /// Decode icon bytes given their declared or sniffed extension
    pub fn decode(bytes: &[u8], extension: &str) -> FaviconResult<DecodedIcon> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();

        match extension.as_str() {
            "svg" => Ok(DecodedIcon::Vector(Bytes::copy_from_slice(bytes))),
            "ico" => {
                if !looks_like_ico(bytes)
                    && let Some(img) = decode_generic(bytes)
                {
                    // Plenty of sites serve a PNG under favicon.ico
                    debug!("Icon declared as .ico decoded as a plain raster");
                    return Ok(DecodedIcon::Raster(img));
                }
                Self::decode_ico(bytes).map(DecodedIcon::Raster)
            }
            _ => match image::load_from_memory(bytes) {
                Ok(img) => Ok(DecodedIcon::Raster(img)),
                Err(e) if looks_like_ico(bytes) => {
                    debug!("Raster decode failed ({}), bytes carry an ICO header", e);
                    Self::decode_ico(bytes).map(DecodedIcon::Raster)
                }
                Err(e) => Err(FaviconError::unsupported(format!(
                    "failed to decode .{extension} icon: {e}"
                ))),
            },
        }
    }

    /// Parse an ICO container and decode its largest embedded image
    pub fn decode_ico(bytes: &[u8]) -> FaviconResult<DynamicImage> {
        let entries = parse_ico_directory(bytes)?;
        let (index, entry) = select_largest_entry(&entries)
            .ok_or_else(|| FaviconError::malformed("icon directory is empty"))?;

        trace!(
            "ICO directory has {} entries, using #{} ({}x{}, {} bytes at {})",
            entries.len(),
            index,
            entry.width,
            entry.height,
            entry.image_size,
            entry.image_offset
        );

        let payload = extract_payload(bytes, entry)?;

        for (name, strategy) in PAYLOAD_STRATEGIES {
            if let Some(img) = strategy(payload) {
                debug!(
                    "Decoded ICO payload with {} strategy ({}x{})",
                    name,
                    img.width(),
                    img.height()
                );
                return Ok(img);
            }
            trace!("ICO payload strategy {} produced nothing", name);
        }

        Err(FaviconError::unsupported(format!(
            "no decode strategy accepted the {}x{} ICO payload",
            entry.width, entry.height
        )))
    }

    /// Pick the extension used to decode and name a downloaded icon
    ///
    /// URL path suffix first, then the `Content-Type`, then magic bytes.
    /// Falls back to `png`.
    pub fn detect_extension(url: &str, content_type: Option<&str>, bytes: &[u8]) -> String {
        if let Some(ext) = UrlUtils::path_extension(url)
            && let Some(known) = normalize_extension(&ext)
        {
            return known.to_string();
        }

        if let Some(ext) = content_type.and_then(extension_for_content_type) {
            return ext.to_string();
        }

        if looks_like_svg(bytes) {
            return "svg".to_string();
        }

        infer::get(bytes)
            .and_then(|kind| normalize_extension(kind.extension()))
            .unwrap_or("png")
            .to_string()
    }
}

/// Map extension spellings onto the set the cache stores
pub fn normalize_extension(ext: &str) -> Option<&'static str> {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "gif" => Some("gif"),
        "svg" => Some("svg"),
        "ico" => Some("ico"),
        "webp" => Some("webp"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/svg+xml" => Some("svg"),
        "image/x-icon" | "image/vnd.microsoft.icon" | "image/ico" | "image/icon" => Some("ico"),
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" | "image/x-ms-bmp" => Some("bmp"),
        _ => None,
    }
}

fn looks_like_ico(bytes: &[u8]) -> bool {
    bytes.len() >= ICO_HEADER_LEN && bytes[..4] == [0, 0, 1, 0]
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    read_u32(bytes, offset).map(|v| v as i32)
}

/// Validate the ICO header and read every directory entry
pub fn parse_ico_directory(bytes: &[u8]) -> FaviconResult<Vec<IcoDirEntry>> {
    let (reserved, kind, count) = match (read_u16(bytes, 0), read_u16(bytes, 2), read_u16(bytes, 4))
    {
        (Some(r), Some(t), Some(c)) => (r, t, c),
        _ => {
            return Err(FaviconError::malformed(format!(
                "header needs {ICO_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
    };

    if reserved != 0 {
        return Err(FaviconError::malformed(format!(
            "reserved field is {reserved}, expected 0"
        )));
    }
    if kind != ICO_TYPE_ICON {
        return Err(FaviconError::malformed(format!(
            "image type is {kind}, expected {ICO_TYPE_ICON}"
        )));
    }
    if count == 0 {
        return Err(FaviconError::malformed("image count is 0"));
    }

    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let base = ICO_HEADER_LEN + i * ICO_DIR_ENTRY_LEN;
        let raw = bytes.get(base..base + ICO_DIR_ENTRY_LEN).ok_or_else(|| {
            FaviconError::malformed(format!(
                "directory entry {i} of {count} is truncated"
            ))
        })?;

        let dimension = |b: u8| if b == 0 { 256 } else { u32::from(b) };
        entries.push(IcoDirEntry {
            width: dimension(raw[0]),
            height: dimension(raw[1]),
            image_size: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            image_offset: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        });
    }

    Ok(entries)
}

/// Entry with the largest `max(width, height)`; the first one wins ties
pub fn select_largest_entry(entries: &[IcoDirEntry]) -> Option<(usize, &IcoDirEntry)> {
    entries
        .iter()
        .enumerate()
        .fold(None, |best, (i, entry)| match best {
            Some((_, current)) if entry.max_dimension() <= current.max_dimension() => best,
            _ => Some((i, entry)),
        })
}

fn extract_payload<'a>(bytes: &'a [u8], entry: &IcoDirEntry) -> FaviconResult<&'a [u8]> {
    let start = entry.image_offset as usize;
    let end = start
        .checked_add(entry.image_size as usize)
        .ok_or_else(|| FaviconError::malformed("image offset overflows"))?;

    if entry.image_size == 0 {
        return Err(FaviconError::malformed("embedded image size is 0"));
    }

    bytes.get(start..end).ok_or_else(|| {
        FaviconError::malformed(format!(
            "embedded image {start}..{end} lies outside the {} byte file",
            bytes.len()
        ))
    })
}

fn decode_generic(payload: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory(payload).ok()
}

fn decode_png_signature(payload: &[u8]) -> Option<DynamicImage> {
    if !payload.starts_with(&PNG_SIGNATURE) {
        return None;
    }
    image::load_from_memory_with_format(payload, ImageFormat::Png).ok()
}

/// The fields of a BITMAPINFOHEADER the DIB fallback looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DibHeader {
    header_size: u32,
    width: i32,
    height: i32,
    bit_count: u16,
    compression: u32,
    colors_used: u32,
}

impl DibHeader {
    fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < BITMAPINFOHEADER_LEN {
            return None;
        }
        Some(Self {
            header_size: read_u32(payload, 0)?,
            width: read_i32(payload, 4)?,
            height: read_i32(payload, 8)?,
            bit_count: read_u16(payload, 14)?,
            compression: read_u32(payload, 16)?,
            colors_used: read_u32(payload, 32)?,
        })
    }

    /// Uncompressed, sane dimensions, supported depth
    fn is_supported(&self) -> bool {
        self.header_size as usize >= BITMAPINFOHEADER_LEN
            && self.compression == 0
            && self.width > 0
            && self.width as u32 <= MAX_DIB_DIMENSION
            && self.height != 0
            && self.height.unsigned_abs() <= MAX_DIB_DIMENSION
            && DIB_BIT_COUNTS.contains(&self.bit_count)
    }

    /// ICO DIBs declare the XOR bitmap and AND mask together, doubling the height
    fn has_mask_height(&self) -> bool {
        self.height.unsigned_abs() == 2 * self.width as u32
    }

    fn palette_len(&self) -> usize {
        if self.bit_count > 8 {
            return 0;
        }
        let entries = if self.colors_used == 0 {
            1usize << self.bit_count
        } else {
            self.colors_used as usize
        };
        entries * 4
    }
}

fn decode_dib(payload: &[u8]) -> Option<DynamicImage> {
    let header = DibHeader::parse(payload)?;
    if !header.is_supported() {
        trace!("DIB header rejected: {:?}", header);
        return None;
    }

    let bitmap = synthesize_bitmap_file(payload, &header);
    image::load_from_memory_with_format(&bitmap, ImageFormat::Bmp).ok()
}

/// Prefix a bare DIB with a `BM` file header so it decodes as a .bmp
fn synthesize_bitmap_file(payload: &[u8], header: &DibHeader) -> Vec<u8> {
    let total_size = (BMP_FILE_HEADER_LEN + payload.len()) as u32;
    let data_offset =
        (BMP_FILE_HEADER_LEN + header.header_size as usize + header.palette_len()) as u32;

    let mut bitmap = Vec::with_capacity(BMP_FILE_HEADER_LEN + payload.len());
    bitmap.extend_from_slice(b"BM");
    bitmap.extend_from_slice(&total_size.to_le_bytes());
    bitmap.extend_from_slice(&0u16.to_le_bytes());
    bitmap.extend_from_slice(&0u16.to_le_bytes());
    bitmap.extend_from_slice(&data_offset.to_le_bytes());
    bitmap.extend_from_slice(payload);

    if header.has_mask_height() {
        let height_at = BMP_FILE_HEADER_LEN + 8;
        bitmap[height_at..height_at + 4].copy_from_slice(&(header.height / 2).to_le_bytes());
    }

    bitmap
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use image::GenericImageView;
    use rstest::rstest;

    #[test]
    fn test_selects_largest_entry() {
        let ico = ico_bytes(&[
            (16, 16, png_bytes(16, 16, [255, 0, 0, 255])),
            (48, 48, png_bytes(48, 48, [0, 255, 0, 255])),
            (32, 32, png_bytes(32, 32, [0, 0, 255, 255])),
        ]);

        let img = IconDecoder::decode_ico(&ico).unwrap();
        assert_eq!(img.dimensions(), (48, 48));
        assert_eq!(img.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_largest_entry_ties_keep_first() {
        let ico = ico_bytes(&[
            (32, 16, png_bytes(4, 4, [10, 20, 30, 255])),
            (16, 32, png_bytes(4, 4, [200, 100, 50, 255])),
        ]);

        let img = IconDecoder::decode_ico(&ico).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_zero_dimension_byte_means_256() {
        let ico = ico_bytes(&[
            (128, 128, png_bytes(2, 2, [1, 1, 1, 255])),
            (0, 0, png_bytes(2, 2, [2, 2, 2, 255])),
        ]);

        let entries = parse_ico_directory(&ico).unwrap();
        assert_eq!(entries[1].width, 256);
        assert_eq!(entries[1].height, 256);
        let (index, _) = select_largest_entry(&entries).unwrap();
        assert_eq!(index, 1);
    }

    #[rstest]
    #[case::reserved_not_zero(1, 1, 1)]
    #[case::cursor_type(0, 2, 1)]
    #[case::no_images(0, 1, 0)]
    fn test_invalid_header_rejected(#[case] reserved: u16, #[case] kind: u16, #[case] count: u16) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&reserved.to_le_bytes());
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        let err = IconDecoder::decode_ico(&bytes).unwrap_err();
        assert!(matches!(err, FaviconError::MalformedContainer { .. }));
    }

    #[test]
    fn test_truncated_directory_rejected() {
        let mut ico = ico_bytes(&[(16, 16, png_bytes(16, 16, [0, 0, 0, 255]))]);
        ico[4] = 3; // claims three entries
        ico.truncate(6 + 16 + 4);
        assert!(matches!(
            parse_ico_directory(&ico),
            Err(FaviconError::MalformedContainer { .. })
        ));
    }

    #[test]
    fn test_payload_outside_file_rejected() {
        let mut ico = ico_bytes(&[(16, 16, png_bytes(16, 16, [0, 0, 0, 255]))]);
        ico[18..22].copy_from_slice(&10_000u32.to_le_bytes());
        let err = IconDecoder::decode_ico(&ico).unwrap_err();
        assert!(matches!(err, FaviconError::MalformedContainer { .. }));
    }

    #[test]
    fn test_dib_payload_falls_back_to_bitmap() {
        let ico = ico_bytes(&[(2, 2, dib_bytes(2, [0x10, 0x20, 0x30], 0, 24))]);

        let img = IconDecoder::decode_ico(&ico).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        let px = img.to_rgba8().get_pixel(1, 1).0;
        assert_eq!(&px[..3], &[0x30, 0x20, 0x10]);
    }

    const RED_BGRA: [u8; 4] = [0x00, 0x00, 0xFF, 0x00];
    const TEAL_BGRA: [u8; 4] = [0x80, 0x80, 0x00, 0x00];

    #[rstest]
    #[case::one_bit(1, 0, 1)]
    #[case::four_bit(4, 0, 1)]
    #[case::eight_bit_full_palette(8, 0, 1)]
    #[case::eight_bit_short_palette(8, 2, 1)]
    fn test_palette_dib_decodes_indexed_colour(
        #[case] bit_count: u16,
        #[case] colors_used: u32,
        #[case] index: u8,
    ) {
        let payload = depth_dib_bytes(16, bit_count, &[TEAL_BGRA, RED_BGRA], colors_used, index);
        let header = DibHeader::parse(&payload).unwrap();
        let synthesized = synthesize_bitmap_file(&payload, &header);
        assert_eq!(
            u32::from_le_bytes(synthesized[10..14].try_into().unwrap()) as usize,
            14 + 40 + header.palette_len()
        );

        let img = IconDecoder::decode_ico(&ico_bytes(&[(16, 16, payload)])).unwrap();
        assert_eq!(img.dimensions(), (16, 16));
        let rgba = img.to_rgba8();
        for (x, y) in [(0, 0), (7, 9), (15, 15)] {
            assert_eq!(&rgba.get_pixel(x, y).0[..3], &[0xFF, 0x00, 0x00]);
        }
    }

    #[test]
    fn test_thirty_two_bit_dib_decodes() {
        let payload = depth_dib_bytes(16, 32, &[[0x30, 0x20, 0x10, 0xFF]], 0, 0);
        let header = DibHeader::parse(&payload).unwrap();
        assert_eq!(header.palette_len(), 0);

        let img = IconDecoder::decode_ico(&ico_bytes(&[(16, 16, payload)])).unwrap();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(&img.to_rgba8().get_pixel(3, 12).0[..3], &[0x10, 0x20, 0x30]);
    }

    #[rstest]
    #[case::compressed(1, 24)]
    #[case::sixteen_bit(0, 16)]
    fn test_unsupported_dib_fails(#[case] compression: u32, #[case] bit_count: u16) {
        let ico = ico_bytes(&[(2, 2, dib_bytes(2, [0, 0, 0], compression, bit_count))]);
        let err = IconDecoder::decode_ico(&ico).unwrap_err();
        assert!(matches!(err, FaviconError::UnsupportedImage { .. }));
    }

    #[test]
    fn test_dib_header_bounds() {
        let mut payload = dib_bytes(2, [0, 0, 0], 0, 24);
        payload[4..8].copy_from_slice(&2000i32.to_le_bytes());
        let header = DibHeader::parse(&payload).unwrap();
        assert!(!header.is_supported());

        let synthesized = synthesize_bitmap_file(
            &dib_bytes(2, [0, 0, 0], 0, 24),
            &DibHeader::parse(&dib_bytes(2, [0, 0, 0], 0, 24)).unwrap(),
        );
        assert_eq!(&synthesized[..2], b"BM");
        assert_eq!(
            u32::from_le_bytes(synthesized[2..6].try_into().unwrap()) as usize,
            synthesized.len()
        );
        assert_eq!(u32::from_le_bytes(synthesized[10..14].try_into().unwrap()), 54);
    }

    #[test]
    fn test_svg_is_passed_through() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>";
        match IconDecoder::decode(svg, ".svg").unwrap() {
            DecodedIcon::Vector(bytes) => assert_eq!(&bytes[..], svg),
            DecodedIcon::Raster(_) => panic!("svg must not be rasterized"),
        }
    }

    #[test]
    fn test_png_served_as_ico_decodes() {
        let png = png_bytes(24, 24, [9, 9, 9, 255]);
        match IconDecoder::decode(&png, "ico").unwrap() {
            DecodedIcon::Raster(img) => assert_eq!(img.dimensions(), (24, 24)),
            DecodedIcon::Vector(_) => panic!("expected raster"),
        }
    }

    #[test]
    fn test_corrupt_raster_is_unsupported() {
        let err = IconDecoder::decode(b"definitely not an image", "png").unwrap_err();
        assert!(matches!(err, FaviconError::UnsupportedImage { .. }));
    }

    #[rstest]
    #[case("https://a.com/favicon.ico", None, "ico")]
    #[case("https://a.com/icon.JPEG", None, "jpg")]
    #[case("https://a.com/icon", Some("image/svg+xml; charset=utf-8"), "svg")]
    #[case("https://a.com/icon", Some("image/vnd.microsoft.icon"), "ico")]
    #[case("https://a.com/icon.php", None, "png")]
    fn test_detect_extension(
        #[case] url: &str,
        #[case] content_type: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(IconDecoder::detect_extension(url, content_type, &[]), expected);
    }

    #[test]
    fn test_detect_extension_sniffs_bytes() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        assert_eq!(IconDecoder::detect_extension("https://a.com/i", None, gif), "gif");
        assert_eq!(
            IconDecoder::detect_extension("https://a.com/i", None, b"  <svg></svg>"),
            "svg"
        );
    }
}
