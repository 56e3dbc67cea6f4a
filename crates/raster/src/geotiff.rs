//! GeoTIFF codec built on the `tiff` crate.
//!
//! Reads any sample type as float32, de-interleaving chunky multiband
//! images, and picks up the GeoTIFF and GDAL tags the coverage service
//! writes. Output is always float32 with the same tags.

use std::io::{Cursor, Read, Seek, Write};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray32Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::{PhotometricInterpretation, SampleFormat, Tag};
use tracing::debug;

use scene_common::{SceneError, SceneResult};

use crate::store::RasterStore;
use crate::tile::{Band, GeoTransform, RasterTile};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_METADATA: u16 = 42112;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;

/// Largest band count the encoder supports.
pub const MAX_BANDS: usize = 8;

fn decode_error(context: &str, err: impl std::fmt::Display) -> SceneError {
    SceneError::Decode(format!("{}: {}", context, err))
}

fn encode_error(context: &str, err: impl std::fmt::Display) -> SceneError {
    SceneError::Processing(format!("GeoTIFF {}: {}", context, err))
}

/// GeoTIFF implementation of [`RasterStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffStore;

impl GeoTiffStore {
    pub fn new() -> Self {
        Self
    }
}

impl RasterStore for GeoTiffStore {
    fn decode(&self, bytes: &[u8]) -> SceneResult<RasterTile> {
        decode_geotiff(Cursor::new(bytes))
    }

    fn encode(&self, tile: &RasterTile) -> SceneResult<Vec<u8>> {
        let mut buf = Vec::new();
        encode_geotiff(tile, Cursor::new(&mut buf))?;
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode_geotiff<R: Read + Seek>(reader: R) -> SceneResult<RasterTile> {
    let mut decoder = Decoder::new(reader)
        .map_err(|e| decode_error("not a TIFF", e))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| decode_error("cannot read dimensions", e))?;
    let (width, height) = (width as usize, height as usize);

    let transform = read_geotransform(&mut decoder);
    let epsg = read_epsg(&mut decoder);
    let nodata = decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok());
    let names = decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_METADATA))
        .map(|xml| parse_band_descriptions(&xml))
        .unwrap_or_default();

    let samples = read_samples(&mut decoder)?;
    let pixels = width * height;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(SceneError::Decode(format!(
            "{} samples do not fit a {}x{} image",
            samples.len(),
            width,
            height
        )));
    }
    let band_count = samples.len() / pixels;

    let bands = (0..band_count)
        .map(|b| {
            let data = samples.iter().skip(b).step_by(band_count).copied().collect();
            match names.get(b).cloned().flatten() {
                Some(name) => Band::new(name, data),
                None => Band::unnamed(data),
            }
        })
        .collect();

    debug!(width, height, bands = band_count, ?epsg, "Decoded GeoTIFF");

    let mut tile = RasterTile::new(width, height, bands)?;
    if let Some(transform) = transform {
        tile = tile.with_transform(transform);
    }
    tile.epsg = epsg;
    tile.nodata = nodata;
    Ok(tile)
}

fn read_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> SceneResult<Vec<f32>> {
    let result = decoder
        .read_image()
        .map_err(|e| decode_error("cannot read image data", e))?;

    Ok(match result {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    })
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    Some(GeoTransform::new(
        tiepoint[3] - tiepoint[0] * scale[0],
        tiepoint[4] + tiepoint[1] * scale[1],
        scale[0],
        -scale[1],
    ))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder
        .get_tag_u16_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .ok()?;
    epsg_from_geokeys(&keys)
}

/// Find the projected or geographic CRS code in a GeoKeyDirectory.
fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..4 + count * 4)?;

    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            // location 0 means the value is stored inline
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3] as u32)
    };

    lookup(KEY_PROJECTED_TYPE)
        .or_else(|| lookup(KEY_GEOGRAPHIC_TYPE))
        .filter(|code| *code != 0 && *code != 32767)
}

/// Band descriptions from a GDAL_METADATA document, indexed by sample.
fn parse_band_descriptions(xml: &str) -> Vec<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut names: Vec<Option<String>> = Vec::new();
    let mut current: Option<usize> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Item" => {
                let mut sample = None;
                let mut is_description = false;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"sample" => sample = value.parse::<usize>().ok(),
                        b"role" => is_description = value == "description",
                        b"name" => is_description |= value == "DESCRIPTION",
                        _ => {}
                    }
                }
                current = if is_description { sample } else { None };
            }
            Ok(Event::Text(t)) => {
                if let (Some(i), Ok(text)) = (current, t.unescape()) {
                    if names.len() <= i {
                        names.resize(i + 1, None);
                    }
                    names[i] = Some(text.into_owned());
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    names
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

macro_rules! float_multiband {
    ($($name:ident => $n:expr),* $(,)?) => {$(
        struct $name;

        impl ColorType for $name {
            type Inner = f32;
            const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::BlackIsZero;
            const BITS_PER_SAMPLE: &'static [u16] = &[32; $n];
            const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::IEEEFP; $n];
        }
    )*};
}

float_multiband!(
    Float2 => 2,
    Float3 => 3,
    Float4 => 4,
    Float5 => 5,
    Float6 => 6,
    Float7 => 7,
    Float8 => 8,
);

fn encode_geotiff<W: Write + Seek>(tile: &RasterTile, writer: W) -> SceneResult<()> {
    let mut encoder = TiffEncoder::new(writer).map_err(|e| encode_error("encoder", e))?;

    match tile.band_count() {
        1 => write_image::<Gray32Float, W>(&mut encoder, tile),
        2 => write_image::<Float2, W>(&mut encoder, tile),
        3 => write_image::<Float3, W>(&mut encoder, tile),
        4 => write_image::<Float4, W>(&mut encoder, tile),
        5 => write_image::<Float5, W>(&mut encoder, tile),
        6 => write_image::<Float6, W>(&mut encoder, tile),
        7 => write_image::<Float7, W>(&mut encoder, tile),
        8 => write_image::<Float8, W>(&mut encoder, tile),
        n => Err(SceneError::Processing(format!(
            "cannot encode {} bands (supported: 1 to {})",
            n, MAX_BANDS
        ))),
    }
}

fn write_image<C, W>(encoder: &mut TiffEncoder<W>, tile: &RasterTile) -> SceneResult<()>
where
    C: ColorType<Inner = f32>,
    W: Write + Seek,
{
    let mut image = encoder
        .new_image::<C>(tile.width as u32, tile.height as u32)
        .map_err(|e| encode_error("image", e))?;

    let gt = &tile.transform;
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| encode_error("pixel scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| encode_error("tiepoint tag", e))?;

    let geokeys = geokey_directory(tile.epsg);
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| encode_error("geokey tag", e))?;

    if let Some(xml) = band_metadata(tile) {
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_METADATA), xml.as_str())
            .map_err(|e| encode_error("metadata tag", e))?;
    }

    if let Some(nodata) = tile.nodata {
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), nodata.to_string().as_str())
            .map_err(|e| encode_error("nodata tag", e))?;
    }

    image
        .write_data(&interleave(tile))
        .map_err(|e| encode_error("image data", e))?;

    Ok(())
}

/// Chunky (pixel-interleaved) sample order.
fn interleave(tile: &RasterTile) -> Vec<f32> {
    let n = tile.band_count();
    let mut out = vec![0.0f32; tile.pixel_count() * n];
    for (b, band) in tile.bands.iter().enumerate() {
        for (i, v) in band.data.iter().enumerate() {
            out[i * n + b] = *v;
        }
    }
    out
}

fn geokey_directory(epsg: Option<u32>) -> Vec<u16> {
    // RasterPixelIsArea
    let mut entries: Vec<[u16; 4]> = vec![[KEY_RASTER_TYPE, 0, 1, 1]];

    match epsg.and_then(|code| u16::try_from(code).ok()) {
        Some(4326) => {
            entries.insert(0, [KEY_MODEL_TYPE, 0, 1, 2]);
            entries.push([KEY_GEOGRAPHIC_TYPE, 0, 1, 4326]);
        }
        Some(code) => {
            entries.insert(0, [KEY_MODEL_TYPE, 0, 1, 1]);
            entries.push([KEY_PROJECTED_TYPE, 0, 1, code]);
        }
        None => entries.insert(0, [KEY_MODEL_TYPE, 0, 1, 1]),
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

fn band_metadata(tile: &RasterTile) -> Option<String> {
    let items: Vec<String> = tile
        .bands
        .iter()
        .enumerate()
        .filter_map(|(i, band)| {
            band.name.as_deref().map(|name| {
                format!(
                    "  <Item name=\"DESCRIPTION\" sample=\"{}\" role=\"description\">{}</Item>",
                    i,
                    escape(name)
                )
            })
        })
        .collect();

    if items.is_empty() {
        return None;
    }
    Some(format!("<GDALMetadata>\n{}\n</GDALMetadata>", items.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokeys_roundtrip() {
        assert_eq!(epsg_from_geokeys(&geokey_directory(Some(3577))), Some(3577));
        assert_eq!(epsg_from_geokeys(&geokey_directory(Some(4326))), Some(4326));
        assert_eq!(epsg_from_geokeys(&geokey_directory(Some(32755))), Some(32755));
        assert_eq!(epsg_from_geokeys(&geokey_directory(None)), None);
    }

    #[test]
    fn test_truncated_geokeys() {
        assert_eq!(epsg_from_geokeys(&[1, 1, 0, 3, 1024]), None);
    }

    #[test]
    fn test_parse_gdal_band_descriptions() {
        let xml = r#"<GDALMetadata>
  <Item name="OFFSET" sample="0" role="offset">0</Item>
  <Item name="DESCRIPTION" sample="0" role="description">nbart_red</Item>
  <Item name="DESCRIPTION" sample="2" role="description">oa_fmask</Item>
</GDALMetadata>"#;

        assert_eq!(
            parse_band_descriptions(xml),
            vec![Some("nbart_red".to_string()), None, Some("oa_fmask".to_string())]
        );
    }

    #[test]
    fn test_band_metadata_escapes_names() {
        let tile = RasterTile::new(1, 1, vec![Band::new("a<b", vec![0.0])]).unwrap();
        let xml = band_metadata(&tile).unwrap();
        assert!(xml.contains("a&lt;b"));
        assert_eq!(parse_band_descriptions(&xml), vec![Some("a<b".to_string())]);
    }

    #[test]
    fn test_interleave_order() {
        let tile = RasterTile::new(
            2,
            1,
            vec![Band::unnamed(vec![1.0, 2.0]), Band::unnamed(vec![10.0, 20.0])],
        )
        .unwrap();
        assert_eq!(interleave(&tile), vec![1.0, 10.0, 2.0, 20.0]);
    }

    #[test]
    fn test_too_many_bands() {
        let bands = (0..9).map(|_| Band::unnamed(vec![0.0])).collect();
        let tile = RasterTile::new(1, 1, bands).unwrap();
        assert!(GeoTiffStore.encode(&tile).is_err());
    }
}
