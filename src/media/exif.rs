//! EXIF fields of a single image, backed by `kamadak-exif`
use std::io::Cursor;

use ::exif::{Context, Field, In, Rational, Tag, Value};
use chrono::NaiveDateTime;
use dms_coordinates::{Cardinal, DMS};

use crate::types::Position;

/// Windows `XPKeywords`, a semicolon separated UCS-2 string
const XP_KEYWORDS: Tag = Tag(Context::Tiff, 0x9c9e);

/// Denominator used for GPS seconds
const SECONDS_DENOM: u32 = 1_000_000;

/// An editable copy of the EXIF fields of an image
///
/// Fields of the primary image are kept as-is (except those with values the
/// encoder cannot represent), as is the embedded thumbnail if it can be
/// extracted. Editing replaces individual fields in the primary IFD.
#[derive(Clone, Debug, Default)]
pub struct ExifData {
    fields: Vec<Field>,
    thumbnail: Option<Vec<u8>>,
    little_endian: bool,
}

impl ExifData {
    /// Parse raw TIFF-structured EXIF data
    pub fn parse(raw: Vec<u8>) -> Result<Self, ::exif::Error> {
        Ok(Self::from_exif(&::exif::Reader::new().read_raw(raw)?))
    }

    /// Copy the fields out of parsed EXIF data
    pub fn from_exif(exif: &::exif::Exif) -> Self {
        let thumbnail = thumbnail(exif);
        let fields = exif
            .fields()
            .filter(|field| !matches!(field.value, Value::Unknown(..)))
            .filter(|field| match field.ifd_num {
                In::PRIMARY => true,
                In::THUMBNAIL => thumbnail.is_some(),
                _ => false,
            })
            .cloned()
            .collect();
        Self {
            fields,
            thumbnail,
            little_endian: exif.little_endian(),
        }
    }

    /// Whether there are no fields at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode the fields back into raw EXIF data
    pub fn encode(&self) -> Result<Vec<u8>, ::exif::Error> {
        let mut writer = ::exif::experimental::Writer::new();
        for field in &self.fields {
            writer.push_field(field);
        }
        if let Some(jpeg) = &self.thumbnail {
            writer.set_jpeg(jpeg, In::THUMBNAIL);
        }
        let mut buffer = Cursor::new(Vec::new());
        writer.write(&mut buffer, self.little_endian)?;
        Ok(buffer.into_inner())
    }

    /// Date the image was taken, falling back to the modification date
    pub fn date_taken(&self) -> Option<NaiveDateTime> {
        None.or_else(|| self.ascii(Tag::DateTimeOriginal))
            .or_else(|| self.ascii(Tag::DateTime))
            .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S").ok())
    }

    /// The raw orientation code
    pub fn orientation(&self) -> Option<u32> {
        self.get(Tag::Orientation)?.get_uint(0)
    }

    /// The GPS position, if both coordinates are present
    pub fn position(&self) -> Option<Position> {
        Some(Position {
            lat: self.coordinate(Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S')?,
            lon: self.coordinate(Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')?,
        })
    }

    pub fn set_position(&mut self, position: Position) {
        let lat = DMS::from_ddeg_latitude(position.lat);
        let lon = DMS::from_ddeg_longitude(position.lon);
        if self.get(Tag::GPSVersionID).is_none() {
            self.set(Tag::GPSVersionID, Value::Byte(vec![2, 3, 0, 0]));
        }
        let lat_ref = match lat.cardinal {
            Some(Cardinal::South) => "S",
            _ => "N",
        };
        let lon_ref = match lon.cardinal {
            Some(Cardinal::West) => "W",
            _ => "E",
        };
        self.set(Tag::GPSLatitudeRef, ascii(lat_ref));
        self.set(Tag::GPSLatitude, dms_value(&lat));
        self.set(Tag::GPSLongitudeRef, ascii(lon_ref));
        self.set(Tag::GPSLongitude, dms_value(&lon));
    }

    /// The image description
    pub fn description(&self) -> Option<String> {
        self.ascii(Tag::ImageDescription)
            .map(|s| s.trim_end_matches('\0').to_string())
            .filter(|s| !s.trim().is_empty())
    }

    /// Set the image description, removing it if `description` is empty
    pub fn set_description(&mut self, description: &str) {
        if description.is_empty() {
            self.remove(Tag::ImageDescription);
        } else {
            self.set(Tag::ImageDescription, ascii(description));
        }
    }

    /// Keywords from the Windows `XPKeywords` field
    pub fn keywords(&self) -> Vec<String> {
        let Some(Value::Byte(bytes)) = self.get(XP_KEYWORDS) else {
            return Vec::new();
        };
        from_ucs2_le(bytes)
            .split(';')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(String::from)
            .collect()
    }

    /// Set the Windows `XPKeywords` field, removing it if `keywords` is empty
    ///
    /// Keywords which cannot be represented in UCS-2 are left out.
    pub fn set_keywords(&mut self, keywords: &[String]) {
        let encoded = keywords
            .iter()
            .filter(|keyword| {
                let representable = to_ucs2_le(keyword).is_some();
                if !representable {
                    log::warn!("Keyword `{keyword}` cannot be stored in XPKeywords");
                }
                representable
            })
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");
        match to_ucs2_le(&encoded) {
            Some(bytes) if !encoded.is_empty() => self.set(XP_KEYWORDS, Value::Byte(bytes)),
            _ => self.remove(XP_KEYWORDS),
        }
    }

    fn get(&self, tag: Tag) -> Option<&Value> {
        self.fields
            .iter()
            .find(|field| field.tag == tag && field.ifd_num == In::PRIMARY)
            .map(|field| &field.value)
    }

    fn ascii(&self, tag: Tag) -> Option<String> {
        match self.get(tag)? {
            Value::Ascii(values) => values
                .first()
                .map(|value| String::from_utf8_lossy(value).into_owned()),
            _ => None,
        }
    }

    fn coordinate(&self, tag: Tag, ref_tag: Tag, negative: char) -> Option<f64> {
        let Value::Rational(parts) = self.get(tag)? else {
            return None;
        };
        let [degrees, minutes, seconds] = parts.get(..3)? else {
            return None;
        };
        let magnitude = degrees.to_f64() + minutes.to_f64() / 60.0 + seconds.to_f64() / 3600.0;
        let is_negative = self
            .ascii(ref_tag)
            .is_some_and(|reference| reference.starts_with(negative));
        Some(if is_negative { -magnitude } else { magnitude })
    }

    fn set(&mut self, tag: Tag, value: Value) {
        self.remove(tag);
        self.fields.push(Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        });
    }

    fn remove(&mut self, tag: Tag) {
        self.fields
            .retain(|field| !(field.tag == tag && field.ifd_num == In::PRIMARY));
    }
}

/// Extract the embedded JPEG thumbnail, if there is one
fn thumbnail(exif: &::exif::Exif) -> Option<Vec<u8>> {
    let uint = |tag| exif.get_field(tag, In::THUMBNAIL)?.value.get_uint(0);
    let offset = usize::try_from(uint(Tag::JPEGInterchangeFormat)?).ok()?;
    let length = usize::try_from(uint(Tag::JPEGInterchangeFormatLength)?).ok()?;
    exif.buf()
        .get(offset..offset.checked_add(length)?)
        .map(<[u8]>::to_vec)
}

fn ascii(value: &str) -> Value {
    Value::Ascii(vec![value.as_bytes().to_vec()])
}

/// GPS rationals for a coordinate, with seconds in millionths
fn dms_value(dms: &DMS) -> Value {
    Value::Rational(vec![
        Rational {
            num: dms.degrees.into(),
            denom: 1,
        },
        Rational {
            num: dms.minutes.into(),
            denom: 1,
        },
        Rational {
            num: (dms.seconds.abs() * f64::from(SECONDS_DENOM)).round() as u32,
            denom: SECONDS_DENOM,
        },
    ])
}

/// Encode a string as null-terminated UCS-2LE bytes
fn to_ucs2_le(value: &str) -> Option<Vec<u8>> {
    let mut buffer = vec![0u16; value.len() + 1];
    let len = ucs2::encode(value, &mut buffer).ok()?;
    buffer.truncate(len + 1);
    buffer[len] = 0;
    Some(buffer.into_iter().flat_map(u16::to_le_bytes).collect())
}

/// Decode null-terminated UCS-2LE bytes
fn from_ucs2_le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    let mut buffer = vec![0u8; units.len() * 3];
    match ucs2::decode(&units, &mut buffer) {
        Ok(len) => String::from_utf8_lossy(&buffer[..len]).into_owned(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(data: &ExifData) -> ExifData {
        let raw = data.encode().expect("fields should be encodable");
        ExifData::parse(raw).expect("encoded data should be parseable")
    }

    #[test]
    fn empty_data() {
        let data = ExifData::default();
        assert!(data.is_empty());
        assert_eq!(data.position(), None);
        assert_eq!(data.description(), None);
        assert_eq!(data.date_taken(), None);
        assert!(data.keywords().is_empty());
    }

    #[test]
    fn position() {
        let mut data = ExifData::default();
        let position = Position {
            lat: -33.856784,
            lon: 151.215297,
        };
        data.set_position(position);
        let data = round_trip(&data);
        let read = data.position().expect("position should be present");
        assert!(read.approx_eq(&position), "{read:?} != {position:?}");
        assert_eq!(data.ascii(Tag::GPSLatitudeRef).as_deref(), Some("S"));
        assert_eq!(data.ascii(Tag::GPSLongitudeRef).as_deref(), Some("E"));
    }

    #[test]
    fn gps_rationals() {
        let mut data = ExifData::default();
        data.set_position(Position {
            lat: -11.5,
            lon: 0.25,
        });
        let Some(Value::Rational(parts)) = data.get(Tag::GPSLatitude) else {
            panic!("latitude should be stored as rationals");
        };
        let parts: Vec<_> = parts.iter().map(|part| (part.num, part.denom)).collect();
        assert_eq!(parts, vec![(11, 1), (30, 1), (0, SECONDS_DENOM)]);
        let Some(Value::Rational(parts)) = data.get(Tag::GPSLongitude) else {
            panic!("longitude should be stored as rationals");
        };
        let parts: Vec<_> = parts.iter().map(|part| (part.num, part.denom)).collect();
        assert_eq!(parts, vec![(0, 1), (15, 1), (0, SECONDS_DENOM)]);
        assert_eq!(data.ascii(Tag::GPSLatitudeRef).as_deref(), Some("S"));
        assert_eq!(data.ascii(Tag::GPSLongitudeRef).as_deref(), Some("E"));
    }

    #[test]
    fn description() {
        let mut data = ExifData::default();
        data.set_description("Sunset at the pier");
        let mut data = round_trip(&data);
        assert_eq!(data.description().as_deref(), Some("Sunset at the pier"));
        data.set_description("");
        assert_eq!(data.description(), None);
        assert!(data.is_empty());
    }

    #[test]
    fn date_taken() {
        let mut data = ExifData::default();
        data.set(Tag::DateTime, ascii("2017:12:24 10:00:00"));
        let expected = chrono::NaiveDate::from_ymd_opt(2017, 12, 24)
            .and_then(|d| d.and_hms_opt(10, 0, 0));
        assert_eq!(data.date_taken(), expected);

        data.set(Tag::DateTimeOriginal, ascii("2016:01:02 03:04:05"));
        let data = round_trip(&data);
        let expected = chrono::NaiveDate::from_ymd_opt(2016, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5));
        assert_eq!(data.date_taken(), expected);
    }

    #[test]
    fn orientation() {
        let mut data = ExifData::default();
        data.set(Tag::Orientation, Value::Short(vec![6]));
        assert_eq!(round_trip(&data).orientation(), Some(6));
    }

    #[test]
    fn keywords() {
        let mut data = ExifData::default();
        data.set_keywords(&["beach".into(), "Göteborg".into()]);
        let mut data = round_trip(&data);
        assert_eq!(data.keywords(), vec!["beach", "Göteborg"]);
        data.set_keywords(&[]);
        assert!(data.keywords().is_empty());
    }

    #[test]
    fn ucs2_encoding() {
        assert_eq!(to_ucs2_le("ab"), Some(b"a\0b\0\0\0".to_vec()));
        assert_eq!(from_ucs2_le(b"a\0b\0\0\0junk"), "ab");
        assert_eq!(to_ucs2_le("😀"), None);
    }
}
