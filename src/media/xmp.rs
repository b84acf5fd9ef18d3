//! XMP sidecar properties, backed by [xmp_toolkit]
//!
//! Only three properties are managed: `dc:description`, `dc:subject` and
//! `xmp:Rating`. Everything else in an existing packet is kept as parsed and
//! written back untouched.
//!
//! [xmp_toolkit]: https://docs.rs/xmp_toolkit/latest/xmp_toolkit/
use std::str::FromStr;

use xmp_toolkit::xmp_ns::{DC, XMP};
use xmp_toolkit::{ToStringOptions, XmpError, XmpMeta, XmpValue};

/// The XMP packet of a sidecar
pub struct XmpData {
    meta: XmpMeta,
}

impl std::fmt::Debug for XmpData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmpData")
            .field("description", &self.description())
            .field("subjects", &self.subjects())
            .field("rating", &self.rating())
            .finish()
    }
}

impl XmpData {
    /// An empty packet, for images without a sidecar
    pub fn new() -> Result<Self, XmpError> {
        Ok(Self {
            meta: XmpMeta::new()?,
        })
    }

    /// Parse an XMP packet; a blank sidecar counts as empty
    pub fn parse(xml: &str) -> Result<Self, XmpError> {
        if xml.trim().is_empty() {
            return Self::new();
        }
        Ok(Self {
            meta: XmpMeta::from_str(xml)?,
        })
    }

    /// Default-language `dc:description`
    pub fn description(&self) -> Option<String> {
        self.meta
            .localized_text(DC, "description", None, "x-default")
            .map(|(value, _)| value.value)
            .filter(|description| !description.is_empty())
    }

    /// Replace `dc:description`, removing it when `description` is empty
    pub fn set_description(&mut self, description: &str) -> Result<(), XmpError> {
        if description.is_empty() {
            self.meta.delete_property(DC, "description")
        } else {
            self.meta
                .set_localized_text(DC, "description", None, "x-default", description)
        }
    }

    /// `dc:subject` keywords, in packet order
    pub fn subjects(&self) -> Vec<String> {
        self.meta
            .property_array(DC, "subject")
            .map(|value| value.value)
            .collect()
    }

    /// Replace all `dc:subject` keywords
    pub fn set_subjects(&mut self, subjects: &[String]) -> Result<(), XmpError> {
        // Clear the array, to have a clean slate
        self.meta.delete_property(DC, "subject")?;
        for subject in subjects {
            self.meta.append_array_item(
                DC,
                &XmpValue::new("subject".into()).set_is_array(true),
                &XmpValue::new(subject.clone()),
            )?;
        }
        Ok(())
    }

    /// `xmp:Rating`, where -1 means rejected
    pub fn rating(&self) -> Option<i64> {
        self.meta
            .property(XMP, "Rating")
            .and_then(|value| value.value.trim().parse().ok())
    }

    pub fn set_rating(&mut self, rating: i64) -> Result<(), XmpError> {
        self.meta
            .set_property(XMP, "Rating", &XmpValue::new(rating.to_string()))
    }

    /// Serialize the packet, wrapper included
    pub fn to_xml(&self) -> Result<String, XmpError> {
        self.meta.to_string_with_options(ToStringOptions::default())
    }
}
