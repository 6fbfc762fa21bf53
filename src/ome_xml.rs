//! Reader for the OME-XML document stored alongside a bioformats2raw hierarchy.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Reserved child group holding the OME-XML metadata.
pub const OME_GROUP: &str = "OME";

/// Name of the OME-XML document within [`OME_GROUP`].
pub const OME_XML_FILE: &str = "METADATA.ome.xml";

/// Attribute of [`OME_GROUP`] mapping series ordinal to group path.
pub const SERIES_ATTRIBUTE: &str = "series";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OmeChannel {
    pub id: Option<String>,
    pub name: Option<String>,
    pub samples_per_pixel: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OmeImage {
    pub id: Option<String>,
    pub name: Option<String>,
    /// `Type` of the `Pixels` element, e.g. `uint8`.
    pub pixel_type: Option<String>,
    pub size_c: Option<u64>,
    pub channels: Vec<OmeChannel>,
}

/// The per-image metadata of an OME-XML document, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OmeInfo {
    images: Vec<OmeImage>,
}

impl OmeInfo {
    pub fn new(images: Vec<OmeImage>) -> Self {
        Self { images }
    }

    pub fn from_xml(xml: &str) -> crate::Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut images = Vec::new();
        let mut current: Option<OmeImage> = None;
        let mut in_pixels = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"Image" => current = Some(read_image(&e)?),
                    b"Pixels" => {
                        in_pixels = true;
                        if let Some(image) = current.as_mut() {
                            read_pixels(&e, image)?;
                        }
                    }
                    b"Channel" if in_pixels => {
                        if let Some(image) = current.as_mut() {
                            image.channels.push(read_channel(&e)?);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"Image" => images.push(read_image(&e)?),
                    b"Pixels" => {
                        if let Some(image) = current.as_mut() {
                            read_pixels(&e, image)?;
                        }
                    }
                    b"Channel" if in_pixels => {
                        if let Some(image) = current.as_mut() {
                            image.channels.push(read_channel(&e)?);
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"Image" => {
                        if let Some(image) = current.take() {
                            images.push(image);
                        }
                    }
                    b"Pixels" => in_pixels = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }

        log::debug!("Parsed {} OME images", images.len());
        Ok(Self { images })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image(&self, index: usize) -> Option<&OmeImage> {
        self.images.get(index)
    }

    /// Names of all images, falling back to the image ID and then the position.
    pub fn image_names(&self) -> Vec<String> {
        self.images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                image
                    .name
                    .clone()
                    .or_else(|| image.id.clone())
                    .unwrap_or_else(|| format!("Image:{idx}"))
            })
            .collect()
    }

    /// Channel names of the image at `index`.
    pub fn channel_names(&self, index: usize) -> crate::Result<Vec<String>> {
        let image = self.images.get(index).ok_or_else(|| {
            crate::Error::consistency(OME_XML_FILE, format!("no OME image at index {index}"))
        })?;
        Ok(image
            .channels
            .iter()
            .enumerate()
            .map(|(idx, channel)| {
                channel
                    .name
                    .clone()
                    .or_else(|| channel.id.clone())
                    .unwrap_or_else(|| format!("Channel:{idx}"))
            })
            .collect())
    }

    /// Whether the image at `index` is stored as interleaved 8-bit RGB.
    pub fn maybe_rgb(&self, index: usize) -> bool {
        let Some(image) = self.images.get(index) else {
            return false;
        };
        image.pixel_type.as_deref() == Some("uint8")
            && matches!(
                image.channels.as_slice(),
                [OmeChannel {
                    samples_per_pixel: Some(3),
                    ..
                }]
            )
    }
}

fn attribute(e: &BytesStart, name: &[u8]) -> crate::Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(crate::Error::wrap)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parsed_attribute<T: std::str::FromStr>(e: &BytesStart, name: &[u8]) -> crate::Result<Option<T>> {
    match attribute(e, name)? {
        Some(s) => s.trim().parse().map(Some).map_err(|_| {
            crate::Error::malformed(
                OME_XML_FILE,
                format!("invalid {} \"{s}\"", String::from_utf8_lossy(name)),
            )
        }),
        None => Ok(None),
    }
}

fn read_image(e: &BytesStart) -> crate::Result<OmeImage> {
    Ok(OmeImage {
        id: attribute(e, b"ID")?,
        name: attribute(e, b"Name")?,
        ..Default::default()
    })
}

fn read_pixels(e: &BytesStart, image: &mut OmeImage) -> crate::Result<()> {
    image.pixel_type = attribute(e, b"Type")?;
    image.size_c = parsed_attribute(e, b"SizeC")?;
    Ok(())
}

fn read_channel(e: &BytesStart) -> crate::Result<OmeChannel> {
    Ok(OmeChannel {
        id: attribute(e, b"ID")?,
        name: attribute(e, b"Name")?,
        samples_per_pixel: parsed_attribute(e, b"SamplesPerPixel")?,
    })
}
