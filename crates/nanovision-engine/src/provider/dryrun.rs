use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{parse_edit_response, EditProvider, EditResult};
use crate::asset::MediaType;
use crate::codec::{self, EncodedPayload};
use crate::error::EditError;

const FALLBACK_SIZE: (u32, u32) = (256, 256);
const MAX_SIDE: u32 = 2048;

/// Offline provider: answers with a flat PNG tinted by the instruction,
/// shaped like a real provider response.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryrunProvider;

impl DryrunProvider {
    pub fn new() -> Self {
        Self
    }

    fn render(width: u32, height: u32, instruction: &str) -> Result<Vec<u8>, EditError> {
        let (r, g, b) = color_from_instruction(instruction);
        let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| EditError::Provider(format!("dryrun render failed: {err}")))?;
        Ok(bytes)
    }
}

impl EditProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn request_edit(
        &self,
        image: &EncodedPayload,
        _media_type: &MediaType,
        instruction: &str,
    ) -> Result<EditResult, EditError> {
        let (width, height) = source_dims(image).unwrap_or(FALLBACK_SIZE);
        let bytes = Self::render(width, height, instruction)?;
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": format!("dryrun edit: {}", instruction.trim()) },
                        {
                            "inlineData": {
                                "mimeType": "image/png",
                                "data": codec::encode(&bytes).as_str(),
                            }
                        },
                    ]
                }
            }]
        });
        parse_edit_response(&response)
    }
}

fn source_dims(image: &EncodedPayload) -> Option<(u32, u32)> {
    let bytes = codec::decode(image).ok()?;
    let decoded = image::load_from_memory(&bytes).ok()?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return None;
    }
    Some((width.min(MAX_SIDE), height.min(MAX_SIDE)))
}

fn color_from_instruction(instruction: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(instruction.trim().as_bytes());
    (digest[0], digest[1], digest[2])
}
