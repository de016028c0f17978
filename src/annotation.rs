//! Face boxes and labels drawn onto full-resolution frames

use crate::frame::FaceRegion;
use image::{Rgb, RgbImage};
use tracing::{debug, warn};

#[cfg(feature = "annotation")]
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
#[cfg(feature = "annotation")]
use rusttype::{Font, Scale};

pub const KNOWN_COLOR: Rgb<u8> = Rgb([220, 20, 20]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([160, 160, 160]);
#[cfg(feature = "annotation")]
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Height of the filled label bar under each box
#[cfg(feature = "annotation")]
const LABEL_BAR_HEIGHT: i32 = 35;
#[cfg(feature = "annotation")]
const LABEL_FONT_SIZE: f32 = 22.0;

/// Draws one box and label per located face
pub struct FaceAnnotator {
    #[cfg(feature = "annotation")]
    font: Option<Font<'static>>,
}

impl FaceAnnotator {
    /// Boxes are always drawn; labels only when the font loads
    pub fn new(font_path: &str) -> Self {
        #[cfg(feature = "annotation")]
        {
            let font = std::fs::read(font_path)
                .ok()
                .and_then(Font::try_from_vec);
            if font.is_none() {
                warn!("Label font '{}' unavailable, drawing boxes only", font_path);
            }
            Self { font }
        }

        #[cfg(not(feature = "annotation"))]
        {
            warn!(
                "Built without annotation support, '{}' unused and frames left as captured",
                font_path
            );
            Self {}
        }
    }

    pub fn has_labels(&self) -> bool {
        #[cfg(feature = "annotation")]
        {
            self.font.is_some()
        }
        #[cfg(not(feature = "annotation"))]
        {
            false
        }
    }

    /// Draw `region` (full-resolution coordinates) with `label` beneath it
    pub fn annotate(&self, image: &mut RgbImage, region: &FaceRegion, label: &str, known: bool) {
        let Some(region) = region.clamped(image.width(), image.height()) else {
            debug!("Annotation for {} falls outside the frame", label);
            return;
        };
        let color = if known { KNOWN_COLOR } else { UNKNOWN_COLOR };

        #[cfg(feature = "annotation")]
        {
            let outline = Rect::at(region.left, region.top)
                .of_size(region.width() as u32, region.height() as u32);
            draw_hollow_rect_mut(image, outline, color);

            let bar_top = (region.bottom - LABEL_BAR_HEIGHT).max(region.top);
            let bar_height = (region.bottom - bar_top).max(1) as u32;
            let bar = Rect::at(region.left, bar_top).of_size(region.width() as u32, bar_height);
            draw_filled_rect_mut(image, bar, color);

            if let Some(font) = &self.font {
                draw_text_mut(
                    image,
                    TEXT_COLOR,
                    region.left + 6,
                    bar_top + 6,
                    Scale::uniform(LABEL_FONT_SIZE),
                    font,
                    label,
                );
            }
        }

        #[cfg(not(feature = "annotation"))]
        {
            debug!("Face {} at {} {:?} (annotation disabled)", label, region, color);
        }
    }
}
