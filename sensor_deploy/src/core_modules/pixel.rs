// THEORY:
// The `pixel` module is the lowest layer of the engine: a "dumb" RGBA container,
// the read-only `PixelSource` capability the engine consumes images through, and
// the owned `Raster` it copies them into.
//
// Key principles:
// 1.  **Single-pixel scope**: `Pixel` knows its channels and nothing about its
//     neighbours. Anything statistical lives in `priority::ColorAccumulator`.
// 2.  **Copy once**: An imported image is flattened into a row-major `Raster`.
//     Every footprint pass afterwards is a slice index, no trait dispatch and no
//     bounds juggling with the original image type.
// 3.  **Alpha passes through**: Only R, G and B feed color statistics.

pub mod pixel {
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    pub type Channel = u8;

    const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
        pub alpha: Channel,
    }

    impl Pixel {
        pub const fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Self {
                red,
                green,
                blue,
                alpha,
            }
        }

        pub const fn rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            Self::new(red, green, blue, u8::MAX)
        }

        /// The three color channels as floats, in R, G, B order.
        #[inline]
        pub fn channels(&self) -> [f64; 3] {
            [self.red as f64, self.green as f64, self.blue as f64]
        }
    }

    impl TryFrom<&[u8]> for Pixel {
        type Error = usize;

        /// Converts a 4-byte RGBA slice; the error is the offending length.
        fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
            if bytes.len() != CHANNELS {
                return Err(bytes.len());
            }
            Ok(Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]))
        }
    }

    impl From<Rgba<u8>> for Pixel {
        fn from(p: Rgba<u8>) -> Self {
            Pixel::new(p[0], p[1], p[2], p[3])
        }
    }

    impl From<Rgb<u8>> for Pixel {
        fn from(p: Rgb<u8>) -> Self {
            Pixel::rgb(p[0], p[1], p[2])
        }
    }

    /// Read-only random access to an image over `[0, width) x [0, height)`.
    pub trait PixelSource {
        fn dimensions(&self) -> (u32, u32);
        fn pixel(&self, x: u32, y: u32) -> Pixel;
    }

    impl PixelSource for RgbaImage {
        fn dimensions(&self) -> (u32, u32) {
            image::ImageBuffer::dimensions(self)
        }

        fn pixel(&self, x: u32, y: u32) -> Pixel {
            (*self.get_pixel(x, y)).into()
        }
    }

    impl PixelSource for RgbImage {
        fn dimensions(&self) -> (u32, u32) {
            image::ImageBuffer::dimensions(self)
        }

        fn pixel(&self, x: u32, y: u32) -> Pixel {
            (*self.get_pixel(x, y)).into()
        }
    }

    /// An owned, row-major copy of an imported image.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Raster {
        width: u32,
        height: u32,
        pixels: Vec<Pixel>,
    }

    impl Raster {
        /// Copies every pixel of `source`.
        pub fn from_source<S: PixelSource + ?Sized>(source: &S) -> Self {
            let (width, height) = source.dimensions();
            let mut pixels = Vec::with_capacity(width as usize * height as usize);
            for y in 0..height {
                for x in 0..width {
                    pixels.push(source.pixel(x, y));
                }
            }
            Self {
                width,
                height,
                pixels,
            }
        }

        pub fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        /// Pixel at a row-major index produced by `Geometry`.
        #[inline]
        pub fn at(&self, index: usize) -> &Pixel {
            &self.pixels[index]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;
    use image::RgbaImage;

    #[test]
    fn byte_slices_convert_only_with_four_channels() {
        let bytes = [10u8, 20, 30, 40];
        assert_eq!(Pixel::try_from(&bytes[..]), Ok(Pixel::new(10, 20, 30, 40)));
        assert_eq!(Pixel::try_from(&bytes[..3]), Err(3));
    }

    #[test]
    fn raster_is_row_major() {
        let image = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let raster = Raster::from_source(&image);
        assert_eq!(raster.dimensions(), (3, 2));
        // index = y * width + x
        assert_eq!(*raster.at(5), Pixel::new(2, 1, 0, 255));
        assert_eq!(raster.at(1).channels(), [1.0, 0.0, 0.0]);
    }
}
