use std::path::Path;

use manydepth_image::{Image, ImageSize};

use crate::error::IoError;

/// Reads an image from the given file path and converts it to 8-bit RGB.
///
/// The method tries to read from any image format supported by the image crate.
/// Grayscale, alpha and 16-bit images are converted to three 8-bit channels.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An RGB image containing the decoded data.
pub fn read_image_any_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref().to_owned();

    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    // open the file and map it to memory
    let file = std::fs::File::open(file_path)?;
    let mmap = unsafe { memmap2::Mmap::map(&file)? };

    // decode the data directly from memory
    let img = image::ImageReader::new(std::io::Cursor::new(&mmap))
        .with_guessed_format()?
        .decode()?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    let image = Image::<u8, 3>::new(size, img.into_rgb8().into_raw())?;

    Ok(image)
}

/// Writes a single channel 16-bit image as a PNG file.
///
/// # Arguments
///
/// * `file_path` - The path to the PNG image.
/// * `image` - The image to encode.
pub fn write_image_png_gray16(
    file_path: impl AsRef<Path>,
    image: &Image<u16, 1>,
) -> Result<(), IoError> {
    let buffer = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
        image.width() as u32,
        image.height() as u32,
        image.as_slice().to_vec(),
    )
    .ok_or(IoError::ImageEncodeError(image.size()))?;

    buffer.save_with_format(file_path, image::ImageFormat::Png)?;

    Ok(())
}
