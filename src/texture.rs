// Texture loading and upload
//
// Images are decoded to RGBA8 on the CPU, staged into a host-visible buffer,
// copied into an sRGB device-local image and mipmapped with blits.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::path::Path;
use std::sync::Arc;
use crate::backend::{Buffer, CommandPool, Image, ImageDesc, VulkanDevice};

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Number of mip levels down to 1x1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Decoded RGBA8 pixels
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to load texture image {:?}", path))?
            .into_rgba8();

        let (width, height) = image.dimensions();
        log::info!("Loaded texture {:?}: {}x{}", path, width, height);

        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Black and white checkerboard with `cell`-pixel squares
    pub fn checkerboard(size: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let value = if (x / cell + y / cell) % 2 == 0 { 255 } else { 32 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Texture at `path`, or a checkerboard if the file doesn't exist
    pub fn load_or_fallback(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!("Texture {:?} not found, using checkerboard", path);
            Ok(Self::checkerboard(256, 32))
        }
    }
}

/// Sampled texture on the GPU
pub struct Texture {
    pub image: Image,
    pub sampler: vk::Sampler,
    device: Arc<VulkanDevice>,
}

impl Texture {
    pub fn upload(
        device: &Arc<VulkanDevice>,
        pool: &CommandPool,
        data: &TextureData,
        mipmaps: bool,
    ) -> Result<Self> {
        let mip_levels = if mipmaps {
            mip_level_count(data.width, data.height)
        } else {
            1
        };

        let mut staging = Buffer::new(
            device,
            data.pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "texture staging",
        )?;
        staging.write(&data.pixels)?;

        let image = Image::new(
            device,
            ImageDesc {
                width: data.width,
                height: data.height,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                // TRANSFER_SRC because mip levels are blitted from each other
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
            },
            vk::ImageAspectFlags::COLOR,
            "texture",
        )?;

        image.transition_layout(
            pool,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        image.copy_from_buffer(pool, &staging)?;

        if mip_levels > 1 {
            image.generate_mipmaps(pool)?;
        } else {
            image.transition_layout(
                pool,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?;
        }

        log::info!("Texture uploaded with {} mip levels", mip_levels);

        let sampler = create_sampler(device, mip_levels)?;

        Ok(Self {
            image,
            sampler,
            device: device.clone(),
        })
    }
}

fn create_sampler(device: &VulkanDevice, mip_levels: u32) -> Result<vk::Sampler> {
    let max_anisotropy = device.properties.limits.max_sampler_anisotropy;

    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32);

    unsafe { device.device.create_sampler(&sampler_info, None) }
        .context("Failed to create texture sampler")
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_sampler(self.sampler, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(800, 600), 10);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn test_checkerboard_layout() {
        let data = TextureData::checkerboard(4, 2);
        assert_eq!(data.pixels.len(), 4 * 4 * 4);

        let pixel = |x: usize, y: usize| &data.pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), &[255, 255, 255, 255]);
        assert_eq!(pixel(1, 1), &[255, 255, 255, 255]);
        assert_eq!(pixel(2, 0), &[32, 32, 32, 255]);
        assert_eq!(pixel(2, 2), &[255, 255, 255, 255]);
    }

    #[test]
    fn test_png_decodes_to_rgba() {
        let path = std::env::temp_dir().join(format!("model-viewer-texture-{}.png", std::process::id()));
        let rgb = image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        rgb.save(&path).unwrap();

        let data = TextureData::load(&path).unwrap();
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.pixels.len(), 3 * 2 * 4);
        // Pixel (2, 1): alpha channel filled in
        assert_eq!(&data.pixels[(3 + 2) * 4..(3 + 2) * 4 + 4], &[20, 20, 7, 255]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_texture_falls_back() {
        let data = TextureData::load_or_fallback(Path::new("no/such/texture.png")).unwrap();
        assert_eq!((data.width, data.height), (256, 256));
    }

    #[test]
    fn test_corrupt_texture_is_an_error() {
        let path = std::env::temp_dir().join(format!("model-viewer-corrupt-{}.png", std::process::id()));
        std::fs::write(&path, b"not a png").unwrap();
        assert!(TextureData::load_or_fallback(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}
