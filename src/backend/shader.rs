// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. Shaders are compiled ahead of time by
// build.rs (glslc) and read from disk at startup.

use anyhow::{Context, Result};
use ash::vk;
use std::fs::File;
use std::path::Path;
use super::VulkanDevice;

/// Read a compiled SPIR-V file into 32-bit words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open shader binary {:?}", path))?;

    // read_spv checks the magic number and handles alignment for us
    ash::util::read_spv(&mut file)
        .with_context(|| format!("Failed to read SPIR-V from {:?}", path))
}

pub fn create_shader_module(device: &VulkanDevice, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.device.create_shader_module(&create_info, None) }
        .context("Failed to create shader module")
}

/// Load a shader module straight from a .spv file
pub fn load_shader_module(device: &VulkanDevice, path: &Path) -> Result<vk::ShaderModule> {
    let code = read_spirv(path)?;
    log::debug!("Loaded shader {:?} ({} words)", path, code.len());
    create_shader_module(device, &code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_spirv_words() {
        let path = std::env::temp_dir().join(format!("model-viewer-test-shader-{}.spv", std::process::id()));
        let words: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];
        let mut file = File::create(&path).unwrap();
        for word in words {
            file.write_all(&word.to_le_bytes()).unwrap();
        }
        drop(file);

        let code = read_spirv(&path).unwrap();
        assert_eq!(code, words);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_shader_names_path() {
        let path = Path::new("definitely/not/here.spv");
        let err = read_spirv(path).unwrap_err();
        assert!(format!("{:#}", err).contains("here.spv"));
    }
}
