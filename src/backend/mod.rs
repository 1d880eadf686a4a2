// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash, one file per kind of Vulkan object.
// Handles that own memory (buffers, images, swapchain) clean up on Drop;
// the rest are destroyed explicitly by the renderer.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use buffer::Buffer;
pub use command::CommandPool;
pub use device::VulkanDevice;
pub use image::{Image, ImageDesc};
pub use swapchain::Swapchain;
